// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive decoder.
//!
//! Mirrors the encoder: every block it allocates is recorded in the ledger
//! before it is filled, and every structure element it fills becomes a node
//! of the returned [`DecodedTree`].

use super::context::{shape_elements, wire_shape, MarshalContext, Step};
use super::Decoded;
use crate::config::{MAX_NAME_LEN, MAX_RANK, POINTER_SIZE};
use crate::error::{MarshalError, MarshalFailure, WireError};
use crate::ledger::Address;
use crate::tree::{DecodedTree, NodeId};
use crate::types::{
    AtomicType, FieldDescriptor, StringForm, TypeId, TypeRegistry, OPAQUE_TYPE, STRING_ARRAY_TYPE,
};
use crate::wire::atomic::get_elements;
use crate::wire::XdrReader;
use std::io::Read;

/// Upper bound on children reserved ahead of one pointer array.
const MAX_CHILD_RESERVE: usize = 1 << 16;

/// Decode one value of type `type_id`.
pub(crate) fn decode_value(ctx: MarshalContext<'_>, input: &mut dyn Read, type_id: TypeId) -> Step<Decoded> {
    let mut decoder = Decoder {
        ctx,
        r: XdrReader::new(input),
        tree: DecodedTree::new(),
    };
    let label = decoder
        .ctx
        .registry
        .get(type_id)
        .map_or_else(|| type_id.to_string(), |d| d.name.clone());
    let outcome = decoder.root(type_id, &label);
    let bytes = decoder.r.consumed();
    let Decoder { ctx, tree, .. } = decoder;
    let protocol_version = ctx.config.protocol_version;
    match outcome {
        Ok(root) => {
            log::debug!("[decode] {}: {} bytes, {} nodes", label, bytes, tree.len());
            Ok(Decoded {
                type_name: label,
                root,
                tree,
                diagnostics: ctx.into_diagnostics(),
                bytes,
                protocol_version,
            })
        }
        Err(mut failure) => {
            failure.diagnostics = ctx.into_diagnostics();
            Err(failure)
        }
    }
}

struct Decoder<'a, 'r> {
    ctx: MarshalContext<'a>,
    r: XdrReader<'r>,
    tree: DecodedTree,
}

impl<'a, 'r> Decoder<'a, 'r> {
    fn root(&mut self, type_id: TypeId, label: &str) -> Step<Address> {
        if !self.r.get_flag()? {
            return Ok(Address::NULL);
        }
        let size = self.ctx.registry.get(type_id).map_or(0, |d| d.size);
        let size = self.ctx.check_block(1, size)?;
        let root = self.ctx.heap.alloc(size)?;
        self.ctx.ledger.record(root, 1, size, label, 0, Vec::new());
        self.fill(type_id, root, None, "", 0, label)
            .map_err(|f| f.within(label))?;
        Ok(root)
    }

    fn fill(
        &mut self,
        type_id: TypeId,
        base: Address,
        parent: Option<NodeId>,
        name: &str,
        index: usize,
        label: &str,
    ) -> Step<NodeId> {
        let registry: &'a TypeRegistry = self.ctx.registry;
        let desc = registry
            .get(type_id)
            .ok_or_else(|| MarshalFailure::new(MarshalError::TypeUnresolved(type_id.to_string())))?;
        self.ctx.enter(label)?;
        let node = self.tree.add(name, type_id, base, index, parent);

        for (i, field) in desc.fields.iter().enumerate() {
            self.field(type_id, i, field, base, node).map_err(|f| {
                if f.trace.is_empty() {
                    f.within(field.name.as_str())
                } else {
                    f
                }
            })?;
        }
        self.ctx.leave();
        Ok(node)
    }

    fn field(
        &mut self,
        owner: TypeId,
        index: usize,
        field: &FieldDescriptor,
        base: Address,
        node: NodeId,
    ) -> Step<()> {
        let at = base.add(field.offset);
        if let Some(form) = field.string_form() {
            return self.strings(form, at);
        }
        match field.atomic {
            Some(atomic) if !field.pointer => {
                let bytes = self.ctx.heap.bytes_mut(at, field.space())?;
                get_elements(&mut self.r, atomic, bytes, field.count)?;
                Ok(())
            }
            Some(atomic) => self.atomic_pointer(at, atomic),
            None if !field.pointer => self.inline_nested(owner, index, field, at, node),
            None => self.nested_pointer(field, at, node),
        }
    }

    /// Rank and shape following a non-zero count, if the version sends them.
    fn shape_block(&mut self, count: usize) -> Step<(usize, Vec<usize>)> {
        if !self.ctx.config.sends_shape() {
            return Ok((0, Vec::new()));
        }
        let rank = self.r.get_count_max(MAX_RANK)?;
        let shape = if rank > 1 {
            (0..rank)
                .map(|_| self.r.get_count())
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        let limit = self.ctx.config.max_block_bytes;
        match shape_elements(&shape) {
            Some(elements) if elements <= limit => {}
            elements => {
                return Err(WireError::BlockTooLarge {
                    requested: elements.unwrap_or(usize::MAX),
                    limit,
                }
                .into())
            }
        }
        Ok(wire_shape(count, rank, &shape))
    }

    /// Allocate and record `count` elements; the caller stores the pointer.
    fn allocate(&mut self, count: usize, size: usize, type_name: &str, rank: usize, shape: Vec<usize>) -> Step<Address> {
        let total = self.ctx.check_block(count, size)?;
        let block = self.ctx.heap.alloc(total)?;
        self.ctx.ledger.record(block, count, size, type_name, rank, shape);
        Ok(block)
    }

    fn atomic_pointer(&mut self, slot: Address, atomic: AtomicType) -> Step<()> {
        let count = self.r.get_count()?;
        if count == 0 {
            self.ctx.heap.write_pointer(slot, Address::NULL)?;
            return Ok(());
        }
        let (rank, shape) = self.shape_block(count)?;
        self.atomic_run(slot, atomic, count, rank, shape)
    }

    fn atomic_run(
        &mut self,
        slot: Address,
        atomic: AtomicType,
        count: usize,
        rank: usize,
        shape: Vec<usize>,
    ) -> Step<()> {
        let size = atomic.native_size();
        let block = self.allocate(count, size, atomic.name(), rank, shape)?;
        self.ctx.heap.write_pointer(slot, block)?;
        let bytes = self.ctx.heap.bytes_mut(block, count * size)?;
        get_elements(&mut self.r, atomic, bytes, count)?;
        Ok(())
    }

    fn strings(&mut self, form: StringForm, at: Address) -> Step<()> {
        match form {
            StringForm::Fixed { len } => {
                let buffer = self.ctx.heap.bytes_mut(at, len)?;
                self.r.get_string_into(buffer)?;
            }
            StringForm::FixedArray { len, count } => {
                for i in 0..count {
                    let buffer = self.ctx.heap.bytes_mut(at.add(i * len), len)?;
                    self.r.get_string_into(buffer)?;
                }
            }
            StringForm::Pointer => self.string_pointer(at)?,
            StringForm::PointerArray { count } => {
                for i in 0..count {
                    self.string_pointer(at.add(i * POINTER_SIZE))?;
                }
            }
            StringForm::PointerToPointers => {
                let count = self.r.get_count()?;
                if count == 0 {
                    self.ctx.heap.write_pointer(at, Address::NULL)?;
                    return Ok(());
                }
                let list = self.allocate(count, POINTER_SIZE, STRING_ARRAY_TYPE, 1, vec![count])?;
                self.ctx.heap.write_pointer(at, list)?;
                for i in 0..count {
                    self.string_pointer(list.add(i * POINTER_SIZE))?;
                }
            }
        }
        Ok(())
    }

    fn string_pointer(&mut self, slot: Address) -> Step<()> {
        let len = self.r.get_count()?;
        if len == 0 {
            self.ctx.heap.write_pointer(slot, Address::NULL)?;
            return Ok(());
        }
        let block = self.allocate(len, 1, AtomicType::Char.name(), 1, vec![len])?;
        self.ctx.heap.write_pointer(slot, block)?;
        let buffer = self.ctx.heap.bytes_mut(block, len)?;
        self.r.get_string_into(buffer)?;
        Ok(())
    }

    fn inline_nested(
        &mut self,
        owner: TypeId,
        index: usize,
        field: &FieldDescriptor,
        at: Address,
        node: NodeId,
    ) -> Step<()> {
        let Some(nested) = self.ctx.nested_type(owner, index, &field.type_name) else {
            self.ctx
                .note(&field.name, MarshalError::TypeUnresolved(field.type_name.clone()));
            return Ok(());
        };
        self.ctx
            .ledger
            .record_fixed(at, field.count, field.size, field.type_name.as_str());
        self.tree.reserve_children(node, field.count);
        for i in 0..field.count {
            if !self.r.get_flag()? {
                continue;
            }
            let label = format!("{}[{}]", field.name, i);
            self.fill(nested, at.add(i * field.size), Some(node), &field.name, i, &label)
                .map_err(|f| f.within(label.as_str()))?;
        }
        Ok(())
    }

    fn nested_pointer(&mut self, field: &FieldDescriptor, slot: Address, node: NodeId) -> Step<()> {
        let registry: &'a TypeRegistry = self.ctx.registry;
        let count = self.r.get_count()?;
        if count == 0 {
            self.ctx.heap.write_pointer(slot, Address::NULL)?;
            return Ok(());
        }
        let size = self.r.get_count()?;
        let type_name = self.r.get_text(MAX_NAME_LEN)?;
        let (rank, shape) = self.shape_block(count)?;

        if let Some(nested) = registry.resolve(&type_name) {
            let local = registry.get(nested).map_or(0, |d| d.size);
            if size != local {
                self.ctx.note(
                    &field.name,
                    MarshalError::SchemaMismatch {
                        type_name: type_name.clone(),
                        detail: format!("peer element size {}, local size {}", size, local),
                    },
                );
            }
            let mut block = Address::NULL;
            for i in 0..count {
                if !self.r.get_flag()? {
                    continue;
                }
                if block.is_null() {
                    block = self.allocate(count, local, &type_name, rank, shape.clone())?;
                    self.ctx.heap.write_pointer(slot, block)?;
                    // The count is peer-supplied; zero-sized elements pass the block check.
                    self.tree.reserve_children(node, count.min(MAX_CHILD_RESERVE));
                }
                let label = format!("{}[{}]", field.name, i);
                self.fill(nested, block.add(i * local), Some(node), &field.name, i, &label)
                    .map_err(|f| f.within(label.as_str()))?;
            }
            if block.is_null() {
                self.ctx.heap.write_pointer(slot, Address::NULL)?;
            }
        } else if let Some(atomic) = AtomicType::from_name(&type_name) {
            self.atomic_run(slot, atomic, count, rank, shape)?;
        } else if type_name == OPAQUE_TYPE {
            let block = self.allocate(count, size, OPAQUE_TYPE, rank, shape)?;
            self.ctx.heap.write_pointer(slot, block)?;
            let bytes = self.ctx.heap.bytes_mut(block, count * size)?;
            self.r.get_opaque_into(bytes)?;
        } else {
            // The payload layout is unknown; the rest of the stream cannot be read.
            return Err(MarshalFailure::new(MarshalError::TypeUnresolved(type_name)));
        }
        Ok(())
    }
}
