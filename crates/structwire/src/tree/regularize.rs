// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ragged-array regularization.
//!
//! Every instance of a ragged type is grown to the largest `len` found in the
//! tree. New slots copy element 0 (zeros when the instance was empty) and the
//! ledger record follows the block. Blocks reachable through pointer members
//! of element 0 are duplicated for each new slot, so no two elements share
//! memory. The tree gains matching subtrees addressed at the copies, and the
//! type is reclassified as compound. Running it again is a no-op.

use super::node::{DecodedTree, NodeId};
use super::query::ragged_fields;
use crate::error::{MarshalError, Result};
use crate::ledger::resolve::{read_integer, write_integer};
use crate::config::POINTER_SIZE;
use crate::ledger::{Address, AllocationLedger, Heap};
use crate::types::{StringForm, TypeClass, TypeId, TypeRegistry, STRING_ARRAY_TYPE};
use std::collections::HashMap;

/// Regularize all instances of `type_name`; returns the number grown.
pub fn regularize(
    tree: &mut DecodedTree,
    registry: &mut TypeRegistry,
    ledger: &mut AllocationLedger,
    heap: &mut Heap,
    type_name: &str,
) -> Result<usize> {
    let type_id = registry
        .resolve(type_name)
        .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))?;
    let desc = registry
        .get(type_id)
        .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))?;
    if !desc.is_ragged() {
        return Ok(0);
    }
    let mismatch = |detail: &str| MarshalError::SchemaMismatch {
        type_name: type_name.to_string(),
        detail: detail.to_string(),
    };
    let (len_field, data_field) = ragged_fields(desc).ok_or_else(|| mismatch("no length/data field pair"))?;
    let (len_field, data_field) = (len_field.clone(), data_field.clone());
    let len_atomic = len_field.atomic.ok_or_else(|| mismatch("length field is not an integer"))?;
    let element_size = registry
        .element_size(&data_field.type_name, data_field.is_string_array())
        .ok_or_else(|| MarshalError::TypeUnresolved(data_field.type_name.clone()))?;
    let element_type = registry.resolve(&data_field.type_name);

    let max = tree.max_ragged_count(registry, heap, type_name)?;
    let instances: Vec<NodeId> = tree
        .iter()
        .filter(|(_, n)| n.type_id == type_id)
        .map(|(id, _)| id)
        .collect();

    let mut grown = 0;
    for node_id in instances {
        let Some(base) = tree.get(node_id).map(|n| n.address) else {
            continue;
        };
        let len_at = base.add(len_field.offset);
        let len = read_integer(heap, len_at, len_atomic)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(0);
        if len >= max {
            continue;
        }

        let slot = base.add(data_field.offset);
        let data = heap.read_pointer(slot)?;
        let data = if data.is_null() {
            let block = heap.alloc(max * element_size)?;
            ledger.record(block, max, element_size, data_field.type_name.as_str(), 1, vec![max]);
            heap.write_pointer(slot, block)?;
            block
        } else {
            let current = heap.remaining(data).unwrap_or(0);
            heap.grow(data, current.max(max * element_size))?;
            match ledger.reallocate(data, data, max, element_size, data_field.type_name.as_str()) {
                Err(MarshalError::NotFound(_)) => {
                    ledger.record(data, max, element_size, data_field.type_name.as_str(), 1, vec![max])
                }
                other => other?,
            }
            data
        };
        write_integer(heap, len_at, len_atomic, max as i64)?;

        let first = tree.children(node_id).iter().copied().find(|&c| {
            tree.get(c)
                .is_some_and(|n| n.name == data_field.name && n.index == 0)
        });
        for k in len..max {
            let to = data.add(k * element_size);
            let mut relocation = Relocation::new(data, to, element_size);
            if len > 0 {
                heap.copy_within(data, to, element_size)?;
                let mut copier = Duplicator {
                    registry: &*registry,
                    ledger: &mut *ledger,
                    heap: &mut *heap,
                    moved: &mut relocation.moved,
                    pending: Vec::new(),
                };
                match element_type {
                    Some(element_id) => copier.pending.push(Pending::Element(element_id, to)),
                    None if data_field.is_string_array() => copier.pending.push(Pending::Slot(to)),
                    None => {}
                }
                copier.run()?;
            }
            match (element_type, first) {
                (Some(_), Some(first)) => {
                    deep_copy(tree, first, node_id, k, &relocation);
                }
                (Some(element_id), None) => {
                    build_skeleton(tree, registry, element_id, to, node_id, &data_field.name, k);
                }
                (None, _) => {}
            }
        }
        grown += 1;
    }

    registry.set_class(type_id, TypeClass::Compound)?;
    log::debug!(
        "[regularize] {}: {} instances grown to {} elements",
        type_name,
        grown,
        max
    );
    Ok(grown)
}

/// Regularize ragged types, deepest first, until none remain in the tree.
pub fn regularize_all(
    tree: &mut DecodedTree,
    registry: &mut TypeRegistry,
    ledger: &mut AllocationLedger,
    heap: &mut Heap,
) -> Result<usize> {
    let mut total = 0;
    loop {
        let deepest = tree
            .iter()
            .filter(|(_, n)| registry.get(n.type_id).is_some_and(|d| d.is_ragged()))
            .max_by_key(|(id, _)| tree.depth(*id))
            .and_then(|(_, n)| registry.get(n.type_id))
            .map(|d| d.name.clone());
        let Some(type_name) = deepest else {
            break;
        };
        total += regularize(tree, registry, ledger, heap, &type_name)?;
    }
    Ok(total)
}

/// Where the nodes of a copied element now live.
struct Relocation {
    from: Address,
    to: Address,
    span: usize,
    /// Original block to its duplicate.
    moved: HashMap<Address, Address>,
}

impl Relocation {
    fn new(from: Address, to: Address, span: usize) -> Self {
        Self {
            from,
            to,
            span,
            moved: HashMap::new(),
        }
    }

    fn apply(&self, address: Address) -> Address {
        let inside = address.base() == self.from.base()
            && address.offset() >= self.from.offset()
            && address.offset() < self.from.offset() + self.span;
        if inside {
            return self.to.add(address.offset() - self.from.offset());
        }
        match self.moved.get(&address.base()) {
            Some(copy) => copy.add(address.offset()),
            None => address,
        }
    }
}

enum Pending {
    /// A structure element whose pointer members still reference originals.
    Element(TypeId, Address),
    /// A pointer slot to redirect at a duplicate.
    Slot(Address),
}

/// Duplicates every tracked block reachable from a copied element.
///
/// Works from an explicit stack so long pointer chains cannot exhaust the
/// call stack. A block reached twice is duplicated once.
struct Duplicator<'a> {
    registry: &'a TypeRegistry,
    ledger: &'a mut AllocationLedger,
    heap: &'a mut Heap,
    moved: &'a mut HashMap<Address, Address>,
    pending: Vec<Pending>,
}

impl Duplicator<'_> {
    fn run(&mut self) -> Result<()> {
        while let Some(item) = self.pending.pop() {
            match item {
                Pending::Element(type_id, at) => self.element(type_id, at),
                Pending::Slot(slot) => self.slot(slot)?,
            }
        }
        Ok(())
    }

    fn element(&mut self, type_id: TypeId, at: Address) {
        let registry = self.registry;
        let Some(desc) = registry.get(type_id) else {
            return;
        };
        for field in &desc.fields {
            let base = at.add(field.offset);
            match field.string_form() {
                Some(StringForm::Pointer | StringForm::PointerToPointers) => {
                    self.pending.push(Pending::Slot(base));
                }
                Some(StringForm::PointerArray { count }) => {
                    for i in 0..count {
                        self.pending.push(Pending::Slot(base.add(i * POINTER_SIZE)));
                    }
                }
                Some(_) => {}
                None if field.pointer => self.pending.push(Pending::Slot(base)),
                None if field.is_nested() => {
                    if let Some(nested) = registry.resolve(&field.type_name) {
                        for i in 0..field.count {
                            self.pending.push(Pending::Element(nested, base.add(i * field.size)));
                        }
                    }
                }
                None => {}
            }
        }
    }

    fn slot(&mut self, slot: Address) -> Result<()> {
        let target = self.heap.read_pointer(slot)?;
        if target.is_null() {
            return Ok(());
        }
        if let Some(&copy) = self.moved.get(&target) {
            return self.heap.write_pointer(slot, copy);
        }
        let record = match self.ledger.find(target) {
            Ok(record) if !record.fixed && !record.freed => record.clone(),
            _ => {
                log::debug!("[regularize] {} is untracked, left shared", target);
                return Ok(());
            }
        };
        let copy = self.heap.duplicate(target, record.total_bytes())?;
        self.ledger.record(
            copy,
            record.count,
            record.size,
            record.type_name.as_str(),
            record.rank,
            record.shape,
        );
        self.moved.insert(target, copy);
        self.heap.write_pointer(slot, copy)?;

        if record.type_name == STRING_ARRAY_TYPE {
            for i in 0..record.count {
                self.pending.push(Pending::Slot(copy.add(i * POINTER_SIZE)));
            }
        } else if let Some(nested) = self.registry.resolve(&record.type_name) {
            for i in 0..record.count {
                self.pending.push(Pending::Element(nested, copy.add(i * record.size)));
            }
        }
        Ok(())
    }
}

/// Copy the subtree at `src` under `parent`, addressed where `relocation` says.
fn deep_copy(
    tree: &mut DecodedTree,
    src: NodeId,
    parent: NodeId,
    index: usize,
    relocation: &Relocation,
) -> NodeId {
    let Some(node) = tree.get(src).cloned() else {
        return parent;
    };
    let address = relocation.apply(node.address);
    let copy = tree.add(node.name, node.type_id, address, index, Some(parent));
    tree.reserve_children(copy, node.children.len());
    for child in node.children {
        let child_index = tree.get(child).map_or(0, |c| c.index);
        deep_copy(tree, child, copy, child_index, relocation);
    }
    copy
}

/// Nodes for a zero-filled element: itself and its inline nested structures.
fn build_skeleton(
    tree: &mut DecodedTree,
    registry: &TypeRegistry,
    type_id: TypeId,
    address: Address,
    parent: NodeId,
    name: &str,
    index: usize,
) {
    let node = tree.add(name, type_id, address, index, Some(parent));
    let Some(desc) = registry.get(type_id) else {
        return;
    };
    for field in desc.fields.iter().filter(|f| f.is_nested() && !f.pointer) {
        let Some(nested) = registry.resolve(&field.type_name) else {
            continue;
        };
        for i in 0..field.count {
            build_skeleton(
                tree,
                registry,
                nested,
                address.add(field.offset + i * field.size),
                node,
                &field.name,
                i,
            );
        }
    }
}
