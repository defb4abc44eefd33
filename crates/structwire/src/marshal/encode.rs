// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive encoder.
//!
//! Per structure element: presence flag, then every field in declaration
//! order. Pointer targets are sized through the allocation ledger; a target
//! that cannot be sized is sent empty and reported.

use super::context::{wire_shape, MarshalContext, Step};
use super::EncodeReport;
use crate::config::{AllocationSource, POINTER_SIZE};
use crate::error::{MarshalError, MarshalFailure};
use crate::ledger::{resolve_extent, Address, Extent, PointerSite, StructureInstanceLedger};
use crate::types::{
    AtomicType, FieldDescriptor, StringForm, TypeId, TypeRegistry, OPAQUE_TYPE, STRING_ARRAY_TYPE,
};
use crate::wire::atomic::put_elements;
use crate::wire::XdrWriter;
use std::io::Write;

/// Encode the value of type `type_id` at `base` (which may be null).
pub(crate) fn encode_value(
    ctx: MarshalContext<'_>,
    out: &mut dyn Write,
    type_id: TypeId,
    base: Address,
) -> Step<EncodeReport> {
    let mut encoder = Encoder {
        ctx,
        w: XdrWriter::new(out),
        instances: StructureInstanceLedger::new(),
    };
    let label = encoder
        .ctx
        .registry
        .get(type_id)
        .map_or_else(|| type_id.to_string(), |d| d.name.clone());
    let outcome = encoder.element(type_id, base, &label).and_then(|()| Ok(encoder.w.flush()?));
    let bytes = encoder.w.written();
    let Encoder { ctx, instances, .. } = encoder;
    match outcome {
        Ok(()) => {
            log::debug!(
                "[encode] {}: {} bytes, {} instances ({} repeated visits)",
                label,
                bytes,
                instances.len(),
                instances.repeats()
            );
            Ok(EncodeReport {
                diagnostics: ctx.into_diagnostics(),
                instances: instances.len(),
                repeats: instances.repeats(),
                bytes,
            })
        }
        Err(mut failure) => {
            failure.diagnostics = ctx.into_diagnostics();
            Err(failure)
        }
    }
}

struct Encoder<'a, 'w> {
    ctx: MarshalContext<'a>,
    w: XdrWriter<'w>,
    instances: StructureInstanceLedger,
}

impl<'a, 'w> Encoder<'a, 'w> {
    fn element(&mut self, type_id: TypeId, base: Address, label: &str) -> Step<()> {
        self.w.put_flag(!base.is_null())?;
        if base.is_null() {
            return Ok(());
        }
        self.fill(type_id, base, label).map_err(|f| f.within(label))
    }

    fn fill(&mut self, type_id: TypeId, base: Address, label: &str) -> Step<()> {
        let registry: &'a TypeRegistry = self.ctx.registry;
        let desc = registry
            .get(type_id)
            .ok_or_else(|| MarshalFailure::new(MarshalError::TypeUnresolved(type_id.to_string())))?;
        self.ctx.enter(label)?;

        let (id, seen) = self.instances.visit(base, &desc.name);
        if seen {
            log::debug!("[encode] {} instance #{} at {} encoded again", desc.name, id, base);
        }

        for (index, field) in desc.fields.iter().enumerate() {
            let previous = index.checked_sub(1).and_then(|p| desc.fields.get(p));
            self.field(type_id, index, field, previous, base).map_err(|f| {
                if f.trace.is_empty() {
                    f.within(field.name.as_str())
                } else {
                    f
                }
            })?;
        }
        self.ctx.leave();
        Ok(())
    }

    fn field(
        &mut self,
        owner: TypeId,
        index: usize,
        field: &'a FieldDescriptor,
        previous: Option<&'a FieldDescriptor>,
        base: Address,
    ) -> Step<()> {
        let at = base.add(field.offset);
        if let Some(form) = field.string_form() {
            return self.strings(field, form, previous, base, at);
        }
        match field.atomic {
            Some(atomic) if !field.pointer => {
                let bytes = self.ctx.heap.bytes(at, field.space())?;
                put_elements(&mut self.w, atomic, bytes, field.count)?;
                Ok(())
            }
            Some(atomic) => self.atomic_pointer(field, previous, base, atomic),
            None if !field.pointer => self.inline_nested(owner, index, field, at),
            None => self.nested_pointer(field, previous, base),
        }
    }

    fn extent(
        &mut self,
        field: &FieldDescriptor,
        previous: Option<&FieldDescriptor>,
        base: Address,
        target: Address,
        element_size: usize,
        element_type: &str,
    ) -> Option<Extent> {
        if target.is_null() {
            return None;
        }
        let site = PointerSite {
            field,
            previous: previous.map(|p| (p, base.add(p.offset))),
            target,
            element_size,
            element_type,
        };
        match resolve_extent(self.ctx.ledger, self.ctx.heap, self.ctx.policy(), &site) {
            Ok(extent) => Some(extent),
            Err(err) => {
                self.ctx.note(&field.name, err);
                None
            }
        }
    }

    /// Element count of `extent` re-expressed in `size`-byte elements.
    fn recount(&mut self, field: &str, extent: &Extent, size: usize, type_name: &str) -> usize {
        if extent.size == size || size == 0 {
            return extent.count;
        }
        let Some(total) = self.span(field, extent, type_name) else {
            return 0;
        };
        if total % size != 0 {
            self.ctx.note(
                field,
                MarshalError::SchemaMismatch {
                    type_name: type_name.to_string(),
                    detail: format!("{} bytes are not a multiple of {}", total, size),
                },
            );
            return 0;
        }
        total / size
    }

    /// Total bytes of `extent`, or a diagnostic when they overflow.
    fn span(&mut self, field: &str, extent: &Extent, type_name: &str) -> Option<usize> {
        let total = extent.count.checked_mul(extent.size);
        if total.is_none() {
            self.ctx.note(
                field,
                MarshalError::SchemaMismatch {
                    type_name: type_name.to_string(),
                    detail: format!("{} elements of {} bytes overflow", extent.count, extent.size),
                },
            );
        }
        total
    }

    /// Drop to zero when the target block is shorter than `count` elements.
    fn readable(&mut self, field: &str, target: Address, count: usize, size: usize) -> bool {
        let bytes = count.checked_mul(size);
        if bytes == Some(0) || bytes.is_some_and(|b| self.ctx.heap.bytes(target, b).is_ok()) {
            return true;
        }
        self.ctx.note(field, MarshalError::InvalidAddress(target));
        false
    }

    fn shape_block(&mut self, count: usize, rank: usize, shape: &[usize]) -> Step<()> {
        if !self.ctx.config.sends_shape() {
            return Ok(());
        }
        let (rank, shape) = wire_shape(count, rank, shape);
        self.w.put_count(rank)?;
        if rank > 1 {
            for dim in shape {
                self.w.put_count(dim)?;
            }
        }
        Ok(())
    }

    fn atomic_pointer(
        &mut self,
        field: &FieldDescriptor,
        previous: Option<&FieldDescriptor>,
        base: Address,
        atomic: AtomicType,
    ) -> Step<()> {
        let target = self.ctx.heap.read_pointer(base.add(field.offset))?;
        let size = atomic.native_size();
        let Some(extent) = self.extent(field, previous, base, target, size, atomic.name()) else {
            self.w.put_count(0)?;
            return Ok(());
        };
        let mut count = self.recount(&field.name, &extent, size, atomic.name());
        if !self.readable(&field.name, target, count, size) {
            count = 0;
        }
        self.w.put_count(count)?;
        if count == 0 {
            return Ok(());
        }
        let rank = if extent.size == size { extent.rank } else { 1 };
        self.shape_block(count, rank, &extent.shape)?;
        let bytes = self.ctx.heap.bytes(target, count * size)?;
        put_elements(&mut self.w, atomic, bytes, count)?;
        Ok(())
    }

    fn strings(
        &mut self,
        field: &FieldDescriptor,
        form: StringForm,
        previous: Option<&FieldDescriptor>,
        base: Address,
        at: Address,
    ) -> Step<()> {
        match form {
            StringForm::Fixed { len } => {
                let bytes = self.ctx.heap.bytes(at, len)?;
                self.w.put_string(bytes)?;
            }
            StringForm::FixedArray { len, count } => {
                for i in 0..count {
                    let bytes = self.ctx.heap.bytes(at.add(i * len), len)?;
                    self.w.put_string(bytes)?;
                }
            }
            StringForm::Pointer => self.string_pointer(field, previous, base, at)?,
            StringForm::PointerArray { count } => {
                for i in 0..count {
                    self.string_pointer(field, None, base, at.add(i * POINTER_SIZE))?;
                }
            }
            StringForm::PointerToPointers => {
                let list = self.ctx.heap.read_pointer(at)?;
                let mut count = self
                    .extent(field, previous, base, list, POINTER_SIZE, STRING_ARRAY_TYPE)
                    .map_or(0, |e| self.recount(&field.name, &e, POINTER_SIZE, STRING_ARRAY_TYPE));
                if !self.readable(&field.name, list, count, POINTER_SIZE) {
                    count = 0;
                }
                self.w.put_count(count)?;
                for i in 0..count {
                    self.string_pointer(field, None, base, list.add(i * POINTER_SIZE))?;
                }
            }
        }
        Ok(())
    }

    /// Count word (allocation length), then the string primitive.
    fn string_pointer(
        &mut self,
        field: &FieldDescriptor,
        previous: Option<&FieldDescriptor>,
        base: Address,
        slot: Address,
    ) -> Step<()> {
        let target = self.ctx.heap.read_pointer(slot)?;
        let char_name = AtomicType::Char.name();
        let mut len = match self.extent(field, previous, base, target, 1, char_name) {
            Some(extent) => self.span(&field.name, &extent, char_name).unwrap_or(0),
            None => 0,
        };
        if !self.readable(&field.name, target, len, 1) {
            len = 0;
        }
        self.w.put_count(len)?;
        if len > 0 {
            let bytes = self.ctx.heap.bytes(target, len)?;
            self.w.put_string(bytes)?;
        }
        Ok(())
    }

    fn inline_nested(&mut self, owner: TypeId, index: usize, field: &FieldDescriptor, at: Address) -> Step<()> {
        let Some(nested) = self.ctx.nested_type(owner, index, &field.type_name) else {
            self.ctx
                .note(&field.name, MarshalError::TypeUnresolved(field.type_name.clone()));
            return Ok(());
        };
        for i in 0..field.count {
            let label = format!("{}[{}]", field.name, i);
            self.element(nested, at.add(i * field.size), &label)?;
        }
        Ok(())
    }

    fn nested_pointer(
        &mut self,
        field: &FieldDescriptor,
        previous: Option<&FieldDescriptor>,
        base: Address,
    ) -> Step<()> {
        let registry: &'a TypeRegistry = self.ctx.registry;
        let target = self.ctx.heap.read_pointer(base.add(field.offset))?;
        let (declared, element_size) = if field.is_opaque() {
            match self.ctx.config.allocation_source {
                AllocationSource::DocumentProducer => (AtomicType::Char.name(), 1),
                _ => (OPAQUE_TYPE, 1),
            }
        } else {
            (
                field.type_name.as_str(),
                registry.size_of(&field.type_name).unwrap_or(0),
            )
        };
        let Some(extent) = self
            .extent(field, previous, base, target, element_size, declared)
            .filter(|e| e.count > 0)
        else {
            self.w.put_count(0)?;
            return Ok(());
        };

        let type_name = extent.type_name.as_str();
        if let Some(nested) = registry.resolve(type_name) {
            let size = registry.get(nested).map_or(0, |d| d.size);
            let mut count = self.recount(&field.name, &extent, size, type_name);
            if !self.readable(&field.name, target, count, size) {
                count = 0;
            }
            self.header(count, size, type_name, &extent)?;
            for i in 0..count {
                let label = format!("{}[{}]", field.name, i);
                self.element(nested, target.add(i * size), &label)?;
            }
        } else if let Some(atomic) = AtomicType::from_name(type_name) {
            let size = atomic.native_size();
            let mut count = self.recount(&field.name, &extent, size, type_name);
            if !self.readable(&field.name, target, count, size) {
                count = 0;
            }
            self.header(count, size, atomic.name(), &extent)?;
            if count > 0 {
                let bytes = self.ctx.heap.bytes(target, count * size)?;
                put_elements(&mut self.w, atomic, bytes, count)?;
            }
        } else if type_name == OPAQUE_TYPE || field.is_opaque() {
            let mut total = self.span(&field.name, &extent, OPAQUE_TYPE).unwrap_or(0);
            if !self.readable(&field.name, target, total, 1) {
                total = 0;
            }
            let flat = Extent::flat(total, 1, OPAQUE_TYPE);
            self.header(total, 1, OPAQUE_TYPE, &flat)?;
            if total > 0 {
                let bytes = self.ctx.heap.bytes(target, total)?;
                self.w.put_opaque(bytes)?;
            }
        } else {
            self.ctx
                .note(&field.name, MarshalError::TypeUnresolved(type_name.to_string()));
            self.w.put_count(0)?;
        }
        Ok(())
    }

    /// count, element size, type name, then rank/shape when the version allows.
    fn header(&mut self, count: usize, size: usize, type_name: &str, extent: &Extent) -> Step<()> {
        self.w.put_count(count)?;
        if count == 0 {
            return Ok(());
        }
        self.w.put_count(size)?;
        self.w.put_text(type_name)?;
        let rank = if extent.count == count { extent.rank } else { 1 };
        self.shape_block(count, rank, &extent.shape)
    }
}
