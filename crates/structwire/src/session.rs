// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshalling session.
//!
//! A [`Session`] owns one registry, one allocation ledger and the heap the
//! ledger describes. Every encode and decode borrows all three exclusively,
//! so a session serves one connection at a time; use one session per peer.

use crate::config::{MarshalConfig, POINTER_SIZE};
use crate::error::{Diagnostics, MarshalError, MarshalFailure, Result};
use crate::ledger::{Address, AllocationLedger, Heap, Scalar};
use crate::marshal::package::{read_header, write_header};
use crate::marshal::{decode_value, encode_value, Decoded, EncodeReport, MarshalContext, ResolutionCache};
use crate::tree::{self, DecodedTree, TreePrinter};
use crate::types::{AtomicType, FieldDescriptor, StringForm, TypeId, TypeRegistry, STRING_ARRAY_TYPE};
use crate::wire::{adopt_types, XdrReader, XdrWriter};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Registry, ledger and heap of one peer.
#[derive(Debug, Default)]
pub struct Session {
    registry: TypeRegistry,
    ledger: AllocationLedger,
    heap: Heap,
    config: MarshalConfig,
    resolved: ResolutionCache,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MarshalConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Session configured from `STRUCTWIRE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_config(MarshalConfig::from_env()?))
    }

    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MarshalConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Mutable registry access. Cached field resolutions are dropped.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        self.resolved.clear();
        &mut self.registry
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn type_id(&self, type_name: &str) -> Result<TypeId> {
        self.registry
            .resolve(type_name)
            .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))
    }

    // ------------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------------

    /// Allocate `count` zeroed instances of a registered type.
    pub fn alloc_struct(&mut self, type_name: &str, count: usize) -> Result<Address> {
        let size = self
            .registry
            .size_of(type_name)
            .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))?;
        let block = self.heap.alloc(size * count)?;
        self.ledger.record(block, count, size, type_name, 1, vec![count]);
        Ok(block)
    }

    /// Allocate a one-dimensional array holding `values`.
    pub fn alloc_slice<T: Scalar>(&mut self, values: &[T]) -> Result<Address> {
        self.alloc_shaped(values, &[values.len()])
    }

    /// Allocate an array with an explicit shape (fastest-varying dimension first).
    pub fn alloc_shaped<T: Scalar>(&mut self, values: &[T], shape: &[usize]) -> Result<Address> {
        if shape.iter().product::<usize>() != values.len() {
            return Err(MarshalError::SchemaMismatch {
                type_name: T::ATOMIC.name().to_string(),
                detail: format!("shape {:?} does not hold {} elements", shape, values.len()),
            });
        }
        let block = self.heap.alloc(values.len() * T::SIZE)?;
        for (i, &value) in values.iter().enumerate() {
            self.heap.write(block.add(i * T::SIZE), value)?;
        }
        self.ledger
            .record(block, values.len(), T::SIZE, T::ATOMIC.name(), shape.len(), shape.to_vec());
        Ok(block)
    }

    /// Allocate a NUL-terminated copy of `text`.
    pub fn alloc_string(&mut self, text: &str) -> Result<Address> {
        let len = text.len() + 1;
        let block = self.heap.alloc(len)?;
        self.heap.bytes_mut(block, text.len())?.copy_from_slice(text.as_bytes());
        self.ledger
            .record(block, len, 1, AtomicType::Char.name(), 1, vec![len]);
        Ok(block)
    }

    /// Allocate a pointer list referencing a fresh copy of each string.
    pub fn alloc_string_list(&mut self, items: &[&str]) -> Result<Address> {
        let list = self.heap.alloc(items.len() * POINTER_SIZE)?;
        self.ledger.record(
            list,
            items.len(),
            POINTER_SIZE,
            STRING_ARRAY_TYPE,
            1,
            vec![items.len()],
        );
        for (i, item) in items.iter().enumerate() {
            let text = self.alloc_string(item)?;
            self.heap.write_pointer(list.add(i * POINTER_SIZE), text)?;
        }
        Ok(list)
    }

    /// Adopt raw bytes of unknown type, as a foreign allocator would hand them over.
    pub fn alloc_foreign(&mut self, bytes: &[u8]) -> Result<Address> {
        let block = self.heap.alloc(bytes.len())?;
        self.heap.bytes_mut(block, bytes.len())?.copy_from_slice(bytes);
        self.ledger.record_foreign(block, bytes.len());
        Ok(block)
    }

    /// Free everything this session allocated or decoded.
    pub fn release_all(&mut self) -> usize {
        let freed = self.ledger.release_all(&mut self.heap);
        self.heap.release_all();
        freed
    }

    // ------------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------------

    fn descriptor(&self, type_name: &str, field_name: &str) -> Result<&FieldDescriptor> {
        let desc = self
            .registry
            .find(type_name)
            .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))?;
        desc.field(field_name).ok_or_else(|| MarshalError::FieldNotFound {
            type_name: type_name.to_string(),
            field: field_name.to_string(),
        })
    }

    /// Address of element `index` of an inline atomic field, checked against `T`.
    fn scalar_slot<T: Scalar>(
        &self,
        base: Address,
        type_name: &str,
        field_name: &str,
        index: usize,
    ) -> Result<Address> {
        let field = self.descriptor(type_name, field_name)?;
        let mismatch = || MarshalError::TypeMismatch {
            field: field_name.to_string(),
            expected: field.declaration(),
            found: T::NAME.to_string(),
        };
        let declared = field.atomic.ok_or_else(mismatch)?;
        if field.pointer || !holds(declared, T::ATOMIC) {
            return Err(mismatch());
        }
        if (index + 1) * T::SIZE > field.space() {
            return Err(MarshalError::InvalidAddress(base.add(field.offset + index * T::SIZE)));
        }
        Ok(base.add(field.offset + index * T::SIZE))
    }

    /// Store element `index` of an inline atomic field.
    pub fn set_field<T: Scalar>(
        &mut self,
        base: Address,
        type_name: &str,
        field_name: &str,
        index: usize,
        value: T,
    ) -> Result<()> {
        let at = self.scalar_slot::<T>(base, type_name, field_name, index)?;
        self.heap.write(at, value)
    }

    pub fn field<T: Scalar>(&self, base: Address, type_name: &str, field_name: &str, index: usize) -> Result<T> {
        let at = self.scalar_slot::<T>(base, type_name, field_name, index)?;
        self.heap.read(at)
    }

    fn pointer_slot(&self, base: Address, type_name: &str, field_name: &str) -> Result<Address> {
        let field = self.descriptor(type_name, field_name)?;
        if !field.pointer {
            return Err(MarshalError::TypeMismatch {
                field: field_name.to_string(),
                expected: field.declaration(),
                found: "pointer".to_string(),
            });
        }
        Ok(base.add(field.offset))
    }

    pub fn set_pointer(&mut self, base: Address, type_name: &str, field_name: &str, target: Address) -> Result<()> {
        let slot = self.pointer_slot(base, type_name, field_name)?;
        self.heap.write_pointer(slot, target)
    }

    pub fn pointer(&self, base: Address, type_name: &str, field_name: &str) -> Result<Address> {
        let slot = self.pointer_slot(base, type_name, field_name)?;
        self.heap.read_pointer(slot)
    }

    /// Every element of a ledger-recorded array, as `T`.
    pub fn read_slice<T: Scalar>(&self, block: Address) -> Result<Vec<T>> {
        if block.is_null() {
            return Ok(Vec::new());
        }
        let total = self.ledger.find(block)?.total_bytes();
        (0..total / T::SIZE)
            .map(|i| self.heap.read(block.add(i * T::SIZE)))
            .collect()
    }

    fn string_form(&self, type_name: &str, field_name: &str) -> Result<(StringForm, usize)> {
        let field = self.descriptor(type_name, field_name)?;
        let form = field.string_form().ok_or_else(|| MarshalError::TypeMismatch {
            field: field_name.to_string(),
            expected: field.declaration(),
            found: "string".to_string(),
        })?;
        Ok((form, field.offset))
    }

    /// Store string `index` of a string field.
    ///
    /// Fixed buffers are truncated to leave room for the terminator; pointer
    /// forms receive a freshly allocated copy.
    pub fn set_string(
        &mut self,
        base: Address,
        type_name: &str,
        field_name: &str,
        index: usize,
        text: &str,
    ) -> Result<()> {
        let (form, offset) = self.string_form(type_name, field_name)?;
        let at = base.add(offset);
        let out_of_range = || MarshalError::InvalidAddress(at);
        match form {
            StringForm::Fixed { len } if index == 0 => self.fill_buffer(at, len, text),
            StringForm::FixedArray { len, count } if index < count => {
                self.fill_buffer(at.add(index * len), len, text)
            }
            StringForm::Pointer if index == 0 => {
                let block = self.alloc_string(text)?;
                self.heap.write_pointer(at, block)
            }
            StringForm::PointerArray { count } if index < count => {
                let block = self.alloc_string(text)?;
                self.heap.write_pointer(at.add(index * POINTER_SIZE), block)
            }
            StringForm::PointerToPointers => Err(MarshalError::TypeMismatch {
                field: field_name.to_string(),
                expected: "string list".to_string(),
                found: "string".to_string(),
            }),
            _ => Err(out_of_range()),
        }
    }

    fn fill_buffer(&mut self, at: Address, len: usize, text: &str) -> Result<()> {
        let buffer = self.heap.bytes_mut(at, len)?;
        buffer.fill(0);
        let n = text.len().min(len.saturating_sub(1));
        buffer[..n].copy_from_slice(&text.as_bytes()[..n]);
        Ok(())
    }

    /// String `index` of a string field; `None` for a null pointer.
    pub fn string(&self, base: Address, type_name: &str, field_name: &str, index: usize) -> Result<Option<String>> {
        let (form, offset) = self.string_form(type_name, field_name)?;
        let at = base.add(offset);
        match form {
            StringForm::Fixed { len } if index == 0 => self.c_string(at, len).map(Some),
            StringForm::FixedArray { len, count } if index < count => {
                self.c_string(at.add(index * len), len).map(Some)
            }
            StringForm::Pointer if index == 0 => self.pointed_string(at),
            StringForm::PointerArray { count } if index < count => {
                self.pointed_string(at.add(index * POINTER_SIZE))
            }
            StringForm::PointerToPointers => {
                let list = self.heap.read_pointer(at)?;
                if list.is_null() {
                    return Ok(None);
                }
                let count = self.ledger.find(list)?.count;
                if index >= count {
                    return Err(MarshalError::InvalidAddress(list.add(index * POINTER_SIZE)));
                }
                self.pointed_string(list.add(index * POINTER_SIZE))
            }
            _ => Err(MarshalError::InvalidAddress(at)),
        }
    }

    /// Point a `char **` field at a fresh list of copies of `items`.
    pub fn set_string_list(&mut self, base: Address, type_name: &str, field_name: &str, items: &[&str]) -> Result<()> {
        let (form, offset) = self.string_form(type_name, field_name)?;
        if form != StringForm::PointerToPointers {
            return Err(MarshalError::TypeMismatch {
                field: field_name.to_string(),
                expected: "string".to_string(),
                found: "string list".to_string(),
            });
        }
        let list = self.alloc_string_list(items)?;
        self.heap.write_pointer(base.add(offset), list)
    }

    fn c_string(&self, at: Address, len: usize) -> Result<String> {
        let bytes = self.heap.bytes(at, len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    fn pointed_string(&self, slot: Address) -> Result<Option<String>> {
        let target = self.heap.read_pointer(slot)?;
        if target.is_null() {
            return Ok(None);
        }
        let len = match self.ledger.find(target) {
            Ok(record) => record.total_bytes(),
            Err(_) => self.heap.remaining(target).ok_or(MarshalError::InvalidAddress(target))?,
        };
        self.c_string(target, len).map(Some)
    }

    // ------------------------------------------------------------------------
    // Marshalling
    // ------------------------------------------------------------------------

    /// Encode the value of `type_name` at `base` (null is allowed).
    pub fn encode(
        &mut self,
        type_name: &str,
        base: Address,
        out: &mut dyn Write,
    ) -> std::result::Result<EncodeReport, MarshalFailure> {
        let type_id = self.type_id(type_name)?;
        let ctx = MarshalContext::new(
            &self.registry,
            &mut self.ledger,
            &mut self.heap,
            &self.config,
            &mut self.resolved,
        );
        encode_value(ctx, out, type_id, base)
    }

    /// Decode one value of `type_name`.
    ///
    /// On failure every block allocated by this call is released again.
    pub fn decode(&mut self, type_name: &str, input: &mut dyn Read) -> std::result::Result<Decoded, MarshalFailure> {
        self.decode_as(type_name, input, self.config.protocol_version)
    }

    fn decode_as(
        &mut self,
        type_name: &str,
        input: &mut dyn Read,
        protocol_version: u32,
    ) -> std::result::Result<Decoded, MarshalFailure> {
        let type_id = self.type_id(type_name)?;
        let config = self.config.clone().protocol_version(protocol_version);
        let mark = self.ledger.mark();
        let ctx = MarshalContext::new(
            &self.registry,
            &mut self.ledger,
            &mut self.heap,
            &config,
            &mut self.resolved,
        );
        let outcome = decode_value(ctx, input, type_id);
        if let Err(failure) = &outcome {
            let freed = self.ledger.rollback(mark, &mut self.heap);
            log::debug!("[session] decode of {} failed ({}), released {} blocks", type_name, failure, freed);
        }
        outcome
    }

    /// Write a self-describing package: version, type definitions, root type, value.
    pub fn encode_package(
        &mut self,
        type_name: &str,
        base: Address,
        out: &mut dyn Write,
    ) -> std::result::Result<EncodeReport, MarshalFailure> {
        self.type_id(type_name)?;
        let header_bytes = {
            let mut w = XdrWriter::new(&mut *out);
            write_header(&mut w, self.config.protocol_version, &self.registry, type_name)?;
            w.written()
        };
        let mut report = self.encode(type_name, base, out)?;
        report.bytes += header_bytes;
        Ok(report)
    }

    /// Read a package, adopting its type definitions into this session.
    pub fn decode_package(&mut self, input: &mut dyn Read) -> std::result::Result<Decoded, MarshalFailure> {
        let (header, header_bytes) = {
            let mut r = XdrReader::new(&mut *input);
            let header = read_header(&mut r)?;
            (header, r.consumed())
        };
        let mut typedefs = Diagnostics::new();
        adopt_types(self.registry_mut(), header.types, &mut typedefs)?;
        let typedefs = typedefs.into_vec();

        match self.decode_as(&header.root_type, input, header.protocol_version) {
            Ok(mut decoded) => {
                decoded.bytes += header_bytes;
                decoded.diagnostics = prepend(typedefs, decoded.diagnostics);
                Ok(decoded)
            }
            Err(mut failure) => {
                failure.diagnostics = prepend(typedefs, failure.diagnostics);
                Err(failure)
            }
        }
    }

    pub fn write_package_file(
        &mut self,
        path: impl AsRef<Path>,
        type_name: &str,
        base: Address,
    ) -> std::result::Result<EncodeReport, MarshalFailure> {
        let file = File::create(path.as_ref()).map_err(MarshalError::from)?;
        let mut out = BufWriter::new(file);
        self.encode_package(type_name, base, &mut out)
    }

    pub fn read_package_file(&mut self, path: impl AsRef<Path>) -> std::result::Result<Decoded, MarshalFailure> {
        let file = File::open(path.as_ref()).map_err(MarshalError::from)?;
        let mut input = BufReader::new(file);
        self.decode_package(&mut input)
    }

    // ------------------------------------------------------------------------
    // Decoded trees
    // ------------------------------------------------------------------------

    /// Grow every ragged instance of `type_name` in `tree` to the longest one.
    pub fn regularize(&mut self, tree: &mut DecodedTree, type_name: &str) -> Result<usize> {
        tree::regularize(tree, &mut self.registry, &mut self.ledger, &mut self.heap, type_name)
    }

    /// Regularize ragged types, deepest first, until none remain.
    pub fn regularize_all(&mut self, tree: &mut DecodedTree) -> Result<usize> {
        tree::regularize_all(tree, &mut self.registry, &mut self.ledger, &mut self.heap)
    }

    pub fn max_ragged_count(&self, tree: &DecodedTree, type_name: &str) -> Result<usize> {
        tree.max_ragged_count(&self.registry, &self.heap, type_name)
    }

    pub fn printer<'a>(&'a self, tree: &'a DecodedTree) -> TreePrinter<'a> {
        TreePrinter::new(tree, &self.registry, &self.heap, &self.ledger)
    }
}

fn prepend<T>(mut head: Vec<T>, tail: Vec<T>) -> Vec<T> {
    head.extend(tail);
    head
}

/// Whether a field declared as `declared` can be accessed as `scalar`.
fn holds(declared: AtomicType, scalar: AtomicType) -> bool {
    declared == scalar
        || (declared.is_char() && scalar.is_char())
        || (declared.is_integer() && scalar.is_integer() && declared.native_size() == scalar.native_size())
}
