// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pointer extent resolution.
//!
//! A pointer field carries no length. Its extent comes from the ledger, and
//! for blocks produced by a foreign allocator (record type `unknown`, or no
//! record at all) from these heuristics, tried in order:
//!
//! 1. **size field**: with [`AllocationSource::SizeFieldProducer`], a
//!    preceding integer field named `__size<field>` holds the count.
//! 2. **division**: tracked bytes divided by the declared element size; a
//!    remainder is a [`MarshalError::SchemaMismatch`].
//! 3. **bounded string**: character fields scan for a terminator within
//!    `max_string_guess` bytes.
//!
//! A failed resolution is never fatal: the caller sends the field empty and
//! records the returned error.

use super::heap::{Address, Heap};
use super::records::AllocationLedger;
use crate::config::AllocationSource;
use crate::error::{MarshalError, Result};
use crate::types::{AtomicType, FieldDescriptor, OPAQUE_TYPE};

/// Prefix of the count field paired with an array field.
pub const SIZE_FIELD_PREFIX: &str = "__size";

/// What a pointer references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub count: usize,
    /// Bytes per element.
    pub size: usize,
    pub type_name: String,
    pub rank: usize,
    pub shape: Vec<usize>,
}

impl Extent {
    pub fn flat(count: usize, size: usize, type_name: impl Into<String>) -> Self {
        Self {
            count,
            size,
            type_name: type_name.into(),
            rank: 0,
            shape: Vec::new(),
        }
    }
}

/// A pointer field about to be marshalled.
#[derive(Debug, Clone, Copy)]
pub struct PointerSite<'a> {
    pub field: &'a FieldDescriptor,
    /// Preceding field of the same element and its address.
    pub previous: Option<(&'a FieldDescriptor, Address)>,
    /// Value of the pointer.
    pub target: Address,
    /// Declared element size; 0 when the declared type has no known size.
    pub element_size: usize,
    /// Element type assumed when the ledger cannot say.
    pub element_type: &'a str,
}

/// Heuristic settings taken from the session configuration.
#[derive(Debug, Clone, Copy)]
pub struct ResolvePolicy {
    pub source: AllocationSource,
    pub max_string_guess: usize,
}

/// Resolve the extent behind `site.target`.
pub fn resolve_extent(
    ledger: &AllocationLedger,
    heap: &Heap,
    policy: ResolvePolicy,
    site: &PointerSite<'_>,
) -> Result<Extent> {
    match ledger.find(site.target) {
        Ok(record) if !record.is_unresolved() => Ok(Extent {
            count: record.count,
            size: record.size,
            type_name: record.type_name.clone(),
            rank: record.rank,
            shape: record.shape.clone(),
        }),
        Ok(record) => guess(heap, policy, site, Some(record.total_bytes())),
        Err(err) if !policy.source.is_foreign() => Err(err),
        Err(_) => guess(heap, policy, site, None),
    }
}

fn guess(
    heap: &Heap,
    policy: ResolvePolicy,
    site: &PointerSite<'_>,
    tracked_bytes: Option<usize>,
) -> Result<Extent> {
    if let Some(count) = size_field_count(heap, policy, site) {
        // The size field must not claim more than the block holds.
        let available = tracked_bytes.or_else(|| heap.remaining(site.target)).unwrap_or(0);
        let claimed = count.checked_mul(site.element_size.max(1));
        if claimed.map_or(true, |bytes| bytes > available) {
            return Err(MarshalError::SchemaMismatch {
                type_name: site.element_type.to_string(),
                detail: format!(
                    "size field claims {} elements of {} bytes, block holds {} bytes",
                    count, site.element_size, available
                ),
            });
        }
        log::debug!("[resolve] {}: count {} from size field", site.field.name, count);
        return Ok(Extent::flat(count, site.element_size, site.element_type));
    }

    if let Some(total) = tracked_bytes.filter(|_| site.element_size > 0) {
        if total % site.element_size != 0 {
            return Err(MarshalError::SchemaMismatch {
                type_name: site.element_type.to_string(),
                detail: format!(
                    "{} tracked bytes are not a multiple of element size {}",
                    total, site.element_size
                ),
            });
        }
        let count = total / site.element_size;
        log::debug!("[resolve] {}: count {} from {} tracked bytes", site.field.name, count, total);
        return Ok(Extent::flat(count, site.element_size, site.element_type));
    }

    if is_text(site) {
        if let Some(len) = heap.c_str_len(site.target, policy.max_string_guess) {
            log::debug!("[resolve] {}: bounded string of {} bytes", site.field.name, len);
            return Ok(Extent::flat(len + 1, 1, site.element_type));
        }
    }

    Err(MarshalError::NotFound(site.target))
}

fn size_field_count(heap: &Heap, policy: ResolvePolicy, site: &PointerSite<'_>) -> Option<usize> {
    if policy.source != AllocationSource::SizeFieldProducer {
        return None;
    }
    let (previous, at) = site.previous?;
    let paired = previous.name.strip_prefix(SIZE_FIELD_PREFIX)? == site.field.name;
    if !paired || previous.pointer || previous.count != 1 {
        return None;
    }
    let value = read_integer(heap, at, previous.atomic?)?;
    usize::try_from(value).ok()
}

/// Integer stored at `at` as `atomic`, widened to `i64`.
pub(crate) fn read_integer(heap: &Heap, at: Address, atomic: AtomicType) -> Option<i64> {
    let value = match atomic {
        AtomicType::Char => i64::from(heap.read::<i8>(at).ok()?),
        AtomicType::UnsignedChar => i64::from(heap.read::<u8>(at).ok()?),
        AtomicType::Short => i64::from(heap.read::<i16>(at).ok()?),
        AtomicType::UnsignedShort => i64::from(heap.read::<u16>(at).ok()?),
        AtomicType::Int => i64::from(heap.read::<i32>(at).ok()?),
        AtomicType::UnsignedInt => i64::from(heap.read::<u32>(at).ok()?),
        AtomicType::Long | AtomicType::Long64 => heap.read::<i64>(at).ok()?,
        AtomicType::UnsignedLong | AtomicType::UnsignedLong64 => {
            i64::try_from(heap.read::<u64>(at).ok()?).ok()?
        }
        _ => return None,
    };
    Some(value)
}

/// Store `value` at `at` as `atomic` (truncating).
pub(crate) fn write_integer(heap: &mut Heap, at: Address, atomic: AtomicType, value: i64) -> Result<()> {
    match atomic {
        AtomicType::Char => heap.write(at, value as i8),
        AtomicType::UnsignedChar => heap.write(at, value as u8),
        AtomicType::Short => heap.write(at, value as i16),
        AtomicType::UnsignedShort => heap.write(at, value as u16),
        AtomicType::Int => heap.write(at, value as i32),
        AtomicType::UnsignedInt => heap.write(at, value as u32),
        AtomicType::Long | AtomicType::Long64 => heap.write(at, value),
        AtomicType::UnsignedLong | AtomicType::UnsignedLong64 => heap.write(at, value as u64),
        other => Err(MarshalError::TypeMismatch {
            field: String::new(),
            expected: "integer".to_string(),
            found: other.name().to_string(),
        }),
    }
}

fn is_text(site: &PointerSite<'_>) -> bool {
    site.field.atomic.is_some_and(AtomicType::is_char)
        || AtomicType::from_name(site.element_type).is_some_and(AtomicType::is_char)
        || site.element_type == OPAQUE_TYPE
}
