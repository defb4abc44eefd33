// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Allocation ledger: what lives at each tracked address.

use super::heap::{Address, Heap};
use crate::error::{MarshalError, Result};
use std::collections::HashMap;

/// Declared type of a block whose element type is not known.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Bookkeeping for one tracked block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    pub address: Address,
    pub count: usize,
    /// Bytes per element.
    pub size: usize,
    pub type_name: String,
    pub rank: usize,
    pub shape: Vec<usize>,
    /// Set once released, and from the start for non-owned records.
    pub freed: bool,
    /// Memory belongs to a parent block.
    pub fixed: bool,
}

impl AllocationRecord {
    pub fn total_bytes(&self) -> usize {
        self.count * self.size
    }

    /// Produced by a foreign allocation path with no element type.
    pub fn is_unresolved(&self) -> bool {
        self.type_name == UNKNOWN_TYPE
    }
}

/// Position in the ledger, for [`AllocationLedger::rollback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerMark(usize);

/// Ordered allocation records with an address index.
///
/// Owned records shadow fixed ones at the same address: the first field of an
/// inline structure shares its address with the enclosing block.
#[derive(Debug, Default)]
pub struct AllocationLedger {
    records: Vec<AllocationRecord>,
    index: HashMap<Address, usize>,
}

impl AllocationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an owned block.
    pub fn record(
        &mut self,
        address: Address,
        count: usize,
        size: usize,
        type_name: impl Into<String>,
        rank: usize,
        shape: Vec<usize>,
    ) {
        let type_name = type_name.into();
        log::trace!(
            "[ledger] record {} count {} size {} type {}",
            address,
            count,
            size,
            type_name
        );
        self.index.insert(address, self.records.len());
        self.records.push(AllocationRecord {
            address,
            count,
            size,
            type_name,
            rank,
            shape,
            freed: false,
            fixed: false,
        });
    }

    /// Track memory owned by a parent block (never freed by the ledger).
    pub fn record_fixed(
        &mut self,
        address: Address,
        count: usize,
        size: usize,
        type_name: impl Into<String>,
    ) {
        let position = self.records.len();
        self.index.entry(address).or_insert(position);
        self.records.push(AllocationRecord {
            address,
            count,
            size,
            type_name: type_name.into(),
            rank: usize::from(count > 1),
            shape: if count > 1 { vec![count] } else { Vec::new() },
            freed: true,
            fixed: true,
        });
    }

    /// Track a block handed over by a foreign allocator: only its byte size is known.
    pub fn record_foreign(&mut self, address: Address, total_bytes: usize) {
        self.record(address, 1, total_bytes, UNKNOWN_TYPE, 0, Vec::new());
    }

    pub fn find(&self, address: Address) -> Result<&AllocationRecord> {
        self.index
            .get(&address)
            .and_then(|&i| self.records.get(i))
            .ok_or(MarshalError::NotFound(address))
    }

    /// Record that a block moved or changed size.
    pub fn reallocate(
        &mut self,
        old: Address,
        new: Address,
        count: usize,
        size: usize,
        type_name: impl Into<String>,
    ) -> Result<()> {
        let position = *self.index.get(&old).ok_or(MarshalError::NotFound(old))?;
        let record = &mut self.records[position];
        record.address = new;
        record.count = count;
        record.size = size;
        record.type_name = type_name.into();
        if record.rank <= 1 {
            record.rank = 1;
            record.shape = vec![count];
        }
        if old != new {
            self.index.remove(&old);
            self.index.insert(new, position);
        }
        log::trace!("[ledger] reallocate {} -> {} count {}", old, new, count);
        Ok(())
    }

    pub fn mark(&self) -> LedgerMark {
        LedgerMark(self.records.len())
    }

    /// Drop every record made after `mark`, freeing the blocks they own.
    pub fn rollback(&mut self, mark: LedgerMark, heap: &mut Heap) -> usize {
        if mark.0 >= self.records.len() {
            return 0;
        }
        let mut freed = 0;
        for record in self.records.drain(mark.0..) {
            if !record.freed && heap.free(record.address) {
                freed += 1;
            }
        }
        self.reindex();
        log::debug!("[ledger] rolled back to {} records, freed {} blocks", mark.0, freed);
        freed
    }

    /// Free every owned block and forget all records.
    pub fn release_all(&mut self, heap: &mut Heap) -> usize {
        let mut freed = 0;
        for record in &mut self.records {
            if !record.freed {
                if heap.free(record.address) {
                    freed += 1;
                }
                record.freed = true;
            }
        }
        self.records.clear();
        self.index.clear();
        log::debug!("[ledger] released {} blocks", freed);
        freed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.records.iter()
    }

    /// Owned (non-fixed) records still holding memory.
    pub fn live_owned(&self) -> usize {
        self.records.iter().filter(|r| !r.fixed && !r.freed).count()
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, record) in self.records.iter().enumerate() {
            if record.fixed {
                self.index.entry(record.address).or_insert(position);
            } else {
                self.index.insert(record.address, position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_find() {
        let mut heap = Heap::new();
        let mut ledger = AllocationLedger::new();
        let a = heap.alloc(24).unwrap();
        ledger.record(a, 3, 8, "double", 1, vec![3]);
        let record = ledger.find(a).unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(record.total_bytes(), 24);
        assert!(!record.is_unresolved());
        assert!(matches!(ledger.find(a.add(8)), Err(MarshalError::NotFound(_))));
    }

    #[test]
    fn test_fixed_does_not_shadow_owned() {
        let mut heap = Heap::new();
        let mut ledger = AllocationLedger::new();
        let a = heap.alloc(16).unwrap();
        ledger.record(a, 1, 16, "Outer", 0, Vec::new());
        ledger.record_fixed(a, 1, 8, "Inner");
        ledger.record_fixed(a.add(8), 2, 4, "int");
        assert_eq!(ledger.find(a).unwrap().type_name, "Outer");
        let inner = ledger.find(a.add(8)).unwrap();
        assert!(inner.fixed && inner.freed);
        assert_eq!(inner.shape, vec![2]);
    }

    #[test]
    fn test_reallocate_moves_index() {
        let mut heap = Heap::new();
        let mut ledger = AllocationLedger::new();
        let a = heap.alloc(8).unwrap();
        let b = heap.alloc(16).unwrap();
        ledger.record(a, 2, 4, "int", 0, Vec::new());
        ledger.reallocate(a, b, 4, 4, "int").unwrap();
        assert!(ledger.find(a).is_err());
        let moved = ledger.find(b).unwrap();
        assert_eq!(moved.count, 4);
        assert_eq!(moved.shape, vec![4]);
        assert!(ledger.reallocate(a, b, 1, 1, "x").is_err());
    }

    #[test]
    fn test_release_all_frees_owned_once() {
        let mut heap = Heap::new();
        let mut ledger = AllocationLedger::new();
        let a = heap.alloc(8).unwrap();
        let b = heap.alloc(8).unwrap();
        ledger.record(a, 1, 8, "double", 0, Vec::new());
        ledger.record_fixed(a, 1, 8, "double");
        ledger.record_foreign(b, 8);
        assert_eq!(ledger.live_owned(), 2);
        assert_eq!(ledger.release_all(&mut heap), 2);
        assert!(ledger.is_empty());
        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(ledger.release_all(&mut heap), 0);
    }

    #[test]
    fn test_rollback() {
        let mut heap = Heap::new();
        let mut ledger = AllocationLedger::new();
        let keep = heap.alloc(4).unwrap();
        ledger.record(keep, 1, 4, "int", 0, Vec::new());
        let mark = ledger.mark();
        let drop_a = heap.alloc(4).unwrap();
        ledger.record(drop_a, 1, 4, "int", 0, Vec::new());
        ledger.record_fixed(drop_a, 1, 4, "int");
        assert_eq!(ledger.rollback(mark, &mut heap), 1);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.find(keep).is_ok());
        assert!(ledger.find(drop_a).is_err());
        assert!(!heap.is_live(drop_a));
        assert!(heap.is_live(keep));
    }

    #[test]
    fn test_foreign_record_is_unresolved() {
        let mut ledger = AllocationLedger::new();
        let mut heap = Heap::new();
        let a = heap.alloc(40).unwrap();
        ledger.record_foreign(a, 40);
        let record = ledger.find(a).unwrap();
        assert!(record.is_unresolved());
        assert_eq!(record.total_bytes(), 40);
    }
}
