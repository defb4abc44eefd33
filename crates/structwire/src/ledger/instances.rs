// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structure instances seen during one encode call.

use super::heap::Address;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEntry {
    pub id: usize,
    pub type_name: String,
    /// Times the instance was encoded.
    pub visits: usize,
}

/// Address -> (id, type) of every structure element encoded in one call.
///
/// Used to report shared instances. It does not suppress re-encoding; cycles
/// are bounded by the depth guard.
#[derive(Debug, Default)]
pub struct StructureInstanceLedger {
    entries: HashMap<(Address, String), InstanceEntry>,
    next_id: usize,
    repeats: usize,
}

impl StructureInstanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a visit; returns the id and whether the instance was seen before.
    pub fn visit(&mut self, address: Address, type_name: &str) -> (usize, bool) {
        let key = (address, type_name.to_string());
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.visits += 1;
            self.repeats += 1;
            return (entry.id, true);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            key,
            InstanceEntry {
                id,
                type_name: type_name.to_string(),
                visits: 1,
            },
        );
        (id, false)
    }

    pub fn get(&self, address: Address, type_name: &str) -> Option<&InstanceEntry> {
        self.entries.get(&(address, type_name.to_string()))
    }

    /// Distinct instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visits to instances already encoded earlier in the call.
    pub fn repeats(&self) -> usize {
        self.repeats
    }
}
