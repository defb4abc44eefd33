// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-only lookups over a [`DecodedTree`].
//!
//! Searches start at the given node (inclusive) and walk depth-first in
//! encounter order; the first match wins.

use super::node::{DecodedTree, NodeId};
use crate::error::{MarshalError, Result};
use crate::ledger::resolve::read_integer;
use crate::ledger::{Address, Heap};
use crate::types::{
    FieldDescriptor, TypeClass, TypeDescriptor, TypeRegistry, RAGGED_DATA_FIELD, RAGGED_LEN_FIELD,
};

/// `len` and `data` fields of a ragged type.
///
/// Falls back to the first scalar integer field and the first pointer field
/// when the conventional names are absent.
pub(crate) fn ragged_fields(desc: &TypeDescriptor) -> Option<(&FieldDescriptor, &FieldDescriptor)> {
    let len = desc.field(RAGGED_LEN_FIELD).or_else(|| {
        desc.fields
            .iter()
            .find(|f| !f.pointer && f.count == 1 && f.atomic.is_some_and(|a| a.is_integer()))
    })?;
    let data = desc
        .field(RAGGED_DATA_FIELD)
        .or_else(|| desc.fields.iter().find(|f| f.pointer))?;
    Some((len, data))
}

fn split_path(path: &str) -> Vec<&str> {
    path.split(['.', '/']).filter(|s| !s.is_empty()).collect()
}

impl DecodedTree {
    /// Node named `name_or_path`, or holding an atomic field of that name.
    ///
    /// A dotted or slashed path follows named children; its last segment may
    /// also name an atomic field of the node reached.
    pub fn find_member(&self, registry: &TypeRegistry, from: NodeId, name_or_path: &str) -> Option<NodeId> {
        let segments = split_path(name_or_path);
        match segments.as_slice() {
            [] => None,
            [name] => self.descendants(from).into_iter().find(|&id| {
                self.get(id).is_some_and(|node| {
                    node.name == *name
                        || registry
                            .get(node.type_id)
                            .and_then(|d| d.field(name))
                            .is_some_and(|f| f.atomic.is_some())
                })
            }),
            [walk @ .., last] => {
                let mut cursor = from;
                for segment in walk {
                    cursor = self.child_named(cursor, segment)?;
                }
                self.child_named(cursor, last).or_else(|| {
                    let node = self.get(cursor)?;
                    registry
                        .get(node.type_id)
                        .and_then(|d| d.field(last))
                        .filter(|f| f.atomic.is_some())
                        .map(|_| cursor)
                })
            }
        }
    }

    /// Structure node named `name_or_path`; atomic fields never match.
    pub fn find_structure(&self, from: NodeId, name_or_path: &str) -> Option<NodeId> {
        let segments = split_path(name_or_path);
        match segments.as_slice() {
            [] => None,
            [name] => self
                .descendants(from)
                .into_iter()
                .find(|&id| self.get(id).is_some_and(|n| n.name == *name)),
            path => path
                .iter()
                .try_fold(from, |cursor, segment| self.child_named(cursor, segment)),
        }
    }

    pub fn find_by_type_name(&self, registry: &TypeRegistry, from: NodeId, type_name: &str) -> Option<NodeId> {
        let type_id = registry.resolve(type_name)?;
        self.descendants(from)
            .into_iter()
            .find(|&id| self.get(id).is_some_and(|n| n.type_id == type_id))
    }

    /// Node whose type has a nested field declared as `type_name`.
    pub fn find_by_component_type(
        &self,
        registry: &TypeRegistry,
        from: NodeId,
        type_name: &str,
    ) -> Option<NodeId> {
        self.descendants(from).into_iter().find(|&id| {
            self.get(id)
                .and_then(|n| registry.get(n.type_id))
                .is_some_and(|d| {
                    d.fields
                        .iter()
                        .any(|f| f.atomic.is_none() && f.type_name == type_name)
                })
        })
    }

    pub fn find_by_address(&self, from: NodeId, address: Address) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|&id| self.get(id).is_some_and(|n| n.address == address))
    }

    /// Every node whose type currently has `class`.
    pub fn find_by_class(&self, registry: &TypeRegistry, from: NodeId, class: TypeClass) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|&id| {
                self.get(id)
                    .and_then(|n| registry.get(n.type_id))
                    .is_some_and(|d| d.class == class)
            })
            .collect()
    }

    /// Largest `len` over all instances of the ragged type `type_name`.
    pub fn max_ragged_count(&self, registry: &TypeRegistry, heap: &Heap, type_name: &str) -> Result<usize> {
        let type_id = registry
            .resolve(type_name)
            .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))?;
        let desc = registry
            .get(type_id)
            .ok_or_else(|| MarshalError::TypeUnresolved(type_name.to_string()))?;
        let (len_field, _) = ragged_fields(desc).ok_or_else(|| MarshalError::SchemaMismatch {
            type_name: type_name.to_string(),
            detail: "no length/data field pair".to_string(),
        })?;
        let Some(atomic) = len_field.atomic else {
            return Ok(0);
        };
        let max = self
            .iter()
            .filter(|(_, n)| n.type_id == type_id)
            .filter_map(|(_, n)| read_integer(heap, n.address.add(len_field.offset), atomic))
            .filter_map(|v| usize::try_from(v).ok())
            .max()
            .unwrap_or(0);
        Ok(max)
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.name == name))
    }
}
