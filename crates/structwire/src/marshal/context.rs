// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! State threaded through one encode or decode call.

use crate::config::MarshalConfig;
use crate::error::{Diagnostic, Diagnostics, MarshalError, MarshalFailure, WireError};
use crate::ledger::{AllocationLedger, Heap, ResolvePolicy};
use crate::types::{TypeId, TypeRegistry};
use std::collections::HashMap;

/// Result of a codec step: fatal conditions only.
pub(crate) type Step<T> = std::result::Result<T, MarshalFailure>;

/// `(owner type, field index) -> nested type`, kept for the life of a session.
pub type ResolutionCache = HashMap<(TypeId, usize), Option<TypeId>>;

/// Everything the recursive codec reads or mutates.
///
/// The registry is shared; the ledger and heap are borrowed exclusively for
/// the duration of the call. Non-fatal conditions accumulate in
/// `diagnostics`.
pub struct MarshalContext<'a> {
    pub registry: &'a TypeRegistry,
    pub ledger: &'a mut AllocationLedger,
    pub heap: &'a mut Heap,
    pub config: &'a MarshalConfig,
    pub diagnostics: Diagnostics,
    resolved: &'a mut ResolutionCache,
    depth: usize,
    path: Vec<String>,
}

impl<'a> MarshalContext<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        ledger: &'a mut AllocationLedger,
        heap: &'a mut Heap,
        config: &'a MarshalConfig,
        resolved: &'a mut ResolutionCache,
    ) -> Self {
        Self {
            registry,
            ledger,
            heap,
            config,
            diagnostics: Diagnostics::new(),
            resolved,
            depth: 0,
            path: Vec::new(),
        }
    }

    /// Enter one structure element.
    pub(crate) fn enter(&mut self, label: &str) -> Step<()> {
        if self.depth >= self.config.max_depth {
            return Err(MarshalFailure::new(MarshalError::RecursionLimitExceeded {
                depth: self.depth + 1,
                limit: self.config.max_depth,
            }));
        }
        self.depth += 1;
        self.path.push(label.to_string());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.path.pop();
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Nested type of a field, resolved once per session.
    pub(crate) fn nested_type(&mut self, owner: TypeId, field_index: usize, type_name: &str) -> Option<TypeId> {
        let registry = self.registry;
        *self
            .resolved
            .entry((owner, field_index))
            .or_insert_with(|| registry.resolve(type_name))
    }

    pub(crate) fn policy(&self) -> ResolvePolicy {
        ResolvePolicy {
            source: self.config.allocation_source,
            max_string_guess: self.config.max_string_guess,
        }
    }

    /// Record a non-fatal condition on `field` of the current element.
    pub(crate) fn note(&mut self, field: &str, error: MarshalError) {
        let location = match self.path.is_empty() {
            true => field.to_string(),
            false => format!("{}.{}", self.path.join("."), field),
        };
        self.diagnostics.push(location, error);
    }

    /// Byte size of `count` elements of `size`, bounded by `max_block_bytes`.
    pub(crate) fn check_block(&self, count: usize, size: usize) -> Step<usize> {
        let limit = self.config.max_block_bytes;
        match count.checked_mul(size) {
            Some(total) if total <= limit => Ok(total),
            total => Err(WireError::BlockTooLarge {
                requested: total.unwrap_or(usize::MAX),
                limit,
            }
            .into()),
        }
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_vec()
    }
}

/// Rank and shape as exchanged on the wire.
///
/// Rank 1 always has shape `[count]`; a multi-dimensional shape that does not
/// multiply out to `count` degrades to rank 1.
pub(crate) fn wire_shape(count: usize, rank: usize, shape: &[usize]) -> (usize, Vec<usize>) {
    match rank {
        0 => (0, Vec::new()),
        r if r > 1 && shape.len() == r && shape_elements(shape) == Some(count) => (r, shape.to_vec()),
        _ => (1, vec![count]),
    }
}

/// Element count of `shape`, or `None` when the product overflows.
pub(crate) fn shape_elements(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}
