// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Allocation ledger and the block arena it describes.
//!
//! The [`Heap`] hands out [`Address`] handles; the [`AllocationLedger`] is the
//! single source of truth for how many elements of which type and shape live
//! behind each handle.

mod heap;
mod instances;
mod records;
pub mod resolve;

pub use heap::{Address, Heap, Scalar};
pub use instances::{InstanceEntry, StructureInstanceLedger};
pub use records::{AllocationLedger, AllocationRecord, LedgerMark, UNKNOWN_TYPE};
pub use resolve::{resolve_extent, Extent, PointerSite, ResolvePolicy, SIZE_FIELD_PREFIX};
