// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # structwire - self-describing structure marshalling
//!
//! Exchanges arbitrarily shaped aggregate values (nested structures, fixed
//! arrays, variable-length arrays, strings) between peers that share no
//! compiled type definition. Layouts are described at run time, pointer
//! extents come from an allocation ledger, and the receiving side rebuilds
//! the values together with a navigable tree of the decoded structure.
//!
//! ## Quick Start
//!
//! ```rust
//! use structwire::{MemoryTransport, Session, TypeDescriptorBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sender = Session::default();
//! TypeDescriptorBuilder::new("Point")
//!     .atomic("x", "double")
//!     .atomic("y", "double")
//!     .register(sender.registry_mut())?;
//!
//! let point = sender.alloc_struct("Point", 1)?;
//! sender.set_field(point, "Point", "x", 0, 1.5_f64)?;
//! sender.set_field(point, "Point", "y", 0, -2.0_f64)?;
//!
//! let mut wire = MemoryTransport::new();
//! sender.encode("Point", point, &mut wire)?;
//!
//! let mut receiver = Session::default();
//! receiver.registry_mut().insert(sender.registry().find("Point").cloned().unwrap())?;
//! let decoded = receiver.decode("Point", &mut wire)?;
//! let y: f64 = receiver.field(decoded.root, "Point", "y", 0)?;
//! assert_eq!(y, -2.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                 Session (registry + ledger + heap)                  |
//! +---------------------------------------------------------------------+
//! |  tree      | DecodedTree, queries, ragged-array regularization      |
//! +---------------------------------------------------------------------+
//! |  marshal   | MarshalContext, recursive encoder/decoder, packages    |
//! +---------------------------------------------------------------------+
//! |  wire      | XDR words, string primitive, type-definition exchange  |
//! +---------------------------------------------------------------------+
//! |  ledger    | Heap arena + AllocationLedger + extent heuristics      |
//! +---------------------------------------------------------------------+
//! |  types     | AtomicType, FieldDescriptor, TypeDescriptor, registry  |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`types`] - run-time type descriptors, layout rules, declaration parser
//! - [`ledger`] - handle-addressed heap and allocation bookkeeping
//! - [`wire`] - XDR primitives and the transport abstraction
//! - [`marshal`] - the recursive codec
//! - [`tree`] - decoded-instance tree and its queries
//! - [`config`] - constants and [`MarshalConfig`]

pub mod config;
pub mod error;
pub mod ledger;
pub mod marshal;
pub mod session;
pub mod tree;
pub mod types;
pub mod wire;

pub use config::{AllocationSource, MarshalConfig};
pub use error::{Diagnostic, Diagnostics, MarshalError, MarshalFailure, Result, WireError};
pub use ledger::{Address, AllocationLedger, AllocationRecord, Heap, Scalar};
pub use marshal::{Decoded, EncodeReport};
pub use session::Session;
pub use tree::{DecodedTree, NodeId, TreeNode, TreePrinter};
pub use types::{
    AtomicType, FieldDecl, FieldDescriptor, TypeClass, TypeDescriptor, TypeDescriptorBuilder,
    TypeId, TypeRegistry,
};
pub use wire::{MemoryTransport, Transport};
