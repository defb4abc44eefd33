// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Run-time type descriptor model.
//!
//! Describes aggregate layouts independently of any compiled Rust type, so
//! the same codec walks values built through the API and values whose layout
//! was learned from a declaration file or from a peer.
//!
//! # Example
//!
//! ```
//! use structwire::types::{TypeDescriptorBuilder, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! TypeDescriptorBuilder::new("Point")
//!     .atomic("x", "double")
//!     .atomic("y", "double")
//!     .register(&mut registry)
//!     .unwrap();
//! TypeDescriptorBuilder::new("Path")
//!     .atomic("count", "int")
//!     .pointer("pts", "Point")
//!     .register(&mut registry)
//!     .unwrap();
//!
//! let path = registry.find("Path").unwrap();
//! assert_eq!(path.field("pts").unwrap().offset, 8);
//! assert_eq!(path.size, 16);
//! ```

mod atomic;
mod builder;
mod descriptor;
mod layout;
pub mod parse;
mod registry;
mod table;

pub use atomic::{AtomicType, NOT_ATOMIC_TAG};
pub use builder::{TypeDescriptorBuilder, RAGGED_DATA_FIELD, RAGGED_LEN_FIELD};
pub use descriptor::{
    FieldDecl, FieldDescriptor, StringForm, TypeClass, TypeDescriptor, OPAQUE_TYPE,
    STRING_ARRAY_TYPE, STRING_TYPE, VOID_TYPE,
};
pub use layout::{align_up, checked_align_up, layout_fields, Layout, MAX_TYPE_SIZE};
pub use parse::{parse_declarations, parse_file, DeclarationParser};
pub use registry::{TypeId, TypeRegistry};
pub use table::TypeTable;
