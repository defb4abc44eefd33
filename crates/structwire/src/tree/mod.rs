// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded-instance tree.
//!
//! The decoder creates one [`TreeNode`] per structure element it fills, so
//! callers can navigate a value whose type they never compiled. Nodes sit in
//! an arena and refer to their parent by index.

mod node;
mod print;
mod query;
mod regularize;

pub use node::{DecodedTree, NodeId, TreeNode};
pub use print::{format_scalar, TreePrinter, DEFAULT_MAX_ELEMENTS};
pub use regularize::{regularize, regularize_all};
