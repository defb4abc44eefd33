// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive structure marshaller.
//!
//! Walks a value through its [`TypeDescriptor`](crate::types::TypeDescriptor)
//! and writes it as XDR words, or reads such a stream back into freshly
//! allocated, ledger-recorded heap blocks.
//!
//! Fatal conditions (wire failures, the depth guard) unwind to the top-level
//! call as a [`MarshalFailure`](crate::MarshalFailure); everything else is
//! collected as diagnostics and processing continues.

mod context;
mod decode;
mod encode;
pub mod package;


pub use context::{MarshalContext, ResolutionCache};
pub(crate) use decode::decode_value;
pub(crate) use encode::encode_value;

use crate::error::Diagnostic;
use crate::ledger::Address;
use crate::tree::DecodedTree;

/// Outcome of a successful encode.
#[derive(Debug, Default)]
pub struct EncodeReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Distinct structure instances written.
    pub instances: usize,
    /// Instances reached more than once.
    pub repeats: usize,
    /// Bytes written to the transport.
    pub bytes: usize,
}

/// Outcome of a successful decode.
#[derive(Debug)]
pub struct Decoded {
    pub type_name: String,
    /// Root element, or null when the sender's value was null.
    pub root: Address,
    pub tree: DecodedTree,
    pub diagnostics: Vec<Diagnostic>,
    /// Bytes consumed from the transport.
    pub bytes: usize,
    pub protocol_version: u32,
}

impl Decoded {
    pub fn is_null(&self) -> bool {
        self.root.is_null()
    }
}
