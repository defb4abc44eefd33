// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error kinds, non-fatal diagnostics and the single reported failure.
//!
//! Two tiers exist. Local conditions ([`MarshalError::NotFound`],
//! [`MarshalError::TypeUnresolved`], [`MarshalError::SchemaMismatch`]) are
//! pushed onto a [`Diagnostics`] list while the codec carries on with an empty
//! or skipped field. Wire faults and recursion overflow abort the whole call
//! and surface as a [`MarshalFailure`].

use crate::ledger::Address;
use std::fmt;
use std::io;
use thiserror::Error;

/// Failure of a single wire primitive.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("length {len} exceeds limit {limit}")]
    LengthOutOfRange { len: usize, limit: usize },

    #[error("negative count {0} on the wire")]
    NegativeCount(i32),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown atomic type tag {0}")]
    UnknownAtomicTag(i32),

    #[error("block of {requested} bytes exceeds the {limit} byte limit")]
    BlockTooLarge { requested: usize, limit: usize },
}

/// Marshaller error.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// Ledger lookup miss.
    #[error("no allocation recorded at {0}")]
    NotFound(Address),

    /// Named type absent from the registry.
    #[error("type `{0}` is not registered")]
    TypeUnresolved(String),

    #[error("recursion limit exceeded: depth {depth} > {limit}")]
    RecursionLimitExceeded { depth: usize, limit: usize },

    #[error("wire failure: {0}")]
    WireFailure(#[from] WireError),

    /// Peer layout (or a foreign block) disagrees with the local descriptor.
    #[error("schema mismatch for `{type_name}`: {detail}")]
    SchemaMismatch { type_name: String, detail: String },

    #[error("type `{0}` is already registered")]
    DuplicateType(String),

    #[error("type `{type_name}` has no field `{field}`")]
    FieldNotFound { type_name: String, field: String },

    #[error("field `{field}` holds {expected}, accessed as {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("address {0} does not reference live heap memory")]
    InvalidAddress(Address),

    #[error("invalid declaration at line {line}: {reason}")]
    InvalidDeclaration { line: usize, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl MarshalError {
    /// Fatal errors abort the in-progress top-level call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MarshalError::WireFailure(_) | MarshalError::RecursionLimitExceeded { .. }
        )
    }
}

impl From<io::Error> for MarshalError {
    fn from(err: io::Error) -> Self {
        MarshalError::WireFailure(WireError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, MarshalError>;

/// A recorded non-fatal condition and where it happened.
#[derive(Debug)]
pub struct Diagnostic {
    /// Structural location, e.g. `Path.pts[2]`.
    pub location: String,
    pub error: MarshalError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// Accumulator for non-fatal conditions.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: impl Into<String>, error: MarshalError) {
        let location = location.into();
        log::warn!("[marshal] {}: {}", location, error);
        self.entries.push(Diagnostic { location, error });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// Top-level failure: the fatal error plus everything recorded before it.
#[derive(Debug)]
pub struct MarshalFailure {
    pub error: MarshalError,
    /// Enclosing locations, innermost first.
    pub trace: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MarshalFailure {
    pub fn new(error: MarshalError) -> Self {
        Self {
            error,
            trace: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add an enclosing location while unwinding.
    #[must_use]
    pub fn within(mut self, location: impl Into<String>) -> Self {
        self.trace.push(location.into());
        self
    }

    /// Outermost-first path to the failing element, `/` separated.
    pub fn location(&self) -> String {
        let mut parts: Vec<&str> = self.trace.iter().map(String::as_str).collect();
        parts.reverse();
        parts.join("/")
    }
}

impl From<MarshalError> for MarshalFailure {
    fn from(error: MarshalError) -> Self {
        MarshalFailure::new(error)
    }
}

impl From<WireError> for MarshalFailure {
    fn from(error: WireError) -> Self {
        MarshalFailure::new(MarshalError::WireFailure(error))
    }
}

impl fmt::Display for MarshalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.trace.is_empty() {
            write!(f, " (at {})", self.location())?;
        }
        if !self.diagnostics.is_empty() {
            write!(f, " [{} earlier diagnostics]", self.diagnostics.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for MarshalFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
