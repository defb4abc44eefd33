// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! structwire configuration - single source of truth for limits and versions.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: wire constants (protocol versions, name limits,
//!   pointer width). **Never hardcode these elsewhere.**
//! - **Level 2 (Dynamic)**: [`MarshalConfig`], carried by a session and
//!   threaded into every encode/decode call. Built in code, read from the
//!   environment, or (feature `config-loaders`) loaded from YAML/JSON.
//!
//! # Example
//!
//! ```
//! use structwire::config::{AllocationSource, MarshalConfig, SHAPE_PROTOCOL_VERSION};
//!
//! let config = MarshalConfig::new()
//!     .protocol_version(SHAPE_PROTOCOL_VERSION - 1)
//!     .allocation_source(AllocationSource::SizeFieldProducer);
//! assert!(!config.sends_shape());
//! ```

use crate::error::{MarshalError, Result};
use std::fmt;
use std::str::FromStr;

// =======================================================================
// Protocol versions
// =======================================================================

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u32 = 8;

/// First protocol version that carries rank/shape for pointer arrays.
///
/// Older peers receive a flat count; shape is dropped.
pub const SHAPE_PROTOCOL_VERSION: u32 = 7;

// =======================================================================
// Limits
// =======================================================================

/// Default maximum nesting depth of one encode/decode call.
pub const DEFAULT_MAX_DEPTH: usize = 30;

/// Maximum rank of any field.
pub const MAX_RANK: usize = 7;

/// Longest type or field name accepted from the wire (bytes, terminator included).
pub const MAX_NAME_LEN: usize = 256;

/// Longest description or image line accepted from the wire.
pub const MAX_TEXT_LEN: usize = 1 << 20;

/// Bound used when guessing the length of a foreign string block.
pub const MAX_STRING_GUESS: usize = 256;

/// Default ceiling for a single decoded heap block (1 GiB).
pub const DEFAULT_MAX_BLOCK_BYTES: usize = 1 << 30;

/// Largest array dimension accepted in a received type definition.
pub const MAX_DIMENSION: usize = 1 << 30;

/// Width of a pointer slot inside a heap block.
///
/// Slots hold an [`Address`](crate::ledger::Address) handle, never a host pointer,
/// so the width is the same on every architecture.
pub const POINTER_SIZE: usize = 8;

// =======================================================================
// Environment variables
// =======================================================================

pub const ENV_PROTOCOL_VERSION: &str = "STRUCTWIRE_PROTOCOL_VERSION";
pub const ENV_MAX_DEPTH: &str = "STRUCTWIRE_MAX_DEPTH";
pub const ENV_ALLOC_SOURCE: &str = "STRUCTWIRE_ALLOC_SOURCE";
pub const ENV_MAX_BLOCK_BYTES: &str = "STRUCTWIRE_MAX_BLOCK_BYTES";

/// Origin of data whose ledger records lack a concrete type.
///
/// Selects which unknown-type heuristics apply during extent resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(rename_all = "kebab-case"))]
pub enum AllocationSource {
    /// Every block was allocated through the session; no guessing.
    #[default]
    Native,
    /// Producer that precedes each array field with a `__size<name>` count field.
    SizeFieldProducer,
    /// Producer of document-style data: untyped blocks are text.
    DocumentProducer,
}

impl AllocationSource {
    /// Stable integer tag (0 native, 1 size-field, 2 document).
    pub fn tag(self) -> u32 {
        match self {
            AllocationSource::Native => 0,
            AllocationSource::SizeFieldProducer => 1,
            AllocationSource::DocumentProducer => 2,
        }
    }

    pub fn is_foreign(self) -> bool {
        self != AllocationSource::Native
    }
}

impl fmt::Display for AllocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationSource::Native => "native",
            AllocationSource::SizeFieldProducer => "size-field-producer",
            AllocationSource::DocumentProducer => "document-producer",
        };
        f.write_str(name)
    }
}

impl FromStr for AllocationSource {
    type Err = MarshalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "0" => Ok(AllocationSource::Native),
            "size-field-producer" | "size-field" | "soap" | "1" => {
                Ok(AllocationSource::SizeFieldProducer)
            }
            "document-producer" | "document" | "dom" | "2" => Ok(AllocationSource::DocumentProducer),
            other => Err(MarshalError::Config(format!(
                "unknown allocation source `{}`",
                other
            ))),
        }
    }
}

/// Per-session marshalling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct MarshalConfig {
    /// Negotiated protocol version of the peer.
    pub protocol_version: u32,
    /// Nesting depth at which a call aborts.
    pub max_depth: usize,
    pub allocation_source: AllocationSource,
    /// Bound for the bounded-string heuristic.
    pub max_string_guess: usize,
    /// Largest single block the decoder will allocate.
    pub max_block_bytes: usize,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_depth: DEFAULT_MAX_DEPTH,
            allocation_source: AllocationSource::Native,
            max_string_guess: MAX_STRING_GUESS,
            max_block_bytes: DEFAULT_MAX_BLOCK_BYTES,
        }
    }
}

impl MarshalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `STRUCTWIRE_*` environment variables.
    ///
    /// Unparseable values are rejected rather than ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_value(ENV_PROTOCOL_VERSION) {
            config.protocol_version = parse_env(ENV_PROTOCOL_VERSION, &v)?;
        }
        if let Some(v) = env_value(ENV_MAX_DEPTH) {
            config.max_depth = parse_env(ENV_MAX_DEPTH, &v)?;
        }
        if let Some(v) = env_value(ENV_ALLOC_SOURCE) {
            config.allocation_source = v.parse()?;
        }
        if let Some(v) = env_value(ENV_MAX_BLOCK_BYTES) {
            config.max_block_bytes = parse_env(ENV_MAX_BLOCK_BYTES, &v)?;
        }
        log::debug!("[config] loaded from environment: {:?}", config);
        Ok(config)
    }

    /// Parse a YAML document (JSON is a subset and also accepted).
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| MarshalError::Config(e.to_string()))
    }

    /// Parse a JSON document.
    #[cfg(feature = "config-loaders")]
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| MarshalError::Config(e.to_string()))
    }

    /// Load from a `.yaml`/`.yml`/`.json` file, chosen by extension.
    #[cfg(feature = "config-loaders")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MarshalError::Config(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = version;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn allocation_source(mut self, source: AllocationSource) -> Self {
        self.allocation_source = source;
        self
    }

    pub fn max_string_guess(mut self, bytes: usize) -> Self {
        self.max_string_guess = bytes;
        self
    }

    pub fn max_block_bytes(mut self, bytes: usize) -> Self {
        self.max_block_bytes = bytes;
        self
    }

    /// Whether pointer arrays carry rank/shape under this version.
    pub fn sends_shape(&self) -> bool {
        self.protocol_version >= SHAPE_PROTOCOL_VERSION
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MarshalError::Config(format!("{}: invalid value `{}`", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MarshalConfig::default();
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
        assert_eq!(config.max_depth, 30);
        assert_eq!(config.allocation_source, AllocationSource::Native);
        assert!(config.sends_shape());
    }

    #[test]
    fn test_shape_gate() {
        assert!(!MarshalConfig::new().protocol_version(6).sends_shape());
        assert!(MarshalConfig::new().protocol_version(7).sends_shape());
    }

    #[test]
    fn test_allocation_source_parse() {
        assert_eq!("native".parse::<AllocationSource>().unwrap(), AllocationSource::Native);
        assert_eq!(
            "SOAP".parse::<AllocationSource>().unwrap(),
            AllocationSource::SizeFieldProducer
        );
        assert_eq!(
            "document-producer".parse::<AllocationSource>().unwrap(),
            AllocationSource::DocumentProducer
        );
        assert!("netcdf".parse::<AllocationSource>().is_err());
        assert_eq!(AllocationSource::DocumentProducer.tag(), 2);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        assert_eq!(parse_env::<u32>(ENV_MAX_DEPTH, " 12 ").unwrap(), 12);
        assert!(matches!(
            parse_env::<u32>(ENV_MAX_DEPTH, "deep"),
            Err(MarshalError::Config(_))
        ));
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_yaml_partial_document() {
        let config = MarshalConfig::from_yaml_str(
            "protocol_version: 6\nallocation_source: document-producer\n",
        )
        .unwrap();
        assert_eq!(config.protocol_version, 6);
        assert_eq!(config.allocation_source, AllocationSource::DocumentProducer);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marshal.json");
        std::fs::write(&path, r#"{"max_depth": 12, "max_string_guess": 64}"#).unwrap();
        let config = MarshalConfig::load(&path).unwrap();
        assert_eq!(config.max_depth, 12);
        assert_eq!(config.max_string_guess, 64);
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }
}
