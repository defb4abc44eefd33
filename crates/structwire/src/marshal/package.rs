// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-describing package framing.
//!
//! ```text
//! +------------------+------------------+----------------+-----------+
//! | protocol version | type definitions | root type name | root data |
//! |    (u32 word)    |  (count + types) |  (XDR string)  |           |
//! +------------------+------------------+----------------+-----------+
//! ```
//!
//! A package carries everything a receiver with an empty registry needs to
//! rebuild the value. The header is read up front; the root data is then
//! decoded under the version it announces.

use crate::config::MAX_NAME_LEN;
use crate::types::{TypeDescriptor, TypeRegistry};
use crate::wire::{get_type_list, put_type_list, WireResult, XdrReader, XdrWriter};

/// Everything that precedes the root data.
#[derive(Debug, Clone)]
pub struct PackageHeader {
    pub protocol_version: u32,
    pub types: Vec<TypeDescriptor>,
    pub root_type: String,
}

impl PackageHeader {
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }
}

/// Write the header: every type in `registry`, then `root_type`.
pub fn write_header(
    w: &mut XdrWriter<'_>,
    protocol_version: u32,
    registry: &TypeRegistry,
    root_type: &str,
) -> WireResult<()> {
    w.put_u32(protocol_version)?;
    put_type_list(w, registry)?;
    w.put_text(root_type)?;
    log::debug!(
        "[package] header v{}: {} types, root {}",
        protocol_version,
        registry.len(),
        root_type
    );
    Ok(())
}

pub fn read_header(r: &mut XdrReader<'_>) -> WireResult<PackageHeader> {
    let protocol_version = r.get_u32()?;
    let types = get_type_list(r)?;
    let root_type = r.get_text(MAX_NAME_LEN)?;
    log::debug!(
        "[package] header v{}: {} types, root {}",
        protocol_version,
        types.len(),
        root_type
    );
    Ok(PackageHeader {
        protocol_version,
        types,
        root_type,
    })
}
