// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire layer: XDR primitives, atomic element rules, type-definition
//! exchange and the transport abstraction.

pub mod atomic;
pub mod typedefs;
mod transport;
mod xdr;

pub use transport::{MemoryTransport, Transport};
pub use typedefs::{adopt_types, get_type_list, put_type_list};
pub use xdr::{padding_for, WireResult, XdrReader, XdrWriter, XDR_UNIT};
