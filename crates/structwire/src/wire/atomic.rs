// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire rule of every atomic type.
//!
//! Sub-word integers travel as a full 4-byte word (sign- or zero-extended) and
//! are narrowed back on receipt. Complex values are two consecutive floats.

use super::xdr::{WireResult, XdrReader, XdrWriter};
use crate::error::WireError;
use crate::ledger::Scalar;
use crate::types::AtomicType;

fn ensure_len(needed: usize, available: usize) -> WireResult<()> {
    if available < needed {
        return Err(WireError::LengthOutOfRange {
            len: needed,
            limit: available,
        });
    }
    Ok(())
}

/// Send `count` elements stored natively in `native`.
pub fn put_elements(
    w: &mut XdrWriter<'_>,
    ty: AtomicType,
    native: &[u8],
    count: usize,
) -> WireResult<()> {
    let size = ty.native_size();
    ensure_len(count * size, native.len())?;
    for chunk in native.chunks_exact(size).take(count) {
        put_one(w, ty, chunk)?;
    }
    Ok(())
}

/// Receive `count` elements into native storage.
pub fn get_elements(
    r: &mut XdrReader<'_>,
    ty: AtomicType,
    native: &mut [u8],
    count: usize,
) -> WireResult<()> {
    let size = ty.native_size();
    ensure_len(count * size, native.len())?;
    for chunk in native.chunks_exact_mut(size).take(count) {
        get_one(r, ty, chunk)?;
    }
    Ok(())
}

fn put_one(w: &mut XdrWriter<'_>, ty: AtomicType, chunk: &[u8]) -> WireResult<()> {
    match ty {
        AtomicType::Char | AtomicType::String => w.put_word(i32::from(i8::read_ne(chunk))),
        AtomicType::UnsignedChar => w.put_u32(u32::from(u8::read_ne(chunk))),
        AtomicType::Short => w.put_word(i32::from(i16::read_ne(chunk))),
        AtomicType::UnsignedShort => w.put_u32(u32::from(u16::read_ne(chunk))),
        AtomicType::Int => w.put_word(i32::read_ne(chunk)),
        AtomicType::UnsignedInt => w.put_u32(u32::read_ne(chunk)),
        AtomicType::Long | AtomicType::Long64 => w.put_i64(i64::read_ne(chunk)),
        AtomicType::UnsignedLong | AtomicType::UnsignedLong64 => w.put_u64(u64::read_ne(chunk)),
        AtomicType::Float => w.put_f32(f32::read_ne(chunk)),
        AtomicType::Double => w.put_f64(f64::read_ne(chunk)),
        AtomicType::Complex => {
            w.put_f32(f32::read_ne(&chunk[..4]))?;
            w.put_f32(f32::read_ne(&chunk[4..]))
        }
        AtomicType::DComplex => {
            w.put_f64(f64::read_ne(&chunk[..8]))?;
            w.put_f64(f64::read_ne(&chunk[8..]))
        }
    }
}

fn get_one(r: &mut XdrReader<'_>, ty: AtomicType, chunk: &mut [u8]) -> WireResult<()> {
    match ty {
        AtomicType::Char | AtomicType::String => (r.get_word()? as i8).write_ne(chunk),
        AtomicType::UnsignedChar => (r.get_u32()? as u8).write_ne(chunk),
        AtomicType::Short => (r.get_word()? as i16).write_ne(chunk),
        AtomicType::UnsignedShort => (r.get_u32()? as u16).write_ne(chunk),
        AtomicType::Int => r.get_word()?.write_ne(chunk),
        AtomicType::UnsignedInt => r.get_u32()?.write_ne(chunk),
        AtomicType::Long | AtomicType::Long64 => r.get_i64()?.write_ne(chunk),
        AtomicType::UnsignedLong | AtomicType::UnsignedLong64 => r.get_u64()?.write_ne(chunk),
        AtomicType::Float => r.get_f32()?.write_ne(chunk),
        AtomicType::Double => r.get_f64()?.write_ne(chunk),
        AtomicType::Complex => {
            r.get_f32()?.write_ne(&mut chunk[..4]);
            r.get_f32()?.write_ne(&mut chunk[4..]);
        }
        AtomicType::DComplex => {
            r.get_f64()?.write_ne(&mut chunk[..8]);
            r.get_f64()?.write_ne(&mut chunk[8..]);
        }
    }
    Ok(())
}
