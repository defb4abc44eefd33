// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handle-addressed block arena.
//!
//! Marshalled instances live in zero-initialised byte blocks laid out per
//! their [`TypeDescriptor`](crate::types::TypeDescriptor). Pointer fields hold
//! an [`Address`] (8 bytes, native endian) instead of a host pointer.

use crate::error::{MarshalError, Result, WireError};
use crate::types::AtomicType;
use std::fmt;

/// Handle into a [`Heap`]: block index in the high half, byte offset in the low half.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(u64);

impl Address {
    pub const NULL: Address = Address(0);

    fn new(block: usize, offset: usize) -> Self {
        Address(((block as u64 + 1) << 32) | offset as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Address(raw)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    fn block(self) -> Option<usize> {
        match self.0 >> 32 {
            0 => None,
            b => Some(b as usize - 1),
        }
    }

    pub fn offset(self) -> usize {
        (self.0 & 0xffff_ffff) as usize
    }

    /// Address `bytes` further into the same block. Null stays null.
    #[must_use]
    pub fn add(self, bytes: usize) -> Address {
        if self.is_null() {
            return self;
        }
        Address(self.0 + bytes as u64)
    }

    /// Start of the block this address points into.
    #[must_use]
    pub fn base(self) -> Address {
        Address(self.0 & !0xffff_ffff)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block() {
            None => f.write_str("null"),
            Some(b) => write!(f, "@{}+{}", b, self.offset()),
        }
    }
}

/// Plain scalar stored in native byte order inside a block.
pub trait Scalar: Copy {
    const SIZE: usize;
    const NAME: &'static str;
    /// Atomic type stored with this representation.
    const ATOMIC: AtomicType;

    fn read_ne(bytes: &[u8]) -> Self;
    fn write_ne(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($($type:ty => $atomic:ident),* $(,)?) => {$(
        impl Scalar for $type {
            const SIZE: usize = std::mem::size_of::<$type>();
            const NAME: &'static str = stringify!($type);
            const ATOMIC: AtomicType = AtomicType::$atomic;

            fn read_ne(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$type>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                <$type>::from_ne_bytes(buf)
            }

            fn write_ne(self, out: &mut [u8]) {
                out[..Self::SIZE].copy_from_slice(&self.to_ne_bytes());
            }
        }
    )*};
}

impl_scalar!(
    i8 => Char,
    u8 => UnsignedChar,
    i16 => Short,
    u16 => UnsignedShort,
    i32 => Int,
    u32 => UnsignedInt,
    i64 => Long,
    u64 => UnsignedLong,
    f32 => Float,
    f64 => Double,
);

/// Block arena owned by a session.
#[derive(Debug, Default)]
pub struct Heap {
    blocks: Vec<Option<Vec<u8>>>,
    live: usize,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed block.
    pub fn alloc(&mut self, len: usize) -> Result<Address> {
        if len > u32::MAX as usize {
            return Err(WireError::BlockTooLarge {
                requested: len,
                limit: u32::MAX as usize,
            }
            .into());
        }
        let index = self.blocks.len();
        self.blocks.push(Some(vec![0; len]));
        self.live += 1;
        Ok(Address::new(index, 0))
    }

    /// Resize a block in place; new bytes are zeroed. The address is unchanged.
    pub fn grow(&mut self, address: Address, new_len: usize) -> Result<()> {
        if address.offset() != 0 || new_len > u32::MAX as usize {
            return Err(MarshalError::InvalidAddress(address));
        }
        let block = self.block_mut(address)?;
        block.resize(new_len, 0);
        Ok(())
    }

    /// Free a block. Returns `false` if it was not live.
    pub fn free(&mut self, address: Address) -> bool {
        if address.offset() != 0 {
            return false;
        }
        let Some(slot) = address.block().and_then(|b| self.blocks.get_mut(b)) else {
            return false;
        };
        if slot.take().is_some() {
            self.live -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_live(&self, address: Address) -> bool {
        self.block(address).is_ok()
    }

    /// Bytes from `address` to the end of its block.
    pub fn remaining(&self, address: Address) -> Option<usize> {
        self.block(address)
            .ok()
            .and_then(|b| b.len().checked_sub(address.offset()))
    }

    pub fn bytes(&self, address: Address, len: usize) -> Result<&[u8]> {
        let start = address.offset();
        let end = start.checked_add(len).ok_or(MarshalError::InvalidAddress(address))?;
        self.block(address)?
            .get(start..end)
            .ok_or(MarshalError::InvalidAddress(address))
    }

    pub fn bytes_mut(&mut self, address: Address, len: usize) -> Result<&mut [u8]> {
        let start = address.offset();
        let end = start.checked_add(len).ok_or(MarshalError::InvalidAddress(address))?;
        self.block_mut(address)?
            .get_mut(start..end)
            .ok_or(MarshalError::InvalidAddress(address))
    }

    pub fn read<T: Scalar>(&self, address: Address) -> Result<T> {
        Ok(T::read_ne(self.bytes(address, T::SIZE)?))
    }

    pub fn write<T: Scalar>(&mut self, address: Address, value: T) -> Result<()> {
        value.write_ne(self.bytes_mut(address, T::SIZE)?);
        Ok(())
    }

    pub fn read_pointer(&self, slot: Address) -> Result<Address> {
        self.read::<u64>(slot).map(Address::from_raw)
    }

    pub fn write_pointer(&mut self, slot: Address, target: Address) -> Result<()> {
        self.write::<u64>(slot, target.to_raw())
    }

    /// Copy `len` bytes between two places of the same block.
    pub fn copy_within(&mut self, src: Address, dst: Address, len: usize) -> Result<()> {
        if src.base() != dst.base() {
            return Err(MarshalError::InvalidAddress(dst));
        }
        let (from, to) = (src.offset(), dst.offset());
        let block = self.block_mut(src)?;
        let fits = |at: usize| at.checked_add(len).is_some_and(|end| end <= block.len());
        if !fits(from) || !fits(to) {
            return Err(MarshalError::InvalidAddress(dst));
        }
        block.copy_within(from..from + len, to);
        Ok(())
    }

    /// Fresh block holding a copy of the `len` bytes at `address`.
    pub fn duplicate(&mut self, address: Address, len: usize) -> Result<Address> {
        let bytes = self.bytes(address, len)?.to_vec();
        let copy = self.alloc(len)?;
        self.bytes_mut(copy, len)?.copy_from_slice(&bytes);
        Ok(copy)
    }

    /// Position of the first NUL at or after `address`, looking at most `limit` bytes.
    pub fn c_str_len(&self, address: Address, limit: usize) -> Option<usize> {
        let available = self.remaining(address)?.min(limit);
        let bytes = self.bytes(address, available).ok()?;
        bytes.iter().position(|&b| b == 0)
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.live
    }

    /// Free every block.
    pub fn release_all(&mut self) -> usize {
        let freed = self.live;
        self.blocks.clear();
        self.live = 0;
        freed
    }

    fn block(&self, address: Address) -> Result<&Vec<u8>> {
        address
            .block()
            .and_then(|b| self.blocks.get(b))
            .and_then(Option::as_ref)
            .ok_or(MarshalError::InvalidAddress(address))
    }

    fn block_mut(&mut self, address: Address) -> Result<&mut Vec<u8>> {
        address
            .block()
            .and_then(|b| self.blocks.get_mut(b))
            .and_then(Option::as_mut)
            .ok_or(MarshalError::InvalidAddress(address))
    }
}
