// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XDR word streams over a transport.
//!
//! Every scalar word is 4 bytes big-endian; 64-bit values are 8 bytes
//! big-endian. Byte runs are padded with zeros to a 4-byte boundary.
//!
//! ```text
//! string:  +--------+---------------------------+-----+
//!          | len(4) | bytes (len, incl. NUL)    | pad |
//!          +--------+---------------------------+-----+
//! ```

use crate::error::WireError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub type WireResult<T> = std::result::Result<T, WireError>;

/// XDR unit size.
pub const XDR_UNIT: usize = 4;

const ZEROS: [u8; XDR_UNIT] = [0; XDR_UNIT];

/// Zero bytes needed after `len` bytes.
pub const fn padding_for(len: usize) -> usize {
    (XDR_UNIT - len % XDR_UNIT) % XDR_UNIT
}

/// Generate big-endian put methods (bytes counted for diagnostics).
macro_rules! impl_put_be {
    ($name:ident, $type:ty, $method:ident, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> WireResult<()> {
            self.out.$method::<BigEndian>(value)?;
            self.written += $size;
            Ok(())
        }
    };
}

/// Generate big-endian get methods.
macro_rules! impl_get_be {
    ($name:ident, $type:ty, $method:ident, $size:expr) => {
        pub fn $name(&mut self) -> WireResult<$type> {
            let value = self.input.$method::<BigEndian>()?;
            self.consumed += $size;
            Ok(value)
        }
    };
}

/// Encoding side.
pub struct XdrWriter<'a> {
    out: &'a mut dyn Write,
    written: usize,
}

impl<'a> XdrWriter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out, written: 0 }
    }

    /// Bytes written through this writer.
    pub fn written(&self) -> usize {
        self.written
    }

    impl_put_be!(put_word, i32, write_i32, 4);
    impl_put_be!(put_u32, u32, write_u32, 4);
    impl_put_be!(put_i64, i64, write_i64, 8);
    impl_put_be!(put_u64, u64, write_u64, 8);
    impl_put_be!(put_f32, f32, write_f32, 4);
    impl_put_be!(put_f64, f64, write_f64, 8);

    pub fn put_flag(&mut self, flag: bool) -> WireResult<()> {
        self.put_word(i32::from(flag))
    }

    /// Non-negative count word.
    pub fn put_count(&mut self, count: usize) -> WireResult<()> {
        let word = i32::try_from(count).map_err(|_| WireError::LengthOutOfRange {
            len: count,
            limit: i32::MAX as usize,
        })?;
        self.put_word(word)
    }

    /// String primitive for a character buffer.
    ///
    /// Sends the bytes up to and including the first NUL, or the whole buffer
    /// when it holds no terminator.
    pub fn put_string(&mut self, buffer: &[u8]) -> WireResult<()> {
        let len = buffer
            .iter()
            .position(|&b| b == 0)
            .map_or(buffer.len(), |p| p + 1);
        self.put_count(len)?;
        self.put_opaque(&buffer[..len])
    }

    /// String primitive for Rust text (terminator appended).
    pub fn put_text(&mut self, text: &str) -> WireResult<()> {
        self.put_count(text.len() + 1)?;
        self.out.write_all(text.as_bytes())?;
        self.out.write_all(&[0])?;
        self.written += text.len() + 1;
        self.put_padding(text.len() + 1)
    }

    /// Raw bytes, padded. The length travels separately.
    pub fn put_opaque(&mut self, bytes: &[u8]) -> WireResult<()> {
        self.out.write_all(bytes)?;
        self.written += bytes.len();
        self.put_padding(bytes.len())
    }

    pub fn flush(&mut self) -> WireResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn put_padding(&mut self, len: usize) -> WireResult<()> {
        let pad = padding_for(len);
        if pad > 0 {
            self.out.write_all(&ZEROS[..pad])?;
            self.written += pad;
        }
        Ok(())
    }
}

/// Decoding side.
pub struct XdrReader<'a> {
    input: &'a mut dyn Read,
    consumed: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(input: &'a mut dyn Read) -> Self {
        Self { input, consumed: 0 }
    }

    /// Bytes consumed through this reader.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    impl_get_be!(get_word, i32, read_i32, 4);
    impl_get_be!(get_u32, u32, read_u32, 4);
    impl_get_be!(get_i64, i64, read_i64, 8);
    impl_get_be!(get_u64, u64, read_u64, 8);
    impl_get_be!(get_f32, f32, read_f32, 4);
    impl_get_be!(get_f64, f64, read_f64, 8);

    pub fn get_flag(&mut self) -> WireResult<bool> {
        Ok(self.get_word()? != 0)
    }

    pub fn get_count(&mut self) -> WireResult<usize> {
        let word = self.get_word()?;
        usize::try_from(word).map_err(|_| WireError::NegativeCount(word))
    }

    /// Count word bounded by `limit`.
    pub fn get_count_max(&mut self, limit: usize) -> WireResult<usize> {
        let count = self.get_count()?;
        if count > limit {
            return Err(WireError::LengthOutOfRange { len: count, limit });
        }
        Ok(count)
    }

    /// String primitive into a fixed buffer; the tail is zeroed.
    ///
    /// Returns the received length.
    pub fn get_string_into(&mut self, buffer: &mut [u8]) -> WireResult<usize> {
        let len = self.get_count_max(buffer.len())?;
        self.get_opaque_into(&mut buffer[..len])?;
        buffer[len..].fill(0);
        Ok(len)
    }

    /// String primitive as Rust text, trailing NULs removed.
    pub fn get_text(&mut self, limit: usize) -> WireResult<String> {
        let len = self.get_count_max(limit)?;
        let mut bytes = vec![0u8; len];
        self.get_opaque_into(&mut bytes)?;
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
    }

    /// Raw bytes, then padding.
    pub fn get_opaque_into(&mut self, buffer: &mut [u8]) -> WireResult<()> {
        self.input.read_exact(buffer)?;
        self.consumed += buffer.len();
        let pad = padding_for(buffer.len());
        if pad > 0 {
            let mut scratch = [0u8; XDR_UNIT];
            self.input.read_exact(&mut scratch[..pad])?;
            self.consumed += pad;
        }
        Ok(())
    }
}
