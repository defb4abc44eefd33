// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Duplex byte channel consumed by the codec.
//!
//! The codec never opens, closes or times out a transport; it only reads and
//! writes. Closing the channel surfaces as a wire failure at the next call.

use std::io::{self, Read, Write};

/// Any duplex byte channel (sockets, pipes, [`MemoryTransport`]).
pub trait Transport: Read + Write {}

impl<T: Read + Write + ?Sized> Transport for T {}

/// In-memory loopback: writes append, reads consume from the front.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    buffer: Vec<u8>,
    read_pos: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buffer: bytes,
            read_pos: 0,
        }
    }

    /// Everything written so far, including consumed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes not yet read.
    pub fn unread(&self) -> &[u8] {
        &self.buffer[self.read_pos..]
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Read again from the start.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Write for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.unread();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.read_pos += n;
        Ok(n)
    }
}
