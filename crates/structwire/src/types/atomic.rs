// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Atomic (scalar) types.
//!
//! Every atomic type has exactly one definition of its native layout here and
//! one definition of its wire rule in [`crate::wire::atomic`].

use std::fmt;

/// Scalar element type of a field.
///
/// Discriminants are the stable tags exchanged in type definitions; tag 0 on
/// the wire means "not atomic".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AtomicType {
    Char = 1,
    Short = 2,
    Int = 3,
    UnsignedInt = 4,
    Long = 5,
    Float = 6,
    Double = 7,
    UnsignedChar = 8,
    UnsignedShort = 9,
    UnsignedLong = 10,
    Long64 = 11,
    UnsignedLong64 = 12,
    /// Two `f32` (real, imaginary).
    Complex = 13,
    /// Two `f64` (real, imaginary).
    DComplex = 14,
    /// Character data carried by the string primitive.
    String = 17,
}

/// Wire tag of a non-atomic field.
pub const NOT_ATOMIC_TAG: i32 = 0;

impl AtomicType {
    pub const ALL: [AtomicType; 15] = [
        AtomicType::Char,
        AtomicType::Short,
        AtomicType::Int,
        AtomicType::UnsignedInt,
        AtomicType::Long,
        AtomicType::Float,
        AtomicType::Double,
        AtomicType::UnsignedChar,
        AtomicType::UnsignedShort,
        AtomicType::UnsignedLong,
        AtomicType::Long64,
        AtomicType::UnsignedLong64,
        AtomicType::Complex,
        AtomicType::DComplex,
        AtomicType::String,
    ];

    pub const fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Size of one element inside a heap block.
    pub const fn native_size(self) -> usize {
        match self {
            AtomicType::Char | AtomicType::UnsignedChar | AtomicType::String => 1,
            AtomicType::Short | AtomicType::UnsignedShort => 2,
            AtomicType::Int | AtomicType::UnsignedInt | AtomicType::Float => 4,
            AtomicType::Long
            | AtomicType::UnsignedLong
            | AtomicType::Long64
            | AtomicType::UnsignedLong64
            | AtomicType::Double
            | AtomicType::Complex => 8,
            AtomicType::DComplex => 16,
        }
    }

    /// Alignment of one element inside a heap block.
    pub const fn alignment(self) -> usize {
        match self {
            AtomicType::Complex => 4,
            AtomicType::DComplex => 8,
            other => other.native_size(),
        }
    }

    /// Bytes one element occupies on the wire.
    ///
    /// Sub-word integers widen to a 4-byte word.
    pub const fn wire_width(self) -> usize {
        match self {
            AtomicType::Char
            | AtomicType::UnsignedChar
            | AtomicType::String
            | AtomicType::Short
            | AtomicType::UnsignedShort
            | AtomicType::Int
            | AtomicType::UnsignedInt
            | AtomicType::Float => 4,
            AtomicType::Long
            | AtomicType::UnsignedLong
            | AtomicType::Long64
            | AtomicType::UnsignedLong64
            | AtomicType::Double
            | AtomicType::Complex => 8,
            AtomicType::DComplex => 16,
        }
    }

    /// Canonical declared-type name.
    pub const fn name(self) -> &'static str {
        match self {
            AtomicType::Char => "char",
            AtomicType::Short => "short",
            AtomicType::Int => "int",
            AtomicType::UnsignedInt => "unsigned int",
            AtomicType::Long => "long",
            AtomicType::Float => "float",
            AtomicType::Double => "double",
            AtomicType::UnsignedChar => "unsigned char",
            AtomicType::UnsignedShort => "unsigned short",
            AtomicType::UnsignedLong => "unsigned long",
            AtomicType::Long64 => "long long",
            AtomicType::UnsignedLong64 => "unsigned long long",
            AtomicType::Complex => "complex",
            AtomicType::DComplex => "dcomplex",
            AtomicType::String => "STRING",
        }
    }

    /// Resolve a declared type name. Case-insensitive; `const` is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = normalize(name);
        let t = match normalized.as_str() {
            "char" | "signed char" => AtomicType::Char,
            "unsigned char" | "uchar" | "byte" => AtomicType::UnsignedChar,
            "short" | "short int" | "signed short" => AtomicType::Short,
            "unsigned short" | "unsigned short int" | "ushort" => AtomicType::UnsignedShort,
            "int" | "signed int" | "signed" => AtomicType::Int,
            "unsigned int" | "unsigned" | "uint" => AtomicType::UnsignedInt,
            "long" | "long int" | "signed long" => AtomicType::Long,
            "unsigned long" | "unsigned long int" | "ulong" => AtomicType::UnsignedLong,
            "long long" | "long long int" | "long64" | "int64" => AtomicType::Long64,
            "unsigned long long" | "unsigned long long int" | "ulong64" | "uint64" => {
                AtomicType::UnsignedLong64
            }
            "float" => AtomicType::Float,
            "double" => AtomicType::Double,
            "complex" => AtomicType::Complex,
            "dcomplex" => AtomicType::DComplex,
            "string" => AtomicType::String,
            _ => return None,
        };
        Some(t)
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            AtomicType::Float
                | AtomicType::Double
                | AtomicType::Complex
                | AtomicType::DComplex
                | AtomicType::String
        )
    }

    /// Byte-sized character data.
    pub fn is_char(self) -> bool {
        matches!(
            self,
            AtomicType::Char | AtomicType::UnsignedChar | AtomicType::String
        )
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .filter(|w| *w != "const" && *w != "volatile")
        .collect();
    words.join(" ")
}
