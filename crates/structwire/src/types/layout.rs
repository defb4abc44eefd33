// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logical layout: offsets, padding and total size.
//!
//! The rule is fixed per field kind so both peers compute the same layout
//! regardless of host word size:
//!
//! | field                          | size              | alignment          |
//! |--------------------------------|-------------------|--------------------|
//! | pointer, `char *s[N]`          | 8                 | 8                  |
//! | atomic                         | native size       | native alignment   |
//! | nested structure               | registered size   | registered alignment |
//!
//! `offset = align_up(cursor, alignment)`; the total is padded to the largest
//! field alignment.

use super::atomic::AtomicType;
use super::descriptor::{
    FieldDecl, FieldDescriptor, STRING_ARRAY_TYPE, STRING_TYPE, VOID_TYPE,
};
use super::registry::TypeRegistry;
use crate::config::{MAX_RANK, POINTER_SIZE};
use crate::error::{MarshalError, Result};

/// Round `offset` up to a multiple of `alignment`.
pub const fn align_up(offset: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return offset;
    }
    offset + (alignment - offset % alignment) % alignment
}

/// [`align_up`], or `None` when the result does not fit in `usize`.
pub fn checked_align_up(offset: usize, alignment: usize) -> Option<usize> {
    if alignment <= 1 {
        return Some(offset);
    }
    offset.checked_add((alignment - offset % alignment) % alignment)
}

/// Largest type a heap block can hold; offsets inside an address are 32-bit.
pub const MAX_TYPE_SIZE: usize = u32::MAX as usize;

/// Computed layout of a whole type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub fields: Vec<FieldDescriptor>,
    pub size: usize,
    pub alignment: usize,
}

/// Lay out `decls` as members of `owner`.
///
/// Inline nested types must already be in `registry`; pointer targets need not.
pub fn layout_fields(owner: &str, decls: Vec<FieldDecl>, registry: &TypeRegistry) -> Result<Layout> {
    let mut fields = Vec::with_capacity(decls.len());
    let mut cursor = 0usize;
    let mut max_alignment = 1usize;

    for decl in decls {
        let field = layout_one(owner, decl, cursor, registry)?;
        cursor = field
            .size
            .checked_mul(field.count)
            .and_then(|space| field.offset.checked_add(space))
            .ok_or_else(|| overflow(owner, &field.name))?;
        max_alignment = max_alignment.max(field.alignment);
        fields.push(field);
    }

    let size = checked_align_up(cursor, max_alignment)
        .filter(|&size| size <= MAX_TYPE_SIZE)
        .ok_or_else(|| MarshalError::SchemaMismatch {
            type_name: owner.to_string(),
            detail: format!("size exceeds {} bytes", MAX_TYPE_SIZE),
        })?;
    log::trace!(
        "[layout] {}: {} fields, size {}, alignment {}",
        owner,
        fields.len(),
        size,
        max_alignment
    );
    Ok(Layout {
        fields,
        size,
        alignment: max_alignment,
    })
}

fn layout_one(
    owner: &str,
    decl: FieldDecl,
    cursor: usize,
    registry: &TypeRegistry,
) -> Result<FieldDescriptor> {
    if decl.shape.len() > MAX_RANK {
        return Err(MarshalError::SchemaMismatch {
            type_name: owner.to_string(),
            detail: format!("field `{}` has rank {} > {}", decl.name, decl.shape.len(), MAX_RANK),
        });
    }

    let rank = decl.shape.len();
    let count = decl
        .shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| overflow(owner, &decl.name))?
        .max(usize::from(rank == 0));
    let string_array = decl.type_name.trim().eq_ignore_ascii_case(STRING_ARRAY_TYPE);

    let (type_name, atomic) = if string_array {
        (STRING_ARRAY_TYPE.to_string(), Some(AtomicType::String))
    } else {
        match AtomicType::from_name(&decl.type_name) {
            // Inline char arrays are strings.
            Some(AtomicType::Char) if !decl.pointer && rank >= 1 => {
                (STRING_TYPE.to_string(), Some(AtomicType::String))
            }
            Some(AtomicType::String) => (STRING_TYPE.to_string(), Some(AtomicType::String)),
            Some(t) => (t.name().to_string(), Some(t)),
            None => (decl.type_name.trim().to_string(), None),
        }
    };

    let (size, alignment) = if decl.pointer || string_array {
        (POINTER_SIZE, POINTER_SIZE)
    } else if let Some(t) = atomic {
        (t.native_size(), t.alignment())
    } else if type_name.eq_ignore_ascii_case(VOID_TYPE) {
        return Err(MarshalError::SchemaMismatch {
            type_name: owner.to_string(),
            detail: format!("field `{}` declares an inline void", decl.name),
        });
    } else {
        let nested = registry
            .find(&type_name)
            .ok_or_else(|| MarshalError::TypeUnresolved(type_name.clone()))?;
        (nested.size, nested.alignment.max(1))
    };

    let offset = checked_align_up(cursor, alignment).ok_or_else(|| overflow(owner, &decl.name))?;
    Ok(FieldDescriptor {
        name: decl.name,
        type_name,
        description: decl.description,
        atomic,
        pointer: decl.pointer,
        rank,
        shape: decl.shape,
        count,
        size,
        offset,
        padding: offset - cursor,
        alignment,
    })
}

fn overflow(owner: &str, field: &str) -> MarshalError {
    MarshalError::SchemaMismatch {
        type_name: owner.to_string(),
        detail: format!("layout of field `{}` overflows", field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::builder::TypeDescriptorBuilder;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(13, 4), 16);
        assert_eq!(align_up(13, 1), 13);
        assert_eq!(align_up(13, 0), 13);
        assert_eq!(checked_align_up(13, 4), Some(16));
        assert_eq!(checked_align_up(usize::MAX, 8), None);
    }

    #[test]
    fn test_huge_dimensions_are_rejected() {
        let registry = TypeRegistry::new();
        let dims = [i32::MAX as usize; 3];
        let err = layout_fields("T", vec![FieldDecl::new("a", "int").dims(&dims)], &registry)
            .unwrap_err();
        assert!(matches!(err, MarshalError::SchemaMismatch { ref type_name, .. } if type_name == "T"));

        // Fits in usize, not in a heap block.
        let err = layout_fields(
            "Big",
            vec![FieldDecl::new("a", "double").dims(&[1 << 20, 1 << 20])],
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, MarshalError::SchemaMismatch { .. }));

        let err = layout_fields(
            "Tail",
            vec![
                FieldDecl::new("c", "char"),
                FieldDecl::new("a", "char").pointer().dims(&[usize::MAX / 8]),
            ],
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, MarshalError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_padding_between_fields() {
        let registry = TypeRegistry::new();
        let layout = layout_fields(
            "Mixed",
            vec![
                FieldDecl::new("flag", "char"),
                FieldDecl::new("value", "double"),
                FieldDecl::new("tag", "short"),
            ],
            &registry,
        )
        .unwrap();
        let offsets: Vec<_> = layout.fields.iter().map(|f| (f.offset, f.padding)).collect();
        assert_eq!(offsets, vec![(0, 0), (8, 7), (16, 0)]);
        assert_eq!(layout.size, 24);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn test_char_array_becomes_string() {
        let registry = TypeRegistry::new();
        let layout = layout_fields(
            "Named",
            vec![
                FieldDecl::new("name", "char").dims(&[10]),
                FieldDecl::new("c", "char"),
                FieldDecl::new("bytes", "char").pointer(),
            ],
            &registry,
        )
        .unwrap();
        assert_eq!(layout.fields[0].atomic, Some(AtomicType::String));
        assert_eq!(layout.fields[0].type_name, STRING_TYPE);
        assert_eq!(layout.fields[1].atomic, Some(AtomicType::Char));
        assert_eq!(layout.fields[2].atomic, Some(AtomicType::Char));
        assert_eq!(layout.fields[2].size, POINTER_SIZE);
    }

    #[test]
    fn test_inline_nested_uses_registered_alignment() {
        let mut registry = TypeRegistry::new();
        TypeDescriptorBuilder::new("Pair")
            .atomic("a", "int")
            .atomic("b", "int")
            .register(&mut registry)
            .unwrap();
        let layout = layout_fields(
            "Outer",
            vec![
                FieldDecl::new("c", "char"),
                FieldDecl::new("pairs", "Pair").dims(&[3]),
            ],
            &registry,
        )
        .unwrap();
        let pairs = &layout.fields[1];
        assert_eq!(pairs.offset, 4);
        assert_eq!(pairs.size, 8);
        assert_eq!(pairs.count, 3);
        assert_eq!(layout.size, 28);
    }

    #[test]
    fn test_inline_unknown_type_is_unresolved() {
        let registry = TypeRegistry::new();
        let err = layout_fields("Outer", vec![FieldDecl::new("p", "Missing")], &registry)
            .unwrap_err();
        assert!(matches!(err, MarshalError::TypeUnresolved(name) if name == "Missing"));
    }

    #[test]
    fn test_pointer_to_unknown_type_is_allowed() {
        let registry = TypeRegistry::new();
        let layout = layout_fields(
            "Node",
            vec![FieldDecl::new("next", "Node").pointer()],
            &registry,
        )
        .unwrap();
        assert_eq!(layout.size, 8);
        assert!(layout.fields[0].is_nested());
    }

    #[test]
    fn test_empty_type() {
        let layout = layout_fields("Empty", Vec::new(), &TypeRegistry::new()).unwrap();
        assert_eq!(layout.size, 0);
        assert_eq!(layout.alignment, 1);
    }
}
