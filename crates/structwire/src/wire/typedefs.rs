// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type-definition exchange.
//!
//! ```text
//! field: size offset padding alignment atomic-tag pointer rank count
//!        type-name name description [shape x rank, if rank > 1]
//! type:  class name source ref-id size image field-count field*
//! list:  count type*
//! ```
//!
//! The receiver keeps only the declarations (names, types, pointer flags,
//! shapes) and recomputes the layout with its own rules, so a peer's padding
//! never leaks into local memory.

use super::xdr::{WireResult, XdrReader, XdrWriter};
use crate::config::{MAX_DIMENSION, MAX_NAME_LEN, MAX_RANK, MAX_TEXT_LEN};
use crate::error::{Diagnostics, MarshalError, Result, WireError};
use crate::types::{
    layout_fields, AtomicType, FieldDecl, FieldDescriptor, TypeClass, TypeDescriptor, TypeId,
    TypeRegistry, NOT_ATOMIC_TAG,
};

/// Upper bound on pre-allocated list capacity for untrusted counts.
const MAX_PREALLOC: usize = 1024;

pub fn put_field(w: &mut XdrWriter<'_>, field: &FieldDescriptor) -> WireResult<()> {
    w.put_count(field.size)?;
    w.put_count(field.offset)?;
    w.put_count(field.padding)?;
    w.put_count(field.alignment)?;
    w.put_word(field.atomic.map_or(NOT_ATOMIC_TAG, AtomicType::tag))?;
    w.put_flag(field.pointer)?;
    w.put_count(field.rank)?;
    w.put_count(field.count)?;
    w.put_text(&field.type_name)?;
    w.put_text(&field.name)?;
    w.put_text(&field.description)?;
    if field.rank > 1 {
        for &dim in &field.shape {
            w.put_count(dim)?;
        }
    }
    Ok(())
}

pub fn get_field(r: &mut XdrReader<'_>) -> WireResult<FieldDescriptor> {
    let size = r.get_count()?;
    let offset = r.get_count()?;
    let padding = r.get_count()?;
    let alignment = r.get_count()?;
    let tag = r.get_word()?;
    let atomic = match tag {
        NOT_ATOMIC_TAG => None,
        t => Some(AtomicType::from_tag(t).ok_or(WireError::UnknownAtomicTag(t))?),
    };
    let pointer = r.get_flag()?;
    let rank = r.get_count_max(MAX_RANK)?;
    let count = r.get_count_max(MAX_DIMENSION)?;
    let type_name = r.get_text(MAX_NAME_LEN)?;
    let name = r.get_text(MAX_NAME_LEN)?;
    let description = r.get_text(MAX_TEXT_LEN)?;
    let shape = match rank {
        0 => Vec::new(),
        1 => vec![count],
        _ => (0..rank)
            .map(|_| r.get_count_max(MAX_DIMENSION))
            .collect::<WireResult<_>>()?,
    };
    Ok(FieldDescriptor {
        name,
        type_name,
        description,
        atomic,
        pointer,
        rank,
        shape,
        count,
        size,
        offset,
        padding,
        alignment,
    })
}

pub fn put_type(w: &mut XdrWriter<'_>, descriptor: &TypeDescriptor) -> WireResult<()> {
    w.put_word(descriptor.class.tag())?;
    w.put_text(&descriptor.name)?;
    w.put_text(&descriptor.source)?;
    w.put_word(descriptor.ref_id)?;
    w.put_count(descriptor.size)?;
    w.put_text(&descriptor.image)?;
    w.put_count(descriptor.fields.len())?;
    for field in &descriptor.fields {
        put_field(w, field)?;
    }
    Ok(())
}

/// Read one type as the peer laid it out.
pub fn get_type(r: &mut XdrReader<'_>) -> WireResult<TypeDescriptor> {
    let class_tag = r.get_word()?;
    let class = TypeClass::from_tag(class_tag).unwrap_or_else(|| {
        log::debug!("[typedefs] unknown class tag {}, treating as compound", class_tag);
        TypeClass::Compound
    });
    let name = r.get_text(MAX_NAME_LEN)?;
    let source = r.get_text(MAX_TEXT_LEN)?;
    let ref_id = r.get_word()?;
    let size = r.get_count()?;
    let image = r.get_text(MAX_TEXT_LEN)?;
    let field_count = r.get_count()?;
    let mut fields = Vec::with_capacity(field_count.min(MAX_PREALLOC));
    for _ in 0..field_count {
        fields.push(get_field(r)?);
    }
    let alignment = fields.iter().map(|f| f.alignment).max().unwrap_or(1);
    Ok(TypeDescriptor {
        name,
        fields,
        size,
        alignment,
        image,
        class,
        source,
        ref_id,
    })
}

/// Send every registered type, in registration order.
pub fn put_type_list(w: &mut XdrWriter<'_>, registry: &TypeRegistry) -> WireResult<()> {
    w.put_count(registry.len())?;
    for (_, descriptor) in registry.iter() {
        put_type(w, descriptor)?;
    }
    Ok(())
}

pub fn get_type_list(r: &mut XdrReader<'_>) -> WireResult<Vec<TypeDescriptor>> {
    let count = r.get_count()?;
    let mut types = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        types.push(get_type(r)?);
    }
    Ok(types)
}

fn declarations(descriptor: &TypeDescriptor) -> Vec<FieldDecl> {
    descriptor
        .fields
        .iter()
        .map(|f| FieldDecl {
            name: f.name.clone(),
            type_name: f.type_name.clone(),
            pointer: f.pointer,
            shape: f.shape.clone(),
            description: f.description.clone(),
        })
        .collect()
}

/// Lay out received types locally and register them, replacing same-named types.
///
/// A type whose layout cannot be computed (for instance an inline member of
/// a type the peer never sent) is skipped and reported.
pub fn adopt_types(
    registry: &mut TypeRegistry,
    received: Vec<TypeDescriptor>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<TypeId>> {
    let mut adopted = Vec::with_capacity(received.len());
    for remote in received {
        let layout = match layout_fields(&remote.name, declarations(&remote), registry) {
            Ok(layout) => layout,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                diagnostics.push(format!("typedef {}", remote.name), err);
                continue;
            }
        };
        if layout.size != remote.size {
            log::debug!(
                "[typedefs] {}: peer size {} laid out locally as {}",
                remote.name,
                remote.size,
                layout.size
            );
        }
        if let Some(local) = registry.find(&remote.name) {
            if local.fields.len() != layout.fields.len() {
                diagnostics.push(
                    format!("typedef {}", remote.name),
                    MarshalError::SchemaMismatch {
                        type_name: remote.name.clone(),
                        detail: format!(
                            "local definition has {} fields, peer sent {}",
                            local.fields.len(),
                            layout.fields.len()
                        ),
                    },
                );
            }
        }
        let name = remote.name.clone();
        let descriptor = TypeDescriptor {
            name: remote.name,
            fields: layout.fields,
            size: layout.size,
            alignment: layout.alignment,
            image: remote.image,
            class: remote.class,
            source: remote.source,
            ref_id: remote.ref_id,
        };
        registry.replace(&name, descriptor)?;
        if let Some(id) = registry.resolve(&name) {
            adopted.push(id);
        }
    }
    log::debug!("[typedefs] adopted {} types", adopted.len());
    Ok(adopted)
}
