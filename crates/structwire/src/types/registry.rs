// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session-scoped type registry.

use super::atomic::AtomicType;
use super::descriptor::{FieldDecl, TypeClass, TypeDescriptor};
use super::layout::layout_fields;
use crate::config::POINTER_SIZE;
use crate::error::{MarshalError, Result};
use std::collections::HashMap;
use std::fmt;

// ----------------------------------------------------------------------------
// TypeId
// ----------------------------------------------------------------------------

/// Stable handle of a registered type.
///
/// Redefinition via [`TypeRegistry::replace`] keeps the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// TypeRegistry
// ----------------------------------------------------------------------------

/// Name -> [`TypeDescriptor`] mapping. Append-only, replace-by-name.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay out `fields` and register the result under `name`.
    pub fn register(&mut self, name: &str, fields: Vec<FieldDecl>) -> Result<TypeId> {
        self.register_with(name, fields, TypeClass::Compound, None)
    }

    /// Register with an explicit class and declaration image.
    ///
    /// A `None` image is rendered from the field list.
    pub fn register_with(
        &mut self,
        name: &str,
        fields: Vec<FieldDecl>,
        class: TypeClass,
        image: Option<String>,
    ) -> Result<TypeId> {
        if self.by_name.contains_key(name) {
            return Err(MarshalError::DuplicateType(name.to_string()));
        }
        let layout = layout_fields(name, fields, self)?;
        let mut descriptor = TypeDescriptor {
            name: name.to_string(),
            fields: layout.fields,
            size: layout.size,
            alignment: layout.alignment,
            image: String::new(),
            class,
            source: String::new(),
            ref_id: 0,
        };
        descriptor.image = image.unwrap_or_else(|| descriptor.render_image());
        self.insert(descriptor)
    }

    /// Register an already laid-out descriptor.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> Result<TypeId> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(MarshalError::DuplicateType(descriptor.name));
        }
        let id = TypeId(self.types.len() as u32);
        log::debug!(
            "[registry] register {} as {} (size {}, {} fields)",
            descriptor.name,
            id,
            descriptor.size,
            descriptor.fields.len()
        );
        self.by_name.insert(descriptor.name.clone(), id);
        self.types.push(descriptor);
        Ok(id)
    }

    /// Redefine `name` in place, returning the previous definition.
    ///
    /// Inserts when `name` is new.
    pub fn replace(&mut self, name: &str, mut descriptor: TypeDescriptor) -> Result<Option<TypeDescriptor>> {
        descriptor.name = name.to_string();
        match self.by_name.get(name) {
            Some(&id) => {
                log::debug!("[registry] redefine {} ({})", name, id);
                Ok(Some(std::mem::replace(&mut self.types[id.index()], descriptor)))
            }
            None => {
                self.insert(descriptor)?;
                Ok(None)
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&TypeDescriptor> {
        self.resolve(name).and_then(|id| self.get(id))
    }

    pub fn resolve(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(id.index())
    }

    pub fn set_class(&mut self, id: TypeId, class: TypeClass) -> Result<()> {
        let descriptor = self
            .types
            .get_mut(id.index())
            .ok_or_else(|| MarshalError::TypeUnresolved(id.to_string()))?;
        descriptor.class = class;
        Ok(())
    }

    /// Size of one element of a named type: atomic or registered.
    pub fn size_of(&self, name: &str) -> Option<usize> {
        AtomicType::from_name(name)
            .map(AtomicType::native_size)
            .or_else(|| self.find(name).map(|d| d.size))
    }

    /// Element size a pointer field of `name` would target.
    pub fn element_size(&self, name: &str, pointer_array: bool) -> Option<usize> {
        if pointer_array {
            return Some(POINTER_SIZE);
        }
        self.size_of(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeId(i as u32), d))
    }
}
