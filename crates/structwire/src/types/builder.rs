// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for [`TypeDescriptor`](super::TypeDescriptor).

use super::descriptor::{FieldDecl, TypeClass, STRING_ARRAY_TYPE, STRING_TYPE, VOID_TYPE};
use super::registry::{TypeId, TypeRegistry};
use crate::error::Result;

/// Name of the count field of a ragged type.
pub const RAGGED_LEN_FIELD: &str = "len";

/// Name of the data pointer field of a ragged type.
pub const RAGGED_DATA_FIELD: &str = "data";

/// Builder for registering a compound type.
#[derive(Debug, Clone)]
pub struct TypeDescriptorBuilder {
    name: String,
    fields: Vec<FieldDecl>,
    class: TypeClass,
    image: Option<String>,
}

impl TypeDescriptorBuilder {
    /// Create a new builder for a compound type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            class: TypeClass::Compound,
            image: None,
        }
    }

    /// Ragged wrapper `{ unsigned int len; element *data; }`.
    pub fn ragged(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self::new(name)
            .atomic(RAGGED_LEN_FIELD, "unsigned int")
            .pointer(RAGGED_DATA_FIELD, element)
            .class(TypeClass::Ragged)
    }

    /// Add a scalar field of an atomic or registered type.
    pub fn atomic(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.field(FieldDecl::new(name, type_name))
    }

    /// Add a fixed array; `dims` in C declaration order.
    pub fn array(self, name: impl Into<String>, type_name: impl Into<String>, dims: &[usize]) -> Self {
        self.field(FieldDecl::new(name, type_name).dims(dims))
    }

    /// Add a pointer to a run of `type_name` elements.
    pub fn pointer(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.field(FieldDecl::new(name, type_name).pointer())
    }

    /// Add an inline nested structure.
    pub fn nested(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.atomic(name, type_name)
    }

    /// `char name[len]`
    pub fn string(self, name: impl Into<String>, len: usize) -> Self {
        self.field(FieldDecl::new(name, STRING_TYPE).dims(&[len]))
    }

    /// `char *name`
    pub fn string_ptr(self, name: impl Into<String>) -> Self {
        self.field(FieldDecl::new(name, STRING_TYPE).pointer())
    }

    /// `char name[count][len]`
    pub fn string_array(self, name: impl Into<String>, count: usize, len: usize) -> Self {
        self.field(FieldDecl::new(name, STRING_TYPE).dims(&[count, len]))
    }

    /// `char *name[count]`
    pub fn string_ptr_array(self, name: impl Into<String>, count: usize) -> Self {
        self.field(FieldDecl::new(name, STRING_ARRAY_TYPE).dims(&[count]))
    }

    /// `char **name`
    pub fn string_list(self, name: impl Into<String>) -> Self {
        self.field(FieldDecl::new(name, STRING_ARRAY_TYPE).pointer())
    }

    /// `void *name`
    pub fn opaque(self, name: impl Into<String>) -> Self {
        self.field(FieldDecl::new(name, VOID_TYPE).pointer())
    }

    /// Add a pre-built declaration.
    pub fn field(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }

    /// Describe the most recently added field.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = description.into();
        }
        self
    }

    pub fn class(mut self, class: TypeClass) -> Self {
        self.class = class;
        self
    }

    /// Override the rendered declaration image.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lay out and register the type.
    pub fn register(self, registry: &mut TypeRegistry) -> Result<TypeId> {
        registry.register_with(&self.name, self.fields, self.class, self.image)
    }
}
