// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field and type descriptors.
//!
//! Shapes are stored fastest-varying dimension first. For a C declaration
//! `double m[2][3]` the shape is `[3, 2]`; for an array of fixed strings
//! `char names[4][16]` it is `[16, 4]`, so `shape[0]` is the string length.

use super::atomic::AtomicType;
use std::fmt::Write as _;

/// Declared type of an array of strings (`char *s[N]`, `char **s`).
pub const STRING_ARRAY_TYPE: &str = "STRING *";

/// Declared type of a single string (`char s[N]`, `char *s`).
pub const STRING_TYPE: &str = "STRING";

/// Declared type of an untyped pointer.
pub const VOID_TYPE: &str = "void";

/// Resolved type of an untyped block sent as raw bytes.
pub const OPAQUE_TYPE: &str = "opaque";

/// Classification of a compound type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeClass {
    /// Plain structure.
    #[default]
    Compound,
    /// Variable-length array wrapper: `{ unsigned int len; T *data; }`.
    Ragged,
}

impl TypeClass {
    /// Wire tag.
    pub const fn tag(self) -> i32 {
        match self {
            TypeClass::Compound => 18,
            TypeClass::Ragged => 16,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            18 => Some(TypeClass::Compound),
            16 => Some(TypeClass::Ragged),
            _ => None,
        }
    }
}

/// Field as declared, before layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub type_name: String,
    pub pointer: bool,
    /// Dimension lengths, fastest-varying first. Empty for scalars.
    pub shape: Vec<usize>,
    pub description: String,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            pointer: false,
            shape: Vec::new(),
            description: String::new(),
        }
    }

    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    /// Dimensions in C declaration order (`[2][3]` -> `&[2, 3]`).
    pub fn dims(mut self, dims: &[usize]) -> Self {
        self.shape = dims.iter().rev().copied().collect();
        self
    }

    /// Shape already in storage order.
    pub fn shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Wire representation of a string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringForm {
    /// `char s[len]`
    Fixed { len: usize },
    /// `char *s`
    Pointer,
    /// `char *s[count]`
    PointerArray { count: usize },
    /// `char s[count][len]`
    FixedArray { len: usize, count: usize },
    /// `char **s`
    PointerToPointers,
}

/// Laid-out field of a [`TypeDescriptor`]. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared type name (element type for pointers).
    pub type_name: String,
    pub description: String,
    /// `None` for nested structures and opaque data.
    pub atomic: Option<AtomicType>,
    pub pointer: bool,
    pub rank: usize,
    pub shape: Vec<usize>,
    /// Number of elements stored inline (1 for pointers).
    pub count: usize,
    /// Bytes per inline element.
    pub size: usize,
    pub offset: usize,
    /// Padding inserted before this field.
    pub padding: usize,
    pub alignment: usize,
}

impl FieldDescriptor {
    /// Bytes occupied inside the owning structure.
    /// Saturates; laid-out descriptors never overflow.
    pub fn space(&self) -> usize {
        self.size.saturating_mul(self.count)
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.space())
    }

    pub fn is_string(&self) -> bool {
        self.atomic == Some(AtomicType::String)
    }

    pub fn is_string_array(&self) -> bool {
        self.type_name.eq_ignore_ascii_case(STRING_ARRAY_TYPE)
    }

    pub fn is_opaque(&self) -> bool {
        self.atomic.is_none() && self.type_name.eq_ignore_ascii_case(VOID_TYPE)
    }

    /// Nested described structure (pointer or inline).
    pub fn is_nested(&self) -> bool {
        self.atomic.is_none() && !self.is_opaque()
    }

    pub fn string_form(&self) -> Option<StringForm> {
        if !self.is_string() {
            return None;
        }
        let form = match (self.pointer, self.is_string_array(), self.rank) {
            (true, false, _) => StringForm::Pointer,
            (true, true, _) => StringForm::PointerToPointers,
            (false, true, _) => StringForm::PointerArray { count: self.count },
            (false, false, 0 | 1) => StringForm::Fixed { len: self.count },
            (false, false, _) => {
                let len = self.shape.first().copied().unwrap_or(0);
                StringForm::FixedArray {
                    len,
                    count: if len == 0 { 0 } else { self.count / len },
                }
            }
        };
        Some(form)
    }

    /// C-like declaration line, used when building type images.
    pub fn declaration(&self) -> String {
        let mut line = String::new();
        let base = match self.string_form() {
            Some(_) => "char",
            None => self.type_name.as_str(),
        };
        let stars = match self.string_form() {
            Some(StringForm::Pointer | StringForm::PointerArray { .. }) => "*",
            Some(StringForm::PointerToPointers) => "**",
            Some(_) => "",
            None if self.pointer => "*",
            None => "",
        };
        let _ = write!(line, "{} {}{}", base, stars, self.name);
        for dim in self.shape.iter().rev() {
            let _ = write!(line, "[{}]", dim);
        }
        line.push(';');
        if !self.description.is_empty() {
            let _ = write!(line, " // {}", self.description);
        }
        line
    }
}

/// Run-time description of an aggregate type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Total instance size, padded to `alignment`.
    pub size: usize,
    pub alignment: usize,
    /// Declaration text for receivers that never compiled the type.
    pub image: String,
    pub class: TypeClass,
    /// File the declaration came from, if any.
    pub source: String,
    pub ref_id: i32,
}

impl TypeDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn is_ragged(&self) -> bool {
        self.class == TypeClass::Ragged
    }

    /// Render the declaration image from the field list.
    pub fn render_image(&self) -> String {
        let mut image = format!("typedef struct {} {{\n", self.name);
        for field in &self.fields {
            let _ = writeln!(image, "    {}", field.declaration());
        }
        let _ = writeln!(image, "}} {};", self.name);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_field(pointer: bool, type_name: &str, shape: Vec<usize>) -> FieldDescriptor {
        let count = shape.iter().product::<usize>().max(1);
        FieldDescriptor {
            name: "s".into(),
            type_name: type_name.into(),
            description: String::new(),
            atomic: Some(AtomicType::String),
            pointer,
            rank: shape.len(),
            shape,
            count,
            size: 1,
            offset: 0,
            padding: 0,
            alignment: 1,
        }
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(
            string_field(false, STRING_TYPE, vec![16]).string_form(),
            Some(StringForm::Fixed { len: 16 })
        );
        assert_eq!(
            string_field(true, STRING_TYPE, vec![]).string_form(),
            Some(StringForm::Pointer)
        );
        assert_eq!(
            string_field(false, STRING_ARRAY_TYPE, vec![4]).string_form(),
            Some(StringForm::PointerArray { count: 4 })
        );
        assert_eq!(
            string_field(false, STRING_TYPE, vec![16, 4]).string_form(),
            Some(StringForm::FixedArray { len: 16, count: 4 })
        );
        assert_eq!(
            string_field(true, STRING_ARRAY_TYPE, vec![]).string_form(),
            Some(StringForm::PointerToPointers)
        );
    }

    #[test]
    fn test_declaration_rendering() {
        assert_eq!(
            string_field(false, STRING_TYPE, vec![16, 4]).declaration(),
            "char s[4][16];"
        );
        assert_eq!(
            string_field(false, STRING_ARRAY_TYPE, vec![3]).declaration(),
            "char *s[3];"
        );
        let mut f = string_field(true, STRING_ARRAY_TYPE, vec![]);
        f.description = "labels".into();
        assert_eq!(f.declaration(), "char **s; // labels");
    }

    #[test]
    fn test_class_tags() {
        assert_eq!(TypeClass::from_tag(TypeClass::Ragged.tag()), Some(TypeClass::Ragged));
        assert_eq!(TypeClass::from_tag(TypeClass::Compound.tag()), Some(TypeClass::Compound));
        assert_eq!(TypeClass::from_tag(0), None);
    }

    #[test]
    fn test_decl_dims_reverse_to_storage_order() {
        let decl = FieldDecl::new("m", "double").dims(&[2, 3]);
        assert_eq!(decl.shape, vec![3, 2]);
    }
}
