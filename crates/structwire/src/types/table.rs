// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tabular rendering of a registry.

use super::descriptor::{TypeClass, TypeDescriptor};
use super::registry::TypeRegistry;
use std::fmt;

/// Display adapter listing every registered type and its field layout.
pub struct TypeTable<'a> {
    registry: &'a TypeRegistry,
    images: bool,
}

impl<'a> TypeTable<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            images: false,
        }
    }

    /// Also print each declaration image.
    pub fn with_images(mut self, images: bool) -> Self {
        self.images = images;
        self
    }

    fn write_type(&self, f: &mut fmt::Formatter<'_>, desc: &TypeDescriptor) -> fmt::Result {
        let class = match desc.class {
            TypeClass::Compound => "compound",
            TypeClass::Ragged => "ragged",
        };
        writeln!(
            f,
            "{} ({}, size {}, align {}, {} fields)",
            desc.name,
            class,
            desc.size,
            desc.alignment,
            desc.fields.len()
        )?;
        writeln!(
            f,
            "  {:<20} {:<20} {:>3} {:>4} {:<12} {:>6} {:>5} {:>6} {:>4}",
            "field", "type", "ptr", "rank", "shape", "count", "size", "offset", "pad"
        )?;
        for field in &desc.fields {
            let shape = field
                .shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("x");
            writeln!(
                f,
                "  {:<20} {:<20} {:>3} {:>4} {:<12} {:>6} {:>5} {:>6} {:>4}",
                field.name,
                field.type_name,
                u8::from(field.pointer),
                field.rank,
                if shape.is_empty() { "-" } else { shape.as_str() },
                field.count,
                field.size,
                field.offset,
                field.padding
            )?;
        }
        if self.images && !desc.image.is_empty() {
            for line in desc.image.lines() {
                writeln!(f, "  | {}", line)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for TypeTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, desc)) in self.registry.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            self.write_type(f, desc)?;
        }
        Ok(())
    }
}
