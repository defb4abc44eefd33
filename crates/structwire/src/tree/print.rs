// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Indented text rendering of a decoded value.

use super::node::{DecodedTree, NodeId};
use crate::ledger::{Address, AllocationLedger, Heap};
use crate::types::{AtomicType, FieldDescriptor, StringForm, TypeRegistry};
use std::fmt::{self, Write as _};

/// Elements shown per array unless configured otherwise.
pub const DEFAULT_MAX_ELEMENTS: usize = 8;

/// Renders a [`DecodedTree`] with the field values behind each node.
///
/// ```text
/// <root>: Path @0+0
///   count: 2
///   pts[0]: Point @1+0
///     x: 1.5
///     y: -2
/// ```
pub struct TreePrinter<'a> {
    tree: &'a DecodedTree,
    registry: &'a TypeRegistry,
    heap: &'a Heap,
    ledger: &'a AllocationLedger,
    max_elements: usize,
    addresses: bool,
}

impl<'a> TreePrinter<'a> {
    pub fn new(
        tree: &'a DecodedTree,
        registry: &'a TypeRegistry,
        heap: &'a Heap,
        ledger: &'a AllocationLedger,
    ) -> Self {
        Self {
            tree,
            registry,
            heap,
            ledger,
            max_elements: DEFAULT_MAX_ELEMENTS,
            addresses: true,
        }
    }

    /// Truncate arrays after `n` elements.
    pub fn max_elements(mut self, n: usize) -> Self {
        self.max_elements = n;
        self
    }

    /// Show heap addresses next to type names.
    pub fn addresses(mut self, show: bool) -> Self {
        self.addresses = show;
        self
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        let Some(node) = self.tree.get(id) else {
            return Ok(());
        };
        let pad = "  ".repeat(indent);
        let label = if node.parent.is_none() {
            "<root>".to_string()
        } else {
            format!("{}[{}]", node.name, node.index)
        };
        let Some(desc) = self.registry.get(node.type_id) else {
            return writeln!(f, "{}{}: {}", pad, label, node.type_id);
        };
        write!(f, "{}{}: {}", pad, label, desc.name)?;
        if self.addresses {
            write!(f, " {}", node.address)?;
        }
        writeln!(f)?;

        for field in &desc.fields {
            let at = node.address.add(field.offset);
            let value = if field.is_nested() {
                // Non-null structures print as child nodes.
                match field.pointer {
                    true if self.heap.read_pointer(at).is_ok_and(|p| p.is_null()) => "null".to_string(),
                    _ => continue,
                }
            } else {
                self.render_field(field, at)
            };
            writeln!(f, "{}  {}: {}", pad, field.name, value)?;
        }
        for &child in self.tree.children(id) {
            self.write_node(f, child, indent + 1)?;
        }
        Ok(())
    }

    fn render_field(&self, field: &FieldDescriptor, at: Address) -> String {
        if let Some(form) = field.string_form() {
            return self.render_strings(form, at);
        }
        let target = if field.pointer {
            match self.heap.read_pointer(at) {
                Ok(p) if p.is_null() => return "null".to_string(),
                Ok(p) => p,
                Err(_) => return "<invalid>".to_string(),
            }
        } else {
            at
        };
        let Some(atomic) = field.atomic else {
            let bytes = self.ledger.find(target).map_or(0, |r| r.total_bytes());
            return format!("<{} bytes>", bytes);
        };
        let count = if field.pointer {
            self.ledger.find(target).map_or(0, |r| r.total_bytes() / atomic.native_size())
        } else {
            field.count
        };
        let values: Vec<String> = (0..count.min(self.max_elements))
            .map(|i| format_scalar(self.heap, target.add(i * atomic.native_size()), atomic))
            .collect();
        match (count, field.pointer || field.rank > 0) {
            (1, false) => values.into_iter().next().unwrap_or_default(),
            _ => self.list(values, count),
        }
    }

    fn render_strings(&self, form: StringForm, at: Address) -> String {
        match form {
            StringForm::Fixed { len } => quote(self.heap.bytes(at, len).ok()),
            StringForm::Pointer => self.pointed_string(at),
            StringForm::PointerArray { count } => {
                let items = (0..count.min(self.max_elements))
                    .map(|i| self.pointed_string(at.add(i * 8)))
                    .collect();
                self.list(items, count)
            }
            StringForm::FixedArray { len, count } => {
                let items = (0..count.min(self.max_elements))
                    .map(|i| quote(self.heap.bytes(at.add(i * len), len).ok()))
                    .collect();
                self.list(items, count)
            }
            StringForm::PointerToPointers => match self.heap.read_pointer(at) {
                Ok(list) if !list.is_null() => {
                    let count = self.ledger.find(list).map_or(0, |r| r.count);
                    let items = (0..count.min(self.max_elements))
                        .map(|i| self.pointed_string(list.add(i * 8)))
                        .collect();
                    self.list(items, count)
                }
                _ => "null".to_string(),
            },
        }
    }

    fn pointed_string(&self, slot: Address) -> String {
        match self.heap.read_pointer(slot) {
            Ok(p) if !p.is_null() => {
                let len = self.heap.remaining(p).unwrap_or(0);
                quote(self.heap.bytes(p, len).ok())
            }
            _ => "null".to_string(),
        }
    }

    fn list(&self, mut items: Vec<String>, total: usize) -> String {
        if total > items.len() {
            items.push(format!("... {} more", total - items.len()));
        }
        format!("[{}]", items.join(", "))
    }
}

impl fmt::Display for TreePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tree.root() {
            Some(root) => self.write_node(f, root, 0),
            None => writeln!(f, "(empty)"),
        }
    }
}

fn quote(bytes: Option<&[u8]>) -> String {
    let Some(bytes) = bytes else {
        return "<invalid>".to_string();
    };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    format!("{:?}", String::from_utf8_lossy(&bytes[..end]))
}

/// One atomic value as text.
pub fn format_scalar(heap: &Heap, at: Address, atomic: AtomicType) -> String {
    let mut out = String::new();
    let _ = match atomic {
        AtomicType::Char | AtomicType::String => heap.read::<i8>(at).map(|v| write!(out, "{}", v)),
        AtomicType::UnsignedChar => heap.read::<u8>(at).map(|v| write!(out, "{}", v)),
        AtomicType::Short => heap.read::<i16>(at).map(|v| write!(out, "{}", v)),
        AtomicType::UnsignedShort => heap.read::<u16>(at).map(|v| write!(out, "{}", v)),
        AtomicType::Int => heap.read::<i32>(at).map(|v| write!(out, "{}", v)),
        AtomicType::UnsignedInt => heap.read::<u32>(at).map(|v| write!(out, "{}", v)),
        AtomicType::Long | AtomicType::Long64 => heap.read::<i64>(at).map(|v| write!(out, "{}", v)),
        AtomicType::UnsignedLong | AtomicType::UnsignedLong64 => {
            heap.read::<u64>(at).map(|v| write!(out, "{}", v))
        }
        AtomicType::Float => heap.read::<f32>(at).map(|v| write!(out, "{}", v)),
        AtomicType::Double => heap.read::<f64>(at).map(|v| write!(out, "{}", v)),
        AtomicType::Complex => heap
            .read::<f32>(at)
            .and_then(|re| Ok((re, heap.read::<f32>(at.add(4))?)))
            .map(|(re, im)| write!(out, "({}, {})", re, im)),
        AtomicType::DComplex => heap
            .read::<f64>(at)
            .and_then(|re| Ok((re, heap.read::<f64>(at.add(8))?)))
            .map(|(re, im)| write!(out, "({}, {})", re, im)),
    };
    if out.is_empty() {
        out.push_str("<invalid>");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptorBuilder;

    #[test]
    fn test_render_path() {
        let mut registry = TypeRegistry::new();
        let point = TypeDescriptorBuilder::new("Point")
            .atomic("x", "double")
            .atomic("y", "double")
            .register(&mut registry)
            .unwrap();
        let path = TypeDescriptorBuilder::new("Path")
            .atomic("count", "int")
            .pointer("pts", "Point")
            .string("label", 8)
            .pointer("next", "Path")
            .register(&mut registry)
            .unwrap();

        let mut heap = Heap::new();
        let mut ledger = AllocationLedger::new();
        let root = heap.alloc(32).unwrap();
        let pts = heap.alloc(32).unwrap();
        ledger.record(pts, 2, 16, "Point", 1, vec![2]);
        heap.write(root, 2i32).unwrap();
        heap.write_pointer(root.add(8), pts).unwrap();
        heap.bytes_mut(root.add(16), 3).unwrap().copy_from_slice(b"abc");
        heap.write(pts, 1.5f64).unwrap();
        heap.write(pts.add(8), -2.0f64).unwrap();

        let mut tree = DecodedTree::new();
        let r = tree.add("", path, root, 0, None);
        tree.add("pts", point, pts, 0, Some(r));
        tree.add("pts", point, pts.add(16), 1, Some(r));

        let text = TreePrinter::new(&tree, &registry, &heap, &ledger)
            .addresses(false)
            .to_string();
        let expected = "\
<root>: Path
  count: 2
  label: \"abc\"
  next: null
  pts[0]: Point
    x: 1.5
    y: -2
  pts[1]: Point
    x: 0
    y: 0
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_arrays_are_truncated() {
        let mut registry = TypeRegistry::new();
        let t = TypeDescriptorBuilder::new("Grid")
            .array("cells", "short", &[2, 3])
            .register(&mut registry)
            .unwrap();
        let mut heap = Heap::new();
        let a = heap.alloc(12).unwrap();
        for i in 0..6 {
            heap.write(a.add(i * 2), i as i16).unwrap();
        }
        let mut tree = DecodedTree::new();
        tree.add("", t, a, 0, None);
        let ledger = AllocationLedger::new();
        let text = TreePrinter::new(&tree, &registry, &heap, &ledger)
            .addresses(false)
            .max_elements(4)
            .to_string();
        assert!(text.contains("cells: [0, 1, 2, 3, ... 2 more]"), "{}", text);
    }

    #[test]
    fn test_format_complex() {
        let mut heap = Heap::new();
        let a = heap.alloc(8).unwrap();
        heap.write(a, 1.0f32).unwrap();
        heap.write(a.add(4), -0.5f32).unwrap();
        assert_eq!(format_scalar(&heap, a, AtomicType::Complex), "(1, -0.5)");
        assert_eq!(format_scalar(&heap, a.add(6), AtomicType::Double), "<invalid>");
    }
}
