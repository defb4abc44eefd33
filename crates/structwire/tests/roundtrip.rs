// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::cast_sign_loss)] // Test data conversions
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::unreadable_literal)] // Large test constants
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::similar_names)] // Test variable naming

//! Encode/decode round trips across every field shape.

use structwire::{Address, DecodedTree, MarshalConfig, MemoryTransport, Session, TypeDescriptorBuilder};

fn peer_of(sender: &Session) -> Session {
    let mut receiver = Session::with_config(sender.config().clone());
    for (_, desc) in sender.registry().iter() {
        receiver.registry_mut().insert(desc.clone()).unwrap();
    }
    receiver
}

fn offset(session: &Session, type_name: &str, field: &str) -> usize {
    session
        .registry()
        .find(type_name)
        .and_then(|d| d.field(field))
        .map(|f| f.offset)
        .unwrap()
}

/// Every non-null pointer reachable from a decoded node has a ledger record.
fn assert_pointers_recorded(session: &Session, tree: &DecodedTree) {
    for (_, node) in tree.iter() {
        let desc = session.registry().get(node.type_id).unwrap();
        for field in desc.fields.iter().filter(|f| f.pointer) {
            let target = session.heap().read_pointer(node.address.add(field.offset)).unwrap();
            if target.is_null() {
                continue;
            }
            let record = session.ledger().find(target);
            assert!(record.is_ok(), "{}.{} -> {} not recorded", desc.name, field.name, target);
        }
    }
}

#[test]
fn test_every_field_shape_roundtrips() {
    let mut sender = Session::new();
    TypeDescriptorBuilder::new("Inner")
        .atomic("a", "float")
        .atomic("b", "unsigned char")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::new("All")
        .atomic("i", "int")
        .array("grid", "short", &[2, 3])
        .atomic("big", "unsigned long long")
        .atomic("z", "dcomplex")
        .pointer("samples", "double")
        .string("name", 8)
        .string_ptr("note")
        .string_ptr_array("aliases", 2)
        .string_array("slots", 3, 4)
        .string_list("words")
        .nested("inner", "Inner")
        .array("inners", "Inner", &[2])
        .pointer("kids", "Inner")
        .register(sender.registry_mut())
        .unwrap();
    let inner_size = sender.registry().size_of("Inner").unwrap();

    let all = sender.alloc_struct("All", 1).unwrap();
    sender.set_field(all, "All", "i", 0, -42i32).unwrap();
    for k in 0..6 {
        sender.set_field(all, "All", "grid", k, (k as i16) * -7).unwrap();
    }
    sender.set_field(all, "All", "big", 0, u64::MAX - 1).unwrap();
    let z = all.add(offset(&sender, "All", "z"));
    sender.heap_mut().write(z, 1.25f64).unwrap();
    sender.heap_mut().write(z.add(8), -3.5f64).unwrap();
    let samples = sender.alloc_shaped(&[0.5f64, 1.5, 2.5, 3.5], &[2, 2]).unwrap();
    sender.set_pointer(all, "All", "samples", samples).unwrap();
    sender.set_string(all, "All", "name", 0, "sensor").unwrap();
    sender.set_string(all, "All", "note", 0, "calibrated at dawn").unwrap();
    sender.set_string(all, "All", "aliases", 0, "s1").unwrap();
    sender.set_string(all, "All", "slots", 0, "ab").unwrap();
    sender.set_string(all, "All", "slots", 2, "xyz").unwrap();
    sender.set_string_list(all, "All", "words", &["alpha", "", "gamma"]).unwrap();

    let inner = all.add(offset(&sender, "All", "inner"));
    sender.set_field(inner, "Inner", "a", 0, 0.125f32).unwrap();
    sender.set_field(inner, "Inner", "b", 0, 200u8).unwrap();
    let inners = all.add(offset(&sender, "All", "inners"));
    sender.set_field(inners.add(inner_size), "Inner", "b", 0, 7u8).unwrap();
    let kids = sender.alloc_struct("Inner", 3).unwrap();
    for k in 0..3 {
        sender
            .set_field(kids.add(k * inner_size), "Inner", "a", 0, k as f32 + 0.5)
            .unwrap();
    }
    sender.set_pointer(all, "All", "kids", kids).unwrap();

    let mut wire = MemoryTransport::new();
    let report = sender.encode("All", all, &mut wire).unwrap();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    let mut receiver = peer_of(&sender);
    let decoded = receiver.decode("All", &mut wire).unwrap();
    assert!(decoded.diagnostics.is_empty(), "{:?}", decoded.diagnostics);
    assert_eq!(decoded.bytes, report.bytes);
    assert_eq!(wire.remaining(), 0);
    let root = decoded.root;
    let r = &receiver;

    assert_eq!(r.field::<i32>(root, "All", "i", 0).unwrap(), -42);
    for k in 0..6 {
        assert_eq!(r.field::<i16>(root, "All", "grid", k).unwrap(), (k as i16) * -7);
    }
    assert_eq!(r.field::<u64>(root, "All", "big", 0).unwrap(), u64::MAX - 1);
    let z = root.add(offset(r, "All", "z"));
    assert_eq!(r.heap().read::<f64>(z).unwrap(), 1.25);
    assert_eq!(r.heap().read::<f64>(z.add(8)).unwrap(), -3.5);

    let samples = r.pointer(root, "All", "samples").unwrap();
    assert_eq!(r.read_slice::<f64>(samples).unwrap(), vec![0.5, 1.5, 2.5, 3.5]);
    let record = r.ledger().find(samples).unwrap();
    assert_eq!((record.rank, record.shape.clone()), (2, vec![2, 2]));

    let text = |field: &str, i: usize| r.string(root, "All", field, i).unwrap();
    assert_eq!(text("name", 0).as_deref(), Some("sensor"));
    assert_eq!(text("note", 0).as_deref(), Some("calibrated at dawn"));
    assert_eq!(text("aliases", 0).as_deref(), Some("s1"));
    assert_eq!(text("aliases", 1), None);
    assert_eq!(text("slots", 0).as_deref(), Some("ab"));
    assert_eq!(text("slots", 1).as_deref(), Some(""));
    assert_eq!(text("slots", 2).as_deref(), Some("xyz"));
    assert_eq!(text("words", 0).as_deref(), Some("alpha"));
    assert_eq!(text("words", 1).as_deref(), Some(""));
    assert_eq!(text("words", 2).as_deref(), Some("gamma"));

    let inner = root.add(offset(r, "All", "inner"));
    assert_eq!(r.field::<f32>(inner, "Inner", "a", 0).unwrap(), 0.125);
    assert_eq!(r.field::<u8>(inner, "Inner", "b", 0).unwrap(), 200);
    let inners = root.add(offset(r, "All", "inners"));
    assert_eq!(r.field::<u8>(inners.add(inner_size), "Inner", "b", 0).unwrap(), 7);
    let kids = r.pointer(root, "All", "kids").unwrap();
    for k in 0..3 {
        let a: f32 = r.field(kids.add(k * inner_size), "Inner", "a", 0).unwrap();
        assert_eq!(a, k as f32 + 0.5);
    }

    // root, inner[0], inners[0..2], kids[0..3]
    assert_eq!(decoded.tree.len(), 7);
    let root_id = decoded.tree.root().unwrap();
    assert_eq!(decoded.tree.children(root_id).len(), 6);
    assert_pointers_recorded(r, &decoded.tree);
}

#[test]
fn test_point_path_scenario() {
    let mut sender = Session::new();
    TypeDescriptorBuilder::new("Point")
        .atomic("x", "double")
        .atomic("y", "double")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::new("Path")
        .atomic("count", "int")
        .pointer("pts", "Point")
        .register(sender.registry_mut())
        .unwrap();
    let path = sender.alloc_struct("Path", 1).unwrap();
    let pts = sender.alloc_struct("Point", 3).unwrap();
    let coords = [(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)];
    for (i, &(x, y)) in coords.iter().enumerate() {
        sender.set_field(pts.add(i * 16), "Point", "x", 0, x).unwrap();
        sender.set_field(pts.add(i * 16), "Point", "y", 0, y).unwrap();
    }
    sender.set_field(path, "Path", "count", 0, 3i32).unwrap();
    sender.set_pointer(path, "Path", "pts", pts).unwrap();

    let mut wire = MemoryTransport::new();
    sender.encode("Path", path, &mut wire).unwrap();
    let mut receiver = peer_of(&sender);
    let decoded = receiver.decode("Path", &mut wire).unwrap();

    let tree = &decoded.tree;
    let root = tree.root().unwrap();
    assert_eq!(tree.get(root).unwrap().name, "");
    let children = tree.children(root);
    assert_eq!(children.len(), 3);
    let point_id = receiver.type_id("Point").unwrap();
    for (i, &child) in children.iter().enumerate() {
        let node = tree.get(child).unwrap();
        assert_eq!((node.name.as_str(), node.index, node.type_id), ("pts", i, point_id));
        assert_eq!(tree.parent(child), Some(root));
        let x: f64 = receiver.field(node.address, "Point", "x", 0).unwrap();
        let y: f64 = receiver.field(node.address, "Point", "y", 0).unwrap();
        assert_eq!((x, y), coords[i]);
    }
    assert_eq!(tree.path(children[2]), "pts[2]");

    let text = receiver.printer(tree).addresses(false).to_string();
    assert!(text.starts_with("<root>: Path\n  count: 3\n"), "{}", text);
    assert!(text.contains("  pts[2]: Point\n    x: 5\n    y: 6\n"), "{}", text);
}

#[test]
fn test_char_pointer_keeps_terminator() {
    let mut sender = Session::new();
    TypeDescriptorBuilder::new("Msg")
        .string_ptr("s")
        .register(sender.registry_mut())
        .unwrap();
    let msg = sender.alloc_struct("Msg", 1).unwrap();
    sender.set_string(msg, "Msg", "s", 0, "abc").unwrap();

    let mut wire = MemoryTransport::new();
    sender.encode("Msg", msg, &mut wire).unwrap();
    let mut receiver = peer_of(&sender);
    let decoded = receiver.decode("Msg", &mut wire).unwrap();

    let s = receiver.pointer(decoded.root, "Msg", "s").unwrap();
    let record = receiver.ledger().find(s).unwrap();
    assert_eq!(record.total_bytes(), 4);
    assert_eq!(record.type_name, "char");
    assert_eq!(receiver.heap().bytes(s, 4).unwrap(), b"abc\0");
}

#[test]
fn test_randomized_samples_roundtrip() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let mut sender = Session::with_config(MarshalConfig::new());
    TypeDescriptorBuilder::new("Samples")
        .atomic("id", "long")
        .pointer("values", "double")
        .pointer("flags", "unsigned short")
        .string_ptr("label")
        .register(sender.registry_mut())
        .unwrap();
    let mut receiver = peer_of(&sender);

    for _ in 0..64 {
        let id = rng.i64(..);
        let values: Vec<f64> = (0..rng.usize(0..40)).map(|_| rng.f64() * 1e6 - 5e5).collect();
        let flags: Vec<u16> = (0..rng.usize(0..9)).map(|_| rng.u16(..)).collect();
        let label: String = (0..rng.usize(0..24)).map(|_| rng.alphanumeric()).collect();

        let samples = sender.alloc_struct("Samples", 1).unwrap();
        sender.set_field(samples, "Samples", "id", 0, id).unwrap();
        let v = sender.alloc_slice(&values).unwrap();
        let f = sender.alloc_slice(&flags).unwrap();
        sender.set_pointer(samples, "Samples", "values", v).unwrap();
        sender.set_pointer(samples, "Samples", "flags", f).unwrap();
        sender.set_string(samples, "Samples", "label", 0, &label).unwrap();

        let mut wire = MemoryTransport::new();
        sender.encode("Samples", samples, &mut wire).unwrap();
        let decoded = receiver.decode("Samples", &mut wire).unwrap();
        let root = decoded.root;

        assert_eq!(receiver.field::<i64>(root, "Samples", "id", 0).unwrap(), id);
        let v = receiver.pointer(root, "Samples", "values").unwrap();
        assert_eq!(receiver.read_slice::<f64>(v).unwrap(), values);
        let f = receiver.pointer(root, "Samples", "flags").unwrap();
        assert_eq!(receiver.read_slice::<u16>(f).unwrap(), flags);
        assert_eq!(
            receiver.string(root, "Samples", "label", 0).unwrap().as_deref(),
            Some(label.as_str())
        );
    }
    assert!(receiver.release_all() > 0);
    assert_eq!(receiver.heap().live_blocks(), 0);
}

#[test]
fn test_null_pointer_field_stays_null() {
    let mut sender = Session::new();
    TypeDescriptorBuilder::new("Leaf")
        .atomic("v", "int")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::new("Tree")
        .pointer("left", "Leaf")
        .pointer("right", "Leaf")
        .register(sender.registry_mut())
        .unwrap();
    let tree = sender.alloc_struct("Tree", 1).unwrap();
    let leaf = sender.alloc_struct("Leaf", 1).unwrap();
    sender.set_field(leaf, "Leaf", "v", 0, 9i32).unwrap();
    sender.set_pointer(tree, "Tree", "right", leaf).unwrap();

    let mut wire = MemoryTransport::new();
    sender.encode("Tree", tree, &mut wire).unwrap();
    let mut receiver = peer_of(&sender);
    let decoded = receiver.decode("Tree", &mut wire).unwrap();
    assert_eq!(receiver.pointer(decoded.root, "Tree", "left").unwrap(), Address::NULL);
    let right = receiver.pointer(decoded.root, "Tree", "right").unwrap();
    assert_eq!(receiver.field::<i32>(right, "Leaf", "v", 0).unwrap(), 9);
    assert_eq!(decoded.tree.len(), 2);
}
