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

//! Navigating and regularizing decoded trees.

use std::collections::HashSet;
use structwire::{Decoded, MemoryTransport, Session, TypeClass, TypeDescriptorBuilder};

const LENS: [u32; 4] = [1, 3, 0, 2];

fn scene() -> (Session, Session, Decoded) {
    let mut sender = Session::new();
    let registry = sender.registry_mut();
    TypeDescriptorBuilder::new("Point")
        .atomic("x", "double")
        .atomic("y", "double")
        .register(registry)
        .unwrap();
    TypeDescriptorBuilder::new("Header")
        .atomic("stamp", "long")
        .nested("origin", "Point")
        .register(registry)
        .unwrap();
    TypeDescriptorBuilder::ragged("Samples", "double")
        .register(registry)
        .unwrap();
    TypeDescriptorBuilder::new("Scene")
        .string("name", 16)
        .nested("header", "Header")
        .pointer("rows", "Samples")
        .register(registry)
        .unwrap();

    let scene = sender.alloc_struct("Scene", 1).unwrap();
    sender.set_string(scene, "Scene", "name", 0, "bench").unwrap();
    let rows = sender.alloc_struct("Samples", LENS.len()).unwrap();
    let row_size = sender.registry().size_of("Samples").unwrap();
    for (i, &len) in LENS.iter().enumerate() {
        let row = rows.add(i * row_size);
        sender.set_field(row, "Samples", "len", 0, len).unwrap();
        if len > 0 {
            let values: Vec<f64> = (0..len).map(|k| f64::from(i as u32 * 10 + k)).collect();
            let data = sender.alloc_slice(&values).unwrap();
            sender.set_pointer(row, "Samples", "data", data).unwrap();
        }
    }
    sender.set_pointer(scene, "Scene", "rows", rows).unwrap();

    let mut wire = MemoryTransport::new();
    sender.encode_package("Scene", scene, &mut wire).unwrap();
    let mut receiver = Session::new();
    let decoded = receiver.decode_package(&mut wire).unwrap();
    (sender, receiver, decoded)
}

#[test]
fn test_tree_shape_and_queries() {
    let (_, receiver, decoded) = scene();
    let registry = receiver.registry();
    let tree = &decoded.tree;
    let root = tree.root().unwrap();

    // Scene, header, header.origin, four rows
    assert_eq!(tree.len(), 7);
    assert_eq!(tree.children(root).len(), 5);

    let header = tree.find_structure(root, "header").unwrap();
    let origin = tree.find_structure(root, "header.origin").unwrap();
    assert_eq!(tree.parent(origin), Some(header));
    assert_eq!(tree.path(origin), "header[0].origin[0]");

    assert_eq!(tree.find_member(registry, root, "stamp"), Some(header));
    assert_eq!(tree.find_member(registry, root, "header/origin/x"), Some(origin));
    assert_eq!(tree.find_member(registry, root, "header.missing"), None);
    assert_eq!(tree.find_by_type_name(registry, root, "Point"), Some(origin));
    assert_eq!(tree.find_by_component_type(registry, root, "Point"), Some(header));

    let rows = tree.find_by_class(registry, root, TypeClass::Ragged);
    assert_eq!(rows.len(), 4);
    let third = tree.get(rows[2]).unwrap();
    assert_eq!((third.name.as_str(), third.index), ("rows", 2));
    assert_eq!(tree.find_by_address(root, third.address), Some(rows[2]));

    assert_eq!(receiver.max_ragged_count(tree, "Samples").unwrap(), 3);
}

#[test]
fn test_regularize_grows_to_longest() {
    let (_, mut receiver, mut decoded) = scene();
    let grown = receiver.regularize(&mut decoded.tree, "Samples").unwrap();
    assert_eq!(grown, 3);

    let expected: [&[f64]; 4] = [
        &[0.0, 0.0, 0.0],
        &[10.0, 11.0, 12.0],
        &[0.0, 0.0, 0.0],
        &[30.0, 31.0, 30.0],
    ];
    let samples_id = receiver.type_id("Samples").unwrap();
    let nodes: Vec<_> = decoded
        .tree
        .iter()
        .filter(|(_, n)| n.type_id == samples_id)
        .map(|(_, n)| n.address)
        .collect();
    assert_eq!(nodes.len(), 4);
    for (row, want) in nodes.iter().zip(expected) {
        assert_eq!(receiver.field::<u32>(*row, "Samples", "len", 0).unwrap(), 3);
        let data = receiver.pointer(*row, "Samples", "data").unwrap();
        assert_eq!(receiver.read_slice::<f64>(data).unwrap(), want);
        let record = receiver.ledger().find(data).unwrap();
        assert_eq!((record.count, record.size), (3, 8));
    }

    let samples = receiver.registry().find("Samples").unwrap();
    assert_eq!(samples.class, TypeClass::Compound);
    assert_eq!(receiver.regularize(&mut decoded.tree, "Samples").unwrap(), 0);

    let text = receiver.printer(&decoded.tree).addresses(false).to_string();
    assert!(!text.contains("len: 1"), "{}", text);
    assert!(text.contains("data: [30, 31, 30]"), "{}", text);
}

#[test]
fn test_regularize_copies_nested_elements() {
    let mut sender = Session::new();
    TypeDescriptorBuilder::new("Point")
        .atomic("x", "double")
        .atomic("y", "double")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::ragged("Trail", "Point")
        .register(sender.registry_mut())
        .unwrap();
    let trails = sender.alloc_struct("Trail", 2).unwrap();
    let trail_size = sender.registry().size_of("Trail").unwrap();
    for (i, len) in [1usize, 2].into_iter().enumerate() {
        let trail = trails.add(i * trail_size);
        let pts = sender.alloc_struct("Point", len).unwrap();
        for k in 0..len {
            sender.set_field(pts.add(k * 16), "Point", "x", 0, (i * 10 + k) as f64).unwrap();
        }
        sender.set_field(trail, "Trail", "len", 0, len as u32).unwrap();
        sender.set_pointer(trail, "Trail", "data", pts).unwrap();
    }
    TypeDescriptorBuilder::new("Route")
        .pointer("trails", "Trail")
        .register(sender.registry_mut())
        .unwrap();
    let route = sender.alloc_struct("Route", 1).unwrap();
    sender.set_pointer(route, "Route", "trails", trails).unwrap();

    let mut wire = MemoryTransport::new();
    sender.encode_package("Route", route, &mut wire).unwrap();
    let mut receiver = Session::new();
    let mut decoded = receiver.decode_package(&mut wire).unwrap();
    assert_eq!(decoded.tree.len(), 1 + 2 + 3);

    assert_eq!(receiver.regularize_all(&mut decoded.tree).unwrap(), 1);
    assert_eq!(decoded.tree.len(), 1 + 2 + 4);
    assert_eq!(receiver.regularize_all(&mut decoded.tree).unwrap(), 0);

    let root = decoded.tree.root().unwrap();
    let first = decoded.tree.find_structure(root, "trails").unwrap();
    let points = decoded.tree.children(first);
    assert_eq!(points.len(), 2);
    let copy = decoded.tree.get(points[1]).unwrap();
    let original = decoded.tree.get(points[0]).unwrap();
    assert_eq!(copy.index, 1);
    assert_eq!(copy.address, original.address.add(16));
    assert_eq!(receiver.field::<f64>(copy.address, "Point", "x", 0).unwrap(), 0.0);
}

#[test]
fn test_regularize_duplicates_pointed_blocks() {
    let mut sender = Session::new();
    TypeDescriptorBuilder::new("Point")
        .atomic("x", "double")
        .atomic("y", "double")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::new("E")
        .pointer("vals", "int")
        .pointer("spot", "Point")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::ragged("Trail", "E")
        .register(sender.registry_mut())
        .unwrap();
    TypeDescriptorBuilder::new("Route")
        .pointer("trails", "Trail")
        .register(sender.registry_mut())
        .unwrap();
    let e_size = sender.registry().size_of("E").unwrap();
    let trail_size = sender.registry().size_of("Trail").unwrap();
    let trails = sender.alloc_struct("Trail", 2).unwrap();
    for (i, len) in [1usize, 3].into_iter().enumerate() {
        let trail = trails.add(i * trail_size);
        let es = sender.alloc_struct("E", len).unwrap();
        for k in 0..len {
            let e = es.add(k * e_size);
            let vals: Vec<i32> = (0..=k).map(|v| (i * 10 + v) as i32).collect();
            let vals = sender.alloc_slice(&vals).unwrap();
            sender.set_pointer(e, "E", "vals", vals).unwrap();
            let spot = sender.alloc_struct("Point", 1).unwrap();
            sender.set_field(spot, "Point", "x", 0, (i * 10 + k) as f64).unwrap();
            sender.set_pointer(e, "E", "spot", spot).unwrap();
        }
        sender.set_field(trail, "Trail", "len", 0, len as u32).unwrap();
        sender.set_pointer(trail, "Trail", "data", es).unwrap();
    }
    let route = sender.alloc_struct("Route", 1).unwrap();
    sender.set_pointer(route, "Route", "trails", trails).unwrap();

    let mut wire = MemoryTransport::new();
    sender.encode_package("Route", route, &mut wire).unwrap();
    let mut receiver = Session::new();
    let mut decoded = receiver.decode_package(&mut wire).unwrap();
    assert_eq!(receiver.regularize_all(&mut decoded.tree).unwrap(), 1);

    let root = decoded.tree.root().unwrap();
    let first = decoded.tree.find_structure(root, "trails").unwrap();
    let trail = decoded.tree.get(first).unwrap().address;
    let es = receiver.pointer(trail, "Trail", "data").unwrap();

    let mut vals = Vec::new();
    let mut spots = Vec::new();
    for k in 0..3 {
        let e = es.add(k * e_size);
        vals.push(receiver.pointer(e, "E", "vals").unwrap());
        spots.push(receiver.pointer(e, "E", "spot").unwrap());
    }
    for (k, (v, s)) in vals.iter().zip(&spots).enumerate() {
        assert_eq!(receiver.read_slice::<i32>(*v).unwrap(), vec![0], "element {}", k);
        assert_eq!(receiver.field::<f64>(*s, "Point", "x", 0).unwrap(), 0.0);
        assert_eq!(receiver.ledger().find(*v).unwrap().type_name, "int");
    }
    assert_eq!(vals.iter().collect::<HashSet<_>>().len(), 3);
    assert_eq!(spots.iter().collect::<HashSet<_>>().len(), 3);

    // Copies are independent of element 0.
    receiver.heap_mut().write(vals[2], 99i32).unwrap();
    assert_eq!(receiver.read_slice::<i32>(vals[0]).unwrap(), vec![0]);

    // Every node sits at its own address, and copied points sit at the copies.
    let addresses: HashSet<_> = decoded.tree.iter().map(|(_, n)| n.address).collect();
    assert_eq!(addresses.len(), decoded.tree.len());
    let point_id = receiver.type_id("Point").unwrap();
    let point_nodes: HashSet<_> = decoded
        .tree
        .iter()
        .filter(|(_, n)| n.type_id == point_id)
        .map(|(_, n)| n.address)
        .collect();
    assert!(spots.iter().all(|s| point_nodes.contains(s)));
}
