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

//! Nesting depth is bounded on both sides and failures leave no residue.

use structwire::{Address, MarshalConfig, MarshalError, MemoryTransport, Session, TypeDescriptorBuilder};

fn chain(length: usize, config: MarshalConfig) -> (Session, Address) {
    let mut session = Session::with_config(config);
    TypeDescriptorBuilder::new("Link")
        .atomic("depth", "int")
        .pointer("next", "Link")
        .register(session.registry_mut())
        .unwrap();
    let mut next = Address::NULL;
    for depth in (0..length).rev() {
        let link = session.alloc_struct("Link", 1).unwrap();
        session.set_field(link, "Link", "depth", 0, depth as i32).unwrap();
        session.set_pointer(link, "Link", "next", next).unwrap();
        next = link;
    }
    (session, next)
}

#[test]
fn test_chain_within_limit() {
    let (mut sender, head) = chain(30, MarshalConfig::new());
    let mut wire = MemoryTransport::new();
    let report = sender.encode("Link", head, &mut wire).unwrap();
    assert_eq!(report.instances, 30);

    let mut receiver = Session::new();
    let desc = sender.registry().find("Link").cloned().unwrap();
    receiver.registry_mut().insert(desc).unwrap();
    let decoded = receiver.decode("Link", &mut wire).unwrap();
    assert_eq!(decoded.tree.len(), 30);
    let deepest = decoded.tree.iter().map(|(id, _)| decoded.tree.depth(id)).max();
    assert_eq!(deepest, Some(29));
}

#[test]
fn test_encoder_stops_past_limit() {
    let (mut sender, head) = chain(31, MarshalConfig::new());
    let mut wire = MemoryTransport::new();
    let failure = sender.encode("Link", head, &mut wire).unwrap_err();
    assert!(matches!(
        failure.error,
        MarshalError::RecursionLimitExceeded { depth: 31, limit: 30 }
    ));
    assert!(failure.error.is_fatal());
    // Nothing was allocated by the encoder.
    assert_eq!(sender.ledger().len(), 31);
}

#[test]
fn test_decoder_stops_past_limit_without_leaks() {
    let (mut sender, head) = chain(40, MarshalConfig::new().max_depth(64));
    let mut wire = MemoryTransport::new();
    sender.encode("Link", head, &mut wire).unwrap();

    let mut receiver = Session::with_config(MarshalConfig::new().max_depth(12));
    let desc = sender.registry().find("Link").cloned().unwrap();
    receiver.registry_mut().insert(desc).unwrap();
    let kept = receiver.alloc_struct("Link", 1).unwrap();

    let failure = receiver.decode("Link", &mut wire).unwrap_err();
    assert!(matches!(
        failure.error,
        MarshalError::RecursionLimitExceeded { depth: 13, limit: 12 }
    ));
    assert_eq!(failure.trace.len(), 13);
    assert_eq!(failure.trace.last().map(String::as_str), Some("Link"));

    // Only the allocation made before the call survives.
    assert_eq!(receiver.ledger().len(), 1);
    assert_eq!(receiver.heap().live_blocks(), 1);
    assert!(receiver.ledger().find(kept).is_ok());
}

#[test]
fn test_truncated_stream_rolls_back() {
    let (mut sender, head) = chain(5, MarshalConfig::new());
    let mut wire = MemoryTransport::new();
    sender.encode("Link", head, &mut wire).unwrap();
    let mut bytes = wire.into_inner();
    bytes.truncate(bytes.len() - 6);

    let mut receiver = Session::new();
    let desc = sender.registry().find("Link").cloned().unwrap();
    receiver.registry_mut().insert(desc).unwrap();
    let failure = receiver
        .decode("Link", &mut MemoryTransport::from_bytes(bytes))
        .unwrap_err();
    assert!(matches!(failure.error, MarshalError::WireFailure(_)));
    assert!(failure.location().starts_with("Link/next[0]/next[0]"));
    assert_eq!(receiver.ledger().len(), 0);
    assert_eq!(receiver.heap().live_blocks(), 0);
}
