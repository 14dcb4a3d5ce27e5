// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Frame;
use quay_core::{Event, PowerState, Topic};

#[test]
fn frames_serialize_as_event_and_args() {
    let frame = Frame {
        event: "send command".to_string(),
        args: vec!["say hello".to_string()],
    };
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json, serde_json::json!({"event": "send command", "args": ["say hello"]}));
}

#[test]
fn inbound_frames_tolerate_missing_args() {
    let frame: Frame = serde_json::from_str(r#"{"event": "send logs"}"#).unwrap();
    assert_eq!(frame.event, "send logs");
    assert!(frame.args.is_empty());
}

#[test]
fn status_events_map_to_wire_frames() {
    let frame = Frame::from_event(&Event::status(PowerState::Running));
    assert_eq!(frame.event, "status");
    assert_eq!(frame.args, vec!["running".to_string()]);
}

#[test]
fn console_events_pass_line_through_unquoted() {
    let frame = Frame::from_event(&Event::console("Done (1.0s)!"));
    assert_eq!(frame.event, "console output");
    assert_eq!(frame.args, vec!["Done (1.0s)!".to_string()]);
}

#[test]
fn structured_payloads_are_json_encoded() {
    let usage = quay_core::ResourceUsage::default();
    let frame = Frame::from_event(&Event::stats(&usage));
    assert_eq!(frame.event, Topic::Stats.wire_name());
    let parsed: serde_json::Value = serde_json::from_str(&frame.args[0]).unwrap();
    assert_eq!(parsed["memory_bytes"], serde_json::json!(0));
}
