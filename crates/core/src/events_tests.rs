// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    console = { Topic::Console, "console output" },
    status = { Topic::Status, "status" },
    stats = { Topic::Stats, "stats" },
    install_output = { Topic::InstallOutput, "install output" },
    daemon_message = { Topic::DaemonMessage, "daemon message" },
    backup = { Topic::BackupCompleted, "backup completed" },
)]
fn wire_names(topic: Topic, expected: &str) {
    assert_eq!(topic.wire_name(), expected);
}

#[test]
fn all_contains_every_topic_once() {
    let mut seen = std::collections::HashSet::new();
    for topic in Topic::ALL {
        assert!(seen.insert(topic), "duplicate topic {topic:?}");
    }
    assert_eq!(seen.len(), 12);
}

#[test]
fn status_event_carries_state_string() {
    let event = Event::status(PowerState::Starting);
    assert_eq!(event.topic, Topic::Status);
    assert_eq!(event.data, serde_json::json!("starting"));
}

#[test]
fn backup_completed_payload_shape() {
    let event = Event::backup_completed("b-1", true, "da39a3ee", 1024);
    assert_eq!(event.data["is_successful"], serde_json::json!(true));
    assert_eq!(event.data["checksum_type"], serde_json::json!("sha1"));
    assert_eq!(event.data["file_size"], serde_json::json!(1024));
}

#[test]
fn stats_event_embeds_usage() {
    let usage = ResourceUsage { memory_bytes: 42, ..Default::default() };
    let event = Event::stats(&usage);
    assert_eq!(event.data["memory_bytes"], serde_json::json!(42));
}
