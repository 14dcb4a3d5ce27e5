// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_file_reads_empty_and_offline() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("states.json"));
    assert!(store.all().is_empty());
    assert_eq!(store.get("nope"), PowerState::Offline);
}

#[test]
fn set_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("states.json"));
    store.set("abc", PowerState::Running);
    store.set("def", PowerState::Starting);

    assert_eq!(store.get("abc"), PowerState::Running);
    assert_eq!(store.get("def"), PowerState::Starting);
}

#[test]
fn file_format_matches_recovery_expectations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("states.json");
    let store = StateStore::new(&path);
    store.set("abc", PowerState::Running);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw, r#"{"abc":"running"}"#);
}

#[test]
fn corrupt_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("states.json");
    std::fs::write(&path, "{{{{").unwrap();

    let store = StateStore::new(&path);
    assert!(store.all().is_empty());
    // and a write recovers the file
    store.set("abc", PowerState::Offline);
    assert_eq!(store.get("abc"), PowerState::Offline);
}

#[test]
fn remove_deletes_the_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("states.json"));
    store.set("abc", PowerState::Running);
    store.remove("abc");
    assert_eq!(store.get("abc"), PowerState::Offline);
}
