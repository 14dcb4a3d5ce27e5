// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use quay_core::Scalar;

fn replacement(matcher: &str, value: impl Into<Scalar>) -> FileReplacement {
    FileReplacement { matcher: matcher.to_string(), if_value: None, value: value.into() }
}

#[test]
fn patches_nested_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "settings:\n  query:\n    port: 25565\n  motd: hello\n").unwrap();

    apply(&path, &[replacement("settings.query.port", "7777")], &TemplateContext::default())
        .unwrap();

    let value: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["settings"]["query"]["port"], serde_yaml::Value::from(7777));
    assert_eq!(value["settings"]["motd"], serde_yaml::Value::from("hello"));
}

#[test]
fn numeric_kind_survives_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "max-players: 20\n").unwrap();

    apply(&path, &[replacement("max-players", "64")], &TemplateContext::default()).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("max-players: 64"), "kind lost: {raw}");
}

#[test]
fn missing_file_starts_from_empty_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.yml");

    apply(&path, &[replacement("server.name", "lobby")], &TemplateContext::default()).unwrap();

    let value: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["server"]["name"], serde_yaml::Value::from("lobby"));
}

#[test]
fn applying_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "a: 1\nb:\n  c: true\n").unwrap();
    let patches = vec![replacement("a", "5"), replacement("b.c", "false")];

    apply(&path, &patches, &TemplateContext::default()).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();
    apply(&path, &patches, &TemplateContext::default()).unwrap();
    assert_eq!(first, std::fs::read_to_string(&path).unwrap());
}
