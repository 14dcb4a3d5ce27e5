// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use quay_core::Scalar;

fn replacement(matcher: &str, value: &str) -> FileReplacement {
    FileReplacement {
        matcher: matcher.to_string(),
        if_value: None,
        value: Scalar::String(value.to_string()),
    }
}

fn apply_to(initial: &str, patches: &[FileReplacement]) -> String {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    std::fs::write(&path, initial).unwrap();
    apply(&path, patches, &TemplateContext::default()).unwrap();
    std::fs::read_to_string(&path).unwrap()
}

#[test]
fn dotted_match_addresses_section_and_key() {
    let output = apply_to(
        "[ServerSettings]\nMaxPlayers=10\n",
        &[replacement("ServerSettings.MaxPlayers", "70")],
    );
    let doc = ini::Ini::load_from_str(&output).unwrap();
    assert_eq!(doc.section(Some("ServerSettings")).unwrap().get("MaxPlayers"), Some("70"));
}

#[test]
fn bare_token_targets_default_section() {
    let output = apply_to("port=1000\n", &[replacement("port", "25565")]);
    let doc = ini::Ini::load_from_str(&output).unwrap();
    assert_eq!(doc.general_section().get("port"), Some("25565"));
}

#[test]
fn missing_section_and_key_are_created() {
    let output = apply_to("", &[replacement("Query.Enabled", "true")]);
    let doc = ini::Ini::load_from_str(&output).unwrap();
    assert_eq!(doc.section(Some("Query")).unwrap().get("Enabled"), Some("true"));
}

#[test]
fn remaining_dots_stay_in_the_key() {
    let output = apply_to("", &[replacement("server.query.port", "7777")]);
    let doc = ini::Ini::load_from_str(&output).unwrap();
    assert_eq!(doc.section(Some("server")).unwrap().get("query.port"), Some("7777"));
}

#[test]
fn applying_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    std::fs::write(&path, "[a]\nx=1\n").unwrap();
    let patches = vec![replacement("a.x", "2"), replacement("b.y", "3")];

    apply(&path, &patches, &TemplateContext::default()).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();
    apply(&path, &patches, &TemplateContext::default()).unwrap();
    assert_eq!(first, std::fs::read_to_string(&path).unwrap());
}
