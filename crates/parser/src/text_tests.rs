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

#[test]
fn replaces_matching_lines_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.cfg");
    std::fs::write(&path, "port 1234\nmap de_dust2\n").unwrap();

    apply(&path, &[replacement("port", "port 25565")], &TemplateContext::default()).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "port 25565\nmap de_dust2\n");
}

#[test]
fn if_value_guard_limits_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.cfg");
    std::fs::write(&path, "mode=dev\nmode=prod\n").unwrap();

    let guarded = FileReplacement {
        matcher: "mode".to_string(),
        if_value: Some("dev".to_string()),
        value: Scalar::String("mode=staging".to_string()),
    };
    apply(&path, &[guarded], &TemplateContext::default()).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "mode=staging\nmode=prod\n");
}

#[test]
fn missing_file_is_created_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.cfg");

    apply(&path, &[replacement("never", "matched")], &TemplateContext::default()).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
}
