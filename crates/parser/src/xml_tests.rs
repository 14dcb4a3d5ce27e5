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
fn sets_text_content_by_element_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.xml");
    std::fs::write(&path, "<server><network><port>1000</port></network></server>").unwrap();

    apply(&path, &[replacement("network.port", "25565")], &TemplateContext::default()).unwrap();

    let root =
        xmltree::Element::parse(std::fs::read_to_string(&path).unwrap().as_bytes()).unwrap();
    let port = root.get_child("network").unwrap().get_child("port").unwrap();
    assert_eq!(port.get_text().unwrap(), "25565");
}

#[test]
fn missing_elements_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.xml");
    std::fs::write(&path, "<server/>").unwrap();

    apply(&path, &[replacement("query.enabled", "true")], &TemplateContext::default()).unwrap();

    let root =
        xmltree::Element::parse(std::fs::read_to_string(&path).unwrap().as_bytes()).unwrap();
    let enabled = root.get_child("query").unwrap().get_child("enabled").unwrap();
    assert_eq!(enabled.get_text().unwrap(), "true");
}

#[test]
fn missing_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never-created.xml");

    apply(&path, &[replacement("a.b", "c")], &TemplateContext::default()).unwrap();
    assert!(!path.exists());
}

#[test]
fn malformed_xml_carries_file_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xml");
    std::fs::write(&path, "<unclosed>").unwrap();

    let err = apply(&path, &[replacement("a", "b")], &TemplateContext::default()).unwrap_err();
    assert!(err.to_string().contains("broken.xml"));
}
