// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn stop_descriptor_wire_format() {
    let cmd: StopDescriptor = serde_json::from_str(r#"{"kind":"command","value":"stop"}"#).unwrap();
    assert_eq!(cmd, StopDescriptor::Command { value: "stop".into() });

    let sig: StopDescriptor =
        serde_json::from_str(r#"{"kind":"signal","value":"SIGTERM"}"#).unwrap();
    assert_eq!(sig, StopDescriptor::Signal { value: "SIGTERM".into() });

    let native: StopDescriptor = serde_json::from_str(r#"{"kind":"stop"}"#).unwrap();
    assert_eq!(native, StopDescriptor::Stop);
}

#[parameterized(
    literal_hit = { "Done (5.123s)! For help, type \"help\"", true },
    literal_miss = { "Starting minecraft server", false },
)]
fn literal_matcher(line: &str, expected: bool) {
    let matchers = ConsoleMatchers::parse(&["Done (".to_string()]).unwrap();
    assert_eq!(matchers.matches(line), expected);
}

#[test]
fn regex_matcher_uses_prefix() {
    let matchers =
        ConsoleMatchers::parse(&[r"regex:^Done \([0-9.]+s\)!".to_string()]).unwrap();
    assert!(matchers.matches("Done (5.123s)! For help, type \"help\""));
    assert!(!matchers.matches("prefix Done (5.123s)!"));
}

#[test]
fn any_matcher_counts() {
    let matchers = ConsoleMatchers::parse(&[
        "listening on".to_string(),
        r"regex:^ready$".to_string(),
    ])
    .unwrap();
    assert!(matchers.matches("server listening on 0.0.0.0:25565"));
    assert!(matchers.matches("ready"));
    assert!(!matchers.matches("almost ready"));
}

#[test]
fn invalid_regex_is_rejected() {
    assert!(ConsoleMatchers::parse(&["regex:([unclosed".to_string()]).is_err());
}

#[test]
fn matchers_round_trip_raw_strings() {
    let raw = vec!["Done (".to_string(), r"regex:^Done \([0-9.]+s\)!".to_string()];
    let matchers = ConsoleMatchers::parse(&raw).unwrap();
    let json = serde_json::to_value(&matchers).unwrap();
    assert_eq!(json, serde_json::json!(raw));

    let back: ConsoleMatchers = serde_json::from_value(json).unwrap();
    assert_eq!(back, matchers);
}

#[test]
fn configuration_file_deserializes() {
    let parsed: ConfigurationFile = serde_json::from_str(
        r#"{
            "file": "server.properties",
            "parser": "properties",
            "replace": [
                {"match": "server-port", "value": "{{server.allocations.default.port}}"},
                {"match": "query.port", "value": 25565}
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(parsed.parser, ConfigurationParser::Properties);
    assert_eq!(parsed.replace.len(), 2);
    assert_eq!(parsed.replace[1].value, Scalar::Int(25565));
}

#[test]
fn process_configuration_defaults() {
    let parsed: ProcessConfiguration = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed.stop, StopDescriptor::Stop);
    assert!(parsed.startup.done.is_empty());
    assert!(parsed.configs.is_empty());
}
