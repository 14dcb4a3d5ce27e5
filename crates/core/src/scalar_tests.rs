// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    string = { r#""hello""#, Scalar::String("hello".into()) },
    int = { "42", Scalar::Int(42) },
    negative = { "-7", Scalar::Int(-7) },
    float = { "2.5", Scalar::Float(2.5) },
    boolean = { "true", Scalar::Bool(true) },
)]
fn deserializes_untagged(json: &str, expected: Scalar) {
    let parsed: Scalar = serde_json::from_str(json).unwrap();
    assert_eq!(parsed, expected);
}

#[parameterized(
    string = { Scalar::String("25565".into()), "25565" },
    int = { Scalar::Int(25565), "25565" },
    float = { Scalar::Float(1.15), "1.15" },
    truthy = { Scalar::Bool(true), "true" },
    falsy = { Scalar::Bool(false), "false" },
)]
fn canonical_string_form(value: Scalar, expected: &str) {
    assert_eq!(value.to_string(), expected);
}

#[test]
fn json_round_trip_preserves_kind() {
    let int = Scalar::Int(512);
    assert!(int.to_json().is_i64());

    let text = Scalar::String("512".into());
    assert!(text.to_json().is_string());

    let flag = Scalar::Bool(false);
    assert!(flag.to_json().is_boolean());
}
