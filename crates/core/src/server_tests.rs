// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn base_config() -> ServerConfiguration {
    serde_json::from_value(json!({
        "uuid": "df3b4bd0-8c92-4e94-9316-2a3f9e92e680",
        "invocation": "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar server.jar",
        "environment": {"SERVER_JARFILE": "server.jar", "MAX_PLAYERS": 20},
        "build": {
            "memory_limit": 1024,
            "swap": 0,
            "io_weight": 500,
            "cpu_limit": 200,
            "disk_space": 2048,
            "threads": ""
        },
        "container": {"image": "ghcr.io/parkervcp/yolks:java_17"},
        "allocations": {
            "default": {"ip": "172.18.0.1", "port": 25565},
            "mappings": {"172.18.0.1": [25565, 25566]}
        }
    }))
    .unwrap()
}

#[test]
fn allocations_iterate_default_first() {
    let config = base_config();
    let pairs: Vec<(&str, u16)> = config.allocations.iter().collect();
    assert_eq!(pairs[0], ("172.18.0.1", 25565));
    assert!(pairs.contains(&("172.18.0.1", 25566)));
}

#[test]
fn build_limit_conversions() {
    let build = base_config().build;
    assert_eq!(build.memory_bytes(), 1024 * 1024 * 1024);
    assert_eq!(build.disk_bytes(), 2048 * 1024 * 1024);
    assert_eq!(build.memory_swap_bytes(), 1024 * 1024 * 1024);

    let unlimited_swap = BuildLimits { swap: -1, ..build };
    assert_eq!(unlimited_swap.memory_swap_bytes(), -1);
}

#[test]
fn structural_merge_preserves_untouched_fields() {
    let mut config = base_config();
    config.merge_update(&json!({"build": {"memory_limit": 2048}})).unwrap();
    assert_eq!(config.build.memory_limit, 2048);
    assert_eq!(config.build.disk_space, 2048);
    assert_eq!(config.invocation, "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar server.jar");
}

#[test]
fn environment_replaces_wholesale_when_non_empty() {
    let mut config = base_config();
    config
        .merge_update(&json!({"environment": {"SERVER_JARFILE": "paper.jar"}}))
        .unwrap();
    assert_eq!(config.environment.len(), 1);
    assert_eq!(config.environment["SERVER_JARFILE"], Scalar::String("paper.jar".into()));
}

#[test]
fn empty_environment_block_keeps_existing() {
    let mut config = base_config();
    config.merge_update(&json!({"environment": {}})).unwrap();
    assert_eq!(config.environment.len(), 2);
}

#[test]
fn mappings_replace_wholesale() {
    let mut config = base_config();
    config
        .merge_update(&json!({"allocations": {"mappings": {"10.0.0.2": [7777]}}}))
        .unwrap();
    assert_eq!(config.allocations.mappings.len(), 1);
    assert_eq!(config.allocations.mappings["10.0.0.2"], vec![7777]);
    // default allocation untouched by a mappings-only update
    assert_eq!(config.allocations.default.port, 25565);
}

#[test]
fn booleans_read_explicitly() {
    let mut config = base_config();
    assert!(!config.suspended);
    config.merge_update(&json!({"suspended": true})).unwrap();
    assert!(config.suspended);

    config
        .merge_update(&json!({"container": {"oom_disabled": true}}))
        .unwrap();
    assert!(config.container.oom_disabled);
    assert_eq!(config.container.image, "ghcr.io/parkervcp/yolks:java_17");
}

#[test]
fn cpu_zero_means_unlimited_and_is_applied() {
    let mut config = base_config();
    config.merge_update(&json!({"build": {"cpu_limit": 0}})).unwrap();
    assert_eq!(config.build.cpu_limit, 0);
}

#[test]
fn non_object_update_is_rejected() {
    let mut config = base_config();
    let err = config.merge_update(&json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, MergeError::NotAnObject));
}

#[test]
fn crash_detection_defaults_on() {
    let config: ServerConfiguration = serde_json::from_value(json!({"uuid": "x"})).unwrap();
    assert!(config.crash_detection_enabled);
}
