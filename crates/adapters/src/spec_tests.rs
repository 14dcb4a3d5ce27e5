// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn config() -> ServerConfiguration {
    serde_json::from_value(json!({
        "uuid": "f6f3196b",
        "invocation": "./start.sh",
        "environment": {
            "MAX_PLAYERS": 20,
            "SERVER_IP": "6.6.6.6",
            "TZ": "Mars/Olympus"
        },
        "build": {
            "memory_limit": 1024,
            "swap": 512,
            "io_weight": 500,
            "cpu_limit": 150,
            "disk_space": 1024,
            "threads": "0,2-3"
        },
        "container": {"image": "ghcr.io/yolks:java_17", "oom_disabled": true},
        "allocations": {
            "default": {"ip": "0.0.0.0", "port": 25565},
            "mappings": {"0.0.0.0": [25565, 25570]}
        },
        "mounts": [
            {"source": "/srv/shared/maps", "target": "/home/container/maps", "read_only": true},
            {"source": "/etc/shadow", "target": "/secrets", "read_only": false}
        ]
    }))
    .unwrap()
}

fn node() -> NodeSettings {
    NodeSettings {
        uid: 999,
        gid: 999,
        timezone: "Europe/Berlin".to_string(),
        allowed_mounts: vec!["/srv/shared".to_string()],
        ..NodeSettings::default()
    }
}

#[test]
fn reserved_env_cannot_be_overridden() {
    let spec = ContainerSpec::from_configuration(&config(), Path::new("/data/f6f3196b"), &node());

    // reserved names come first and hold daemon values
    assert_eq!(spec.env[0], "TZ=Europe/Berlin");
    assert_eq!(spec.env[1], "STARTUP=./start.sh");
    assert_eq!(spec.env[2], "SERVER_MEMORY=1024");
    assert_eq!(spec.env[3], "SERVER_IP=0.0.0.0");
    assert_eq!(spec.env[4], "SERVER_PORT=25565");

    // the instance's attempted overrides are dropped entirely
    assert!(!spec.env.iter().any(|e| e == "SERVER_IP=6.6.6.6"));
    assert!(!spec.env.iter().any(|e| e == "TZ=Mars/Olympus"));
    assert!(spec.env.contains(&"MAX_PLAYERS=20".to_string()));
}

#[test]
fn mount_whitelist_is_prefix_based() {
    let spec = ContainerSpec::from_configuration(&config(), Path::new("/data/f6f3196b"), &node());
    let sources: Vec<&str> = spec.mounts.iter().map(|m| m.source.as_str()).collect();
    assert!(sources.contains(&"/srv/shared/maps"));
    assert!(!sources.contains(&"/etc/shadow"));
}

#[test]
fn allocations_cover_all_pairs() {
    let spec = ContainerSpec::from_configuration(&config(), Path::new("/data/f6f3196b"), &node());
    assert!(spec.allocations.contains(&("0.0.0.0".to_string(), 25565)));
    assert!(spec.allocations.contains(&("0.0.0.0".to_string(), 25570)));
}

#[parameterized(
    small = { 1024, 1.15 },
    at_first_threshold = { 2048, 1.15 },
    mid = { 3000, 1.10 },
    at_second_threshold = { 4096, 1.10 },
    large = { 8192, 1.05 },
)]
fn overhead_multiplier_table(limit_mib: u64, expected: f64) {
    assert_eq!(NodeSettings::default().overhead_multiplier(limit_mib), expected);
}

#[test]
fn overhead_table_is_overridable() {
    let node = NodeSettings {
        overhead: BTreeMap::from([(1024, 1.5)]),
        overhead_default: 1.0,
        ..NodeSettings::default()
    };
    assert_eq!(node.overhead_multiplier(512), 1.5);
    assert_eq!(node.overhead_multiplier(4096), 1.0);
}

#[test]
fn resource_translation() {
    let spec = ContainerSpec::from_configuration(&config(), Path::new("/data/f6f3196b"), &node());
    let resources = &spec.resources;

    // 1024 MiB * 1.15 overhead
    assert_eq!(resources.memory, (1024.0f64 * 1.15) as i64 * 1024 * 1024);
    assert_eq!(resources.memory_reservation, 1024 * 1024 * 1024);
    assert_eq!(resources.memory_swap, (1024 + 512) * 1024 * 1024);
    assert_eq!(resources.cpu_quota, 150_000);
    assert_eq!(resources.cpu_period, 100_000);
    assert_eq!(resources.cpu_shares, 1024);
    assert_eq!(resources.cpuset.as_deref(), Some("0,2-3"));
    assert!(resources.oom_kill_disable);
    assert_eq!(resources.pids_limit, 512);
}

#[test]
fn zero_limits_mean_unlimited() {
    let mut cfg = config();
    cfg.build.memory_limit = 0;
    cfg.build.cpu_limit = 0;
    cfg.build.swap = -1;

    let spec = ContainerSpec::from_configuration(&cfg, Path::new("/data/x"), &node());
    assert_eq!(spec.resources.memory, 0);
    assert_eq!(spec.resources.memory_swap, -1);
    assert_eq!(spec.resources.cpu_quota, -1);
}

#[test]
fn user_and_identity_come_from_node_settings() {
    let spec = ContainerSpec::from_configuration(&config(), Path::new("/data/f6f3196b"), &node());
    assert_eq!(spec.user, "999:999");
    assert_eq!(spec.id, "f6f3196b");
    assert_eq!(spec.network_mode, "quay0");
}
