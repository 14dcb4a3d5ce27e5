// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::spec::{NodeSettings, SpecMount};
use std::path::PathBuf;

fn spec() -> ContainerSpec {
    ContainerSpec {
        id: "abc-123".to_string(),
        image: "ghcr.io/yolks:java_17".to_string(),
        user: "988:988".to_string(),
        env: vec!["TZ=UTC".to_string(), "SERVER_PORT=25565".to_string()],
        data_dir: PathBuf::from("/data/volumes/abc-123"),
        mounts: vec![SpecMount {
            source: "/srv/shared/maps".to_string(),
            target: "/maps".to_string(),
            read_only: true,
        }],
        allocations: vec![("0.0.0.0".to_string(), 25565)],
        resources: SpecResources {
            memory: 1024 * 1024 * 1024,
            memory_reservation: 900 * 1024 * 1024,
            memory_swap: -1,
            cpu_quota: 150_000,
            cpu_period: 100_000,
            cpu_shares: 1024,
            io_weight: 500,
            cpuset: None,
            oom_kill_disable: false,
            pids_limit: 256,
        },
        tmpfs_size_mib: NodeSettings::default().tmpfs_size,
        network_mode: "quay0".to_string(),
        labels: vec![("Service".to_string(), "Quay".to_string())],
        command: Vec::new(),
        privileged: false,
        readonly_rootfs: true,
    }
}

#[test]
fn ports_bind_both_protocols() {
    let config = container_config(&spec());
    let bindings = config.host_config.unwrap().port_bindings.unwrap();
    for proto in ["tcp", "udp"] {
        let list = bindings[&format!("25565/{proto}")].as_ref().unwrap();
        assert_eq!(list[0].host_ip.as_deref(), Some("0.0.0.0"));
        assert_eq!(list[0].host_port.as_deref(), Some("25565"));
    }
    assert!(config.exposed_ports.unwrap().contains_key("25565/udp"));
}

#[test]
fn data_dir_is_first_bind() {
    let config = container_config(&spec());
    let binds = config.host_config.unwrap().binds.unwrap();
    assert_eq!(binds[0], "/data/volumes/abc-123:/home/container");
    assert_eq!(binds[1], "/srv/shared/maps:/maps:ro");
}

#[test]
fn security_hardening_is_applied() {
    let host = container_config(&spec()).host_config.unwrap();
    assert_eq!(host.readonly_rootfs, Some(true));
    assert_eq!(host.security_opt.unwrap(), vec!["no-new-privileges".to_string()]);
    let caps = host.cap_drop.unwrap();
    assert!(caps.contains(&"SETPCAP".to_string()));
    assert!(caps.contains(&"NET_RAW".to_string()));
    assert_eq!(caps.len(), 10);
}

#[test]
fn log_driver_is_capped() {
    let host = container_config(&spec()).host_config.unwrap();
    let log = host.log_config.unwrap();
    assert_eq!(log.typ.as_deref(), Some("json-file"));
    let config = log.config.unwrap();
    assert_eq!(config["max-size"], "5m");
    assert_eq!(config["max-file"], "1");
}

#[test]
fn tty_and_stdio_are_attached() {
    let config = container_config(&spec());
    assert_eq!(config.tty, Some(true));
    assert_eq!(config.open_stdin, Some(true));
    assert_eq!(config.hostname.as_deref(), Some("abc-123"));
    assert_eq!(config.user.as_deref(), Some("988:988"));
}

#[test]
fn unlimited_swap_passes_negative_one() {
    let host = container_config(&spec()).host_config.unwrap();
    assert_eq!(host.memory_swap, Some(-1));
}

#[test]
fn zero_resources_are_omitted() {
    let mut unlimited = spec();
    unlimited.resources = SpecResources {
        cpu_shares: 1024,
        cpu_period: 100_000,
        cpu_quota: -1,
        io_weight: 500,
        ..Default::default()
    };
    let host = container_config(&unlimited).host_config.unwrap();
    assert_eq!(host.memory, None);
    assert_eq!(host.memory_swap, None);
    assert_eq!(host.cpu_quota, None);
    assert_eq!(host.pids_limit, None);
}

#[test]
fn update_options_mirror_resources() {
    let options = update_options(&spec().resources);
    assert_eq!(options.memory, Some(1024 * 1024 * 1024));
    assert_eq!(options.cpu_quota, Some(150_000));
    assert_eq!(options.blkio_weight, Some(500));
}
