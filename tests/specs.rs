// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level integration tests: flows that cross crate
//! boundaries (safe filesystem + archives, the config rewrite
//! pipeline with placeholder resolution, and state persistence).

use quay_core::{ConfigurationFile, PowerState};
use quay_engine::StateStore;
use quay_fs::Filesystem;
use quay_parser::TemplateContext;
use std::time::Duration;

fn filesystem(dir: &std::path::Path, quota: i64) -> Filesystem {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(dir).unwrap();
    Filesystem::new(dir, quota, Duration::from_secs(60), meta.uid(), meta.gid()).unwrap()
}

#[test]
fn traversal_attempts_never_leave_the_instance_root() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let fs = filesystem(dir.path(), 0);

    // lexical climbs clamp to the root
    let err = fs.write_file("../../etc/passwd", b"root::0:0::/:/bin/sh");
    assert!(err.is_ok(), "clamped write stays inside the root");
    assert!(fs.root().join("etc/passwd").exists());

    // symlink escapes are refused outright
    std::os::unix::fs::symlink(outside.path(), fs.root().join("exit")).unwrap();
    let err = fs.write_file("exit/passwd", b"nope").unwrap_err();
    assert!(err.is_path_escape());
    assert!(!outside.path().join("passwd").exists());
}

#[test]
fn config_rewrite_pipeline_resolves_allocation_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let fs = filesystem(dir.path(), 0);
    fs.write_file("server.properties", b"server-ip=\nserver-port=25577\nmotd=A Server\n")
        .unwrap();
    fs.write_file("config.yml", b"listener:\n  port: 8080\n  bind: 0.0.0.0\n").unwrap();

    let ctx = TemplateContext::new(
        serde_json::json!({"api": {"host": "0.0.0.0"}}),
        serde_json::json!({
            "build": {"env": {"MAX_PLAYERS": 64}},
            "allocations": {"default": {"ip": "172.18.0.2", "port": 25565}}
        }),
    );

    let properties: ConfigurationFile = serde_json::from_value(serde_json::json!({
        "file": "server.properties",
        "parser": "properties",
        "replace": [
            {"match": "server-ip", "value": "{{server.allocations.default.ip}}"},
            {"match": "server-port", "value": "{{server.allocations.default.port}}"},
            {"match": "max-players", "value": "{{server.build.env.MAX_PLAYERS}}"}
        ]
    }))
    .unwrap();
    let yaml: ConfigurationFile = serde_json::from_value(serde_json::json!({
        "file": "config.yml",
        "parser": "yaml",
        "replace": [
            {"match": "listener.port", "value": "{{server.allocations.default.port}}"}
        ]
    }))
    .unwrap();

    for config in [&properties, &yaml] {
        let path = fs.safe_path(&config.file).unwrap();
        quay_parser::apply(&path, config, &ctx).unwrap();
    }

    let rewritten = String::from_utf8(fs.read_file("server.properties").unwrap()).unwrap();
    assert!(rewritten.contains("server-ip=172.18.0.2"));
    assert!(rewritten.contains("server-port=25565"));
    assert!(rewritten.contains("max-players=64"));
    assert!(rewritten.contains("motd=A Server"));

    let yaml_raw = String::from_utf8(fs.read_file("config.yml").unwrap()).unwrap();
    let yaml_out: serde_yaml::Value = serde_yaml::from_str(&yaml_raw).unwrap();
    assert_eq!(yaml_out["listener"]["port"], serde_yaml::Value::from(25565));
    assert_eq!(yaml_out["listener"]["bind"], serde_yaml::Value::from("0.0.0.0"));
}

#[test]
fn archives_round_trip_through_backup_and_extract() {
    let source_dir = tempfile::tempdir().unwrap();
    let source = filesystem(source_dir.path(), 0);
    source.write_file("world/level.dat", b"terrain").unwrap();
    source.write_file(".pteroignore", b"*.log\n").unwrap();
    source.write_file("logs/latest.log", b"noise").unwrap();

    let archive = source.archive_to(Vec::new(), None).unwrap();

    let dest_dir = tempfile::tempdir().unwrap();
    let dest = filesystem(dest_dir.path(), 0);
    dest.extract_archive(archive.as_slice()).unwrap();
    assert_eq!(dest.read_file("world/level.dat").unwrap(), b"terrain");
    assert!(!dest.root().join("logs").exists());
}

#[test]
fn quota_blocks_decompression_bombs_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    // 10 MiB quota with ~9 MiB already used
    let fs = filesystem(dir.path(), 10 * 1024 * 1024);
    fs.write_file("existing.bin", &vec![0u8; 9 * 1024 * 1024]).unwrap();

    // an archive declaring 5 MiB of payload must be refused
    let payload = vec![0u8; 5 * 1024 * 1024];
    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
        Vec::new(),
        flate2::Compression::fast(),
    ));
    let mut header = tar::Header::new_gnu();
    header.set_size(payload.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "payload.bin", payload.as_slice()).unwrap();
    let archive = builder.into_inner().unwrap().finish().unwrap();
    fs.write_file("upload.tar.gz", &archive).unwrap();

    let err = fs.decompress_file("upload.tar.gz").unwrap_err();
    assert!(err.is_quota());
    assert!(!fs.root().join("payload.bin").exists());
}

#[test]
fn power_states_survive_a_daemon_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("states.json");

    {
        let store = StateStore::new(&path);
        store.set("a-1", PowerState::Running);
        store.set("b-2", PowerState::Stopping);
    }

    // a fresh store (as after a crash) reads the same map
    let store = StateStore::new(&path);
    assert_eq!(store.get("a-1"), PowerState::Running);
    assert_eq!(store.get("b-2"), PowerState::Stopping);
    assert_eq!(store.get("missing"), PowerState::Offline);
}
