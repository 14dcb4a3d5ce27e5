// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::control_plane::ControlPlane;
use crate::server::{EngineMessage, Server};
use crate::settings::{CrashSettings, EngineSettings, ThrottleSettings};
use async_trait::async_trait;
use parking_lot::Mutex;
use quay_adapters::FakeRuntime;
use quay_remote::{BackupUploadUrls, InstallationScript, RawServerData, RemoteError};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Control plane double backed by in-memory maps.
#[derive(Default)]
pub(crate) struct FakeControlPlane {
    pub servers: Mutex<HashMap<String, RawServerData>>,
    pub gone: Mutex<HashSet<String>>,
    pub install_reports: Mutex<Vec<(String, bool)>>,
    pub backup_reports: Mutex<Vec<(String, bool, Option<String>)>>,
    pub uploaded_parts: Mutex<Vec<(String, usize)>>,
    pub upload_urls: Mutex<Option<BackupUploadUrls>>,
}

impl FakeControlPlane {
    pub fn with_server(data: RawServerData) -> Arc<Self> {
        let fake = Self::default();
        fake.servers.lock().insert(data.uuid.clone(), data);
        Arc::new(fake)
    }

    pub fn mark_gone(&self, uuid: &str) {
        self.gone.lock().insert(uuid.to_string());
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_servers(&self) -> Result<Vec<RawServerData>, RemoteError> {
        Ok(self.servers.lock().values().cloned().collect())
    }

    async fn server_configuration(&self, uuid: &str) -> Result<RawServerData, RemoteError> {
        if self.gone.lock().contains(uuid) {
            return Err(RemoteError::InstanceNotFound);
        }
        self.servers
            .lock()
            .get(uuid)
            .cloned()
            .ok_or(RemoteError::InstanceNotFound)
    }

    async fn install_script(&self, _uuid: &str) -> Result<InstallationScript, RemoteError> {
        Ok(InstallationScript {
            container_image: "ghcr.io/installers/alpine:latest".to_string(),
            entrypoint: "ash".to_string(),
            script: "#!/bin/ash\necho installing\r\n".to_string(),
        })
    }

    async fn report_install_status(
        &self,
        uuid: &str,
        successful: bool,
    ) -> Result<(), RemoteError> {
        self.install_reports.lock().push((uuid.to_string(), successful));
        Ok(())
    }

    async fn backup_upload_urls(
        &self,
        _backup_id: &str,
        _size: u64,
    ) -> Result<BackupUploadUrls, RemoteError> {
        Ok(self.upload_urls.lock().clone().unwrap_or(BackupUploadUrls {
            upload_id: "upload-1".to_string(),
            part_urls: vec![
                "https://storage.test/part-1".to_string(),
                "https://storage.test/part-2".to_string(),
            ],
            part_size: 5 * 1024 * 1024,
        }))
    }

    async fn report_backup_status(
        &self,
        backup_id: &str,
        _checksum: &str,
        _size: u64,
        successful: bool,
        upload_id: Option<String>,
    ) -> Result<(), RemoteError> {
        self.backup_reports.lock().push((backup_id.to_string(), successful, upload_id));
        Ok(())
    }

    async fn upload_backup_part(
        &self,
        url: &str,
        part: Vec<u8>,
    ) -> Result<Option<String>, RemoteError> {
        self.uploaded_parts.lock().push((url.to_string(), part.len()));
        Ok(Some("\"etag\"".to_string()))
    }
}

/// Fast settings rooted in a temp dir, chown disabled.
pub(crate) fn test_settings(dir: &Path) -> EngineSettings {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(dir).expect("temp dir exists");
    let node = quay_adapters::NodeSettings {
        uid: meta.uid(),
        gid: meta.gid(),
        ..Default::default()
    };

    EngineSettings {
        data_root: dir.join("data"),
        log_dir: dir.join("log"),
        node,
        throttle: ThrottleSettings {
            enabled: true,
            lines: 100,
            line_reset_interval_ms: 1000,
            maximum_trigger_count: 5,
            decay_interval_ms: 10_000,
            stop_grace_period_s: 1,
        },
        crash: CrashSettings { detect_clean_exit_as_crash: false, timeout_seconds: 60 },
        disk_check_interval: Duration::from_secs(60),
        check_permissions_on_boot: false,
        stop_grace: Duration::from_millis(200),
        restart_stop_grace: Duration::from_millis(500),
        config_snapshot: json!({"api": {"port": 8080}}),
    }
}

/// Control-plane-shaped server data.
pub(crate) fn server_data(uuid: &str) -> RawServerData {
    RawServerData {
        uuid: uuid.to_string(),
        settings: json!({
            "uuid": uuid,
            "invocation": "./start.sh",
            "environment": {"JARFILE": "server.jar"},
            "build": {
                "memory_limit": 512,
                "swap": 0,
                "io_weight": 500,
                "cpu_limit": 100,
                "disk_space": 0,
                "threads": ""
            },
            "container": {"image": "ghcr.io/yolks:java_17"},
            "allocations": {"default": {"ip": "127.0.0.1", "port": 25565}}
        }),
        process_configuration: serde_json::from_value(json!({
            "startup": {"done": [r"regex:^Done \([0-9.]+s\)!"]},
            "stop": {"kind": "command", "value": "stop"}
        }))
        .expect("valid process configuration"),
    }
}

pub(crate) struct Fixture {
    pub server: Server<FakeRuntime>,
    pub runtime: FakeRuntime,
    pub remote: Arc<FakeControlPlane>,
    pub messages: mpsc::UnboundedReceiver<EngineMessage>,
    pub settings: Arc<EngineSettings>,
    _dir: tempfile::TempDir,
}

/// A server wired to fakes in a fresh temp dir.
pub(crate) fn fixture() -> Fixture {
    fixture_with(server_data("6ba1f3a2-8e94-4f7c-a83b-000000000001"))
}

pub(crate) fn fixture_with(data: RawServerData) -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let settings = Arc::new(test_settings(dir.path()));
    let runtime = FakeRuntime::new();
    let remote = FakeControlPlane::with_server(data.clone());
    let (tx, rx) = mpsc::unbounded_channel();

    let control_plane: Arc<dyn ControlPlane> = remote.clone();
    let server = Server::new(
        data,
        Arc::new(runtime.clone()),
        control_plane,
        Arc::clone(&settings),
        tx,
    )
    .expect("server builds");

    Fixture { server, runtime, remote, messages: rx, settings, _dir: dir }
}

/// Poll until `predicate` holds or the timeout lapses.
pub(crate) async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
