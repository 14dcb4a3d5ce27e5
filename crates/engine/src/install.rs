// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The one-shot installer container.
//!
//! Install scripts run in a sidecar container with the instance data
//! directory mounted at `/mnt/server`. The daemon captures the full
//! log, reports the outcome to the control plane, and removes the
//! sidecar whether the script succeeded or not.

use crate::error::ServerError;
use crate::server::Server;
use quay_adapters::{ContainerRuntime, ContainerSpec, PullProgress, SpecMount, SpecResources};
use quay_core::{Event, Topic};
use quay_remote::InstallationScript;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ceiling on how long one install script may run.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

impl<R: ContainerRuntime> Server<R> {
    /// Run the full install flow. Refused while another install holds
    /// the lock.
    pub async fn install(&self) -> Result<(), ServerError> {
        let permit = self
            .inner
            .install_lock
            .clone()
            .try_acquire_owned()
            .map_err(|_| ServerError::Installing)?;

        let cancel = CancellationToken::new();
        *self.inner.install_cancel.lock() = Some(cancel.clone());

        self.inner.bus.publish(Event::new(Topic::InstallStarted, serde_json::Value::Null)).await;
        let result = self.run_install(cancel).await;
        *self.inner.install_cancel.lock() = None;
        drop(permit);

        let successful = result.is_ok();
        if let Err(err) =
            self.inner.remote.report_install_status(&self.inner.id, successful).await
        {
            tracing::warn!(server = %self.inner.id, %err, "install status report failed");
        }
        self.inner
            .bus
            .publish(Event::new(
                Topic::InstallCompleted,
                serde_json::json!({"successful": successful}),
            ))
            .await;
        result
    }

    /// Cancel a running install; the stored handle tears the sidecar
    /// down.
    pub fn abort_installation(&self) {
        if let Some(cancel) = self.inner.install_cancel.lock().as_ref() {
            cancel.cancel();
        }
    }

    async fn run_install(&self, cancel: CancellationToken) -> Result<(), ServerError> {
        let script = self.inner.remote.install_script(&self.inner.id).await?;
        let script_dir = self.write_install_script(&script)?;
        let installer_id = format!("{}_installer", self.inner.id);

        self.pull_install_image(&script.container_image).await?;

        // remove any sidecar a previous attempt left behind
        self.inner.runtime.destroy(&installer_id).await?;
        let spec = self.installer_spec(&installer_id, &script, &script_dir);
        self.inner.runtime.create(&spec).await?;
        self.inner.runtime.start(&installer_id).await?;

        let mut lines = self
            .inner
            .runtime
            .follow_logs(&installer_id, cancel.clone())
            .await?;
        let captured = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut collector = {
            let bus = self.inner.bus.clone();
            let captured = std::sync::Arc::clone(&captured);
            tokio::spawn(async move {
                while let Some(line) = lines.recv().await {
                    bus.publish(Event::install_output(line.clone())).await;
                    captured.lock().push(line);
                }
            })
        };

        let wait = self
            .inner
            .runtime
            .wait_for_stop(&installer_id, INSTALL_TIMEOUT, false, cancel.clone())
            .await;

        // the log stream normally ends with the container; don't let a
        // stuck stream hold the teardown hostage
        if tokio::time::timeout(Duration::from_secs(2), &mut collector).await.is_err() {
            collector.abort();
        }
        let captured = captured.lock().clone();
        self.persist_install_log(&script, &captured);

        self.inner.runtime.destroy(&installer_id).await?;
        let _ = std::fs::remove_dir_all(&script_dir);

        match wait {
            Ok(()) => {
                tracing::info!(server = %self.inner.id, "install script finished");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(server = %self.inner.id, %err, "install did not complete");
                Err(err.into())
            }
        }
    }

    /// Write `install.sh` into a private temp directory.
    fn write_install_script(
        &self,
        script: &InstallationScript,
    ) -> Result<PathBuf, ServerError> {
        let dir = std::env::temp_dir().join(format!("quay-install-{}", self.inner.id));
        std::fs::create_dir_all(&dir).map_err(quay_fs::FsError::Io)?;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .map_err(quay_fs::FsError::Io)?;

        let path = dir.join("install.sh");
        // scripts arrive with panel line endings
        std::fs::write(&path, script.script.replace("\r\n", "\n"))
            .map_err(quay_fs::FsError::Io)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .map_err(quay_fs::FsError::Io)?;
        Ok(dir)
    }

    async fn pull_install_image(&self, image: &str) -> Result<(), ServerError> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<PullProgress>(16);
        let bus = self.inner.bus.clone();
        let forward = tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                bus.publish(Event::install_output(format!(
                    "{} {}",
                    progress.status, progress.detail
                )))
                .await;
            }
        });
        let result = self.inner.runtime.pull_image(image, false, tx).await;
        let _ = forward.await;
        result?;
        Ok(())
    }

    fn installer_spec(
        &self,
        installer_id: &str,
        script: &InstallationScript,
        script_dir: &std::path::Path,
    ) -> ContainerSpec {
        let config = self.inner.config.read();
        let node = &self.inner.settings.node;

        let mut env: Vec<String> =
            config.environment.iter().map(|(k, v)| format!("{k}={v}")).collect();
        env.push(format!("TZ={}", node.timezone));

        ContainerSpec {
            id: installer_id.to_string(),
            image: script.container_image.clone(),
            user: String::new(),
            env,
            data_dir: self.inner.fs.root().to_path_buf(),
            data_dir_target: "/mnt/server".to_string(),
            mounts: vec![SpecMount {
                source: script_dir.to_string_lossy().into_owned(),
                target: "/mnt/install".to_string(),
                read_only: false,
            }],
            allocations: Vec::new(),
            resources: SpecResources {
                cpu_shares: 1024,
                cpu_period: 100_000,
                cpu_quota: -1,
                io_weight: 500,
                ..Default::default()
            },
            tmpfs_size_mib: node.tmpfs_size,
            network_mode: node.network_mode.clone(),
            labels: vec![("Service".to_string(), "Quay".to_string())],
            command: vec![
                script.entrypoint.clone(),
                "/mnt/install/install.sh".to_string(),
            ],
            privileged: true,
            readonly_rootfs: false,
        }
    }

    /// Persist the captured log with a templated header.
    fn persist_install_log(&self, script: &InstallationScript, lines: &[String]) {
        let path = self.inner.settings.install_log_path(&self.inner.id);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let env = {
            let config = self.inner.config.read();
            config
                .environment
                .iter()
                .map(|(k, v)| format!("  {k}={v}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let header = format!(
            "Install log for {uuid}\n\
             Image: {image}\n\
             Entrypoint: {entrypoint}\n\
             Environment:\n{env}\n\
             ---\n",
            uuid = self.inner.id,
            image = script.container_image,
            entrypoint = script.entrypoint,
        );
        let body = format!("{header}{}\n", lines.join("\n"));
        if let Err(err) = std::fs::write(&path, body) {
            tracing::warn!(path = %path.display(), %err, "failed to write install log");
        }
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;

