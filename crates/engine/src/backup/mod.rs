// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup generation, restore, and panel reporting.
//!
//! Two adapters share one flow: build the ignore-filtered tar.gz with
//! a streaming sha1, then either keep the artifact on the node or
//! stream it to the control plane's presigned multipart upload.

mod local;
mod remote;

use crate::error::ServerError;
use crate::server::Server;
use quay_adapters::ContainerRuntime;
use quay_core::Event;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::io::Write;
use std::sync::atomic::Ordering;

/// Which adapter stores the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupAdapter {
    Local,
    Remote,
}

/// What a completed generation produced.
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub checksum: String,
    pub size: u64,
    pub upload_id: Option<String>,
}

/// `Write` tee that feeds a sha1 and counts bytes.
pub(crate) struct Sha1Writer<W: Write> {
    inner: W,
    hasher: Sha1,
    written: u64,
}

impl<W: Write> Sha1Writer<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, hasher: Sha1::new(), written: 0 }
    }

    /// Hex digest and byte count; flushes the inner writer.
    pub(crate) fn finish(mut self) -> std::io::Result<(String, u64)> {
        self.inner.flush()?;
        Ok((hex::encode(self.hasher.finalize()), self.written))
    }
}

impl<W: Write> Write for Sha1Writer<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<R: ContainerRuntime> Server<R> {
    /// Produce a backup, report it to the control plane, and publish
    /// the completion event. Failures are reported too.
    pub async fn backup(
        &self,
        adapter: BackupAdapter,
        backup_uuid: &str,
        ignore: &str,
    ) -> Result<BackupOutcome, ServerError> {
        tracing::info!(server = %self.id(), backup = %backup_uuid, ?adapter, "starting backup");
        let result = match adapter {
            BackupAdapter::Local => local::generate(self, backup_uuid, ignore).await,
            BackupAdapter::Remote => remote::generate(self, backup_uuid, ignore).await,
        };

        match &result {
            Ok(outcome) => {
                let report = self
                    .inner
                    .remote
                    .report_backup_status(
                        backup_uuid,
                        &outcome.checksum,
                        outcome.size,
                        true,
                        outcome.upload_id.clone(),
                    )
                    .await;
                if let Err(err) = report {
                    tracing::warn!(backup = %backup_uuid, %err, "backup status report failed");
                }
                self.inner
                    .bus
                    .publish(Event::backup_completed(
                        backup_uuid,
                        true,
                        &outcome.checksum,
                        outcome.size,
                    ))
                    .await;
            }
            Err(err) => {
                tracing::warn!(backup = %backup_uuid, %err, "backup generation failed");
                let _ = self
                    .inner
                    .remote
                    .report_backup_status(backup_uuid, "", 0, false, None)
                    .await;
                self.inner
                    .bus
                    .publish(Event::backup_completed(backup_uuid, false, "", 0))
                    .await;
            }
        }
        result
    }

    /// Stream an archive back into the data directory.
    ///
    /// Start actions are refused while the restore flag is held.
    pub async fn restore_backup<S>(&self, reader: S) -> Result<(), ServerError>
    where
        S: std::io::Read + Send + 'static,
    {
        self.inner.restoring.store(true, Ordering::SeqCst);
        let fs = self.inner.fs.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<(), quay_fs::FsError> {
            fs.restore_archive(reader, |name, contents| {
                let mut buf = Vec::new();
                contents.read_to_end(&mut buf)?;
                fs.write_file(name, &buf)
            })
        })
        .await
        .map_err(|e| quay_adapters::RuntimeError::Api(e.to_string()))?;
        self.inner.restoring.store(false, Ordering::SeqCst);

        result?;
        self.inner
            .bus
            .publish(Event::daemon_message("Completed server restoration from backup."))
            .await;
        Ok(())
    }

    /// Delete the local artifact for a backup, if one exists.
    pub async fn remove_backup(&self, backup_uuid: &str) -> Result<(), ServerError> {
        let path = self.inner.settings.backups_dir().join(format!("{backup_uuid}.tar.gz"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(quay_fs::FsError::Io(err).into()),
        }
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
