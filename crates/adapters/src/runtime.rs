// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`ContainerRuntime`] trait and its wire types.

use crate::spec::ContainerSpec;
use async_trait::async_trait;
use quay_core::StopDescriptor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Errors from container runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The container does not exist; the next create will recreate it.
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("container already attached: {0}")]
    AlreadyAttached(String),
    #[error("image pull failed: {0}")]
    ImagePull(String),
    #[error("operation timed out")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    #[error("runtime error: {0}")]
    Api(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// "Not found" is benign for most callers: the container will be
    /// recreated on the next start.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Inspection summary for a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerStatus {
    pub running: bool,
    pub exit_code: i64,
    pub oom_killed: bool,
    /// Milliseconds since the container started, when running.
    pub uptime_ms: u64,
}

/// One decoded sample from the runtime's stats stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSample {
    pub memory_bytes: u64,
    pub memory_limit_bytes: u64,
    pub cpu_absolute: f64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

/// Progress events from an image pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullProgress {
    pub status: String,
    pub detail: String,
}

/// A live attachment to a container's stdio.
///
/// There is exactly one per running container. Output chunks arrive on
/// `output`; the channel closing means the stream was lost and the
/// instance must be treated as offline. Writes go through a mutex so
/// two commands never interleave on the stream.
pub struct AttachHandle {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    pub output: mpsc::Receiver<Vec<u8>>,
}

impl AttachHandle {
    pub fn new(
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        output: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        Self { writer: Arc::new(Mutex::new(writer)), output }
    }

    /// Write one command followed by a newline to container stdin.
    pub async fn write_line(&self, line: &str) -> RuntimeResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// A clonable handle for writing without holding the receiver.
    pub fn stdin(&self) -> StdinHandle {
        StdinHandle { writer: Arc::clone(&self.writer) }
    }
}

/// Write-only view of an attachment.
#[derive(Clone)]
pub struct StdinHandle {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl StdinHandle {
    pub async fn write_line(&self, line: &str) -> RuntimeResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Abstraction over the container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Whether the container exists at all (running or not).
    async fn exists(&self, id: &str) -> RuntimeResult<bool>;

    /// Create the container from a spec. A no-op when it already
    /// exists.
    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<()>;

    /// Start a created container.
    async fn start(&self, id: &str) -> RuntimeResult<()>;

    /// Apply the stop descriptor: write the command to stdin, send the
    /// signal, or ask the runtime for a graceful stop.
    async fn stop(&self, id: &str, descriptor: &StopDescriptor) -> RuntimeResult<()>;

    /// Block until the container stops, up to `timeout`. On timeout,
    /// `terminate` sends SIGKILL and succeeds; otherwise the timeout
    /// is an error.
    async fn wait_for_stop(
        &self,
        id: &str,
        timeout: Duration,
        terminate: bool,
        cancel: CancellationToken,
    ) -> RuntimeResult<()>;

    /// Send a signal without waiting.
    async fn kill(&self, id: &str, signal: &str) -> RuntimeResult<()>;

    /// Force-remove the container and its anonymous volumes.
    async fn destroy(&self, id: &str) -> RuntimeResult<()>;

    /// Attach to stdio. Fails with [`RuntimeError::AlreadyAttached`]
    /// when an attachment is live.
    async fn attach(&self, id: &str) -> RuntimeResult<AttachHandle>;

    /// Stream resource samples until the container stops or `cancel`
    /// fires.
    async fn stream_stats(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> RuntimeResult<mpsc::Receiver<ResourceSample>>;

    /// Inspect running state / exit code / oom flag.
    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerStatus>;

    /// Read decoded log lines from the tail of the container log.
    async fn read_log(&self, id: &str, tail_lines: u32) -> RuntimeResult<Vec<String>>;

    /// Follow the container log live until it stops or `cancel`
    /// fires. Used by one-shot containers that are never attached.
    async fn follow_logs(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> RuntimeResult<mpsc::Receiver<String>>;

    /// Apply new resource limits without a restart.
    async fn in_situ_update(&self, id: &str, spec: &ContainerSpec) -> RuntimeResult<()>;

    /// Pull an image, forwarding progress. `force` pulls even when the
    /// image exists locally.
    async fn pull_image(
        &self,
        image: &str,
        force: bool,
        progress: mpsc::Sender<PullProgress>,
    ) -> RuntimeResult<()>;
}
