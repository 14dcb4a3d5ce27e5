// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory runtime for engine tests.
//!
//! Tests drive the container from the outside: flip the running flag,
//! feed console lines, close the attach stream, and assert on the
//! recorded calls.

use crate::runtime::{
    AttachHandle, ContainerRuntime, ContainerStatus, PullProgress, ResourceSample,
    RuntimeError, RuntimeResult,
};
use crate::spec::ContainerSpec;
use async_trait::async_trait;
use parking_lot::Mutex;
use quay_core::StopDescriptor;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Every operation invoked on the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
    Exists(String),
    Create(String),
    Start(String),
    Stop(String, StopDescriptor),
    WaitForStop { id: String, timeout: Duration, terminate: bool },
    Kill(String, String),
    Destroy(String),
    Attach(String),
    Inspect(String),
    ReadLog(String),
    InSituUpdate(String),
    PullImage { image: String, force: bool },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RuntimeCall>,
    status: ContainerStatus,
    console_tx: Option<mpsc::Sender<Vec<u8>>>,
    stats_tx: Option<mpsc::Sender<ResourceSample>>,
    follow_tx: Option<mpsc::Sender<String>>,
    stdin: Arc<Mutex<Vec<u8>>>,
    log_lines: Vec<String>,
    /// op name → error message for the next matching call
    failures: HashMap<&'static str, String>,
}

/// In-memory [`ContainerRuntime`].
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
    exists: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    attached: Arc<AtomicBool>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    // -- scripting --

    pub fn set_exists(&self, exists: bool) {
        self.exists.store(exists, Ordering::SeqCst);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.status.running = running;
    }

    pub fn set_exit(&self, exit_code: i64, oom_killed: bool) {
        let mut state = self.state.lock();
        state.status = ContainerStatus { running: false, exit_code, oom_killed, uptime_ms: 0 };
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn set_log_lines(&self, lines: Vec<String>) {
        self.state.lock().log_lines = lines;
    }

    /// Fail the next call to `op` (the `RuntimeCall` variant name in
    /// snake case, e.g. `"start"`).
    pub fn fail_next(&self, op: &'static str, message: &str) {
        self.state.lock().failures.insert(op, message.to_string());
    }

    /// Feed a console line through the attach stream.
    pub async fn push_console_line(&self, line: &str) {
        let tx = self.state.lock().console_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(format!("{line}\n").into_bytes()).await;
        }
    }

    /// Drop the attach stream, as a runtime would on container exit.
    pub fn close_console(&self) {
        let mut state = self.state.lock();
        state.console_tx = None;
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Feed a stats sample.
    pub async fn push_stats(&self, sample: ResourceSample) {
        let tx = self.state.lock().stats_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(sample).await;
        }
    }

    /// Feed a line to a `follow_logs` consumer.
    pub async fn push_log_line(&self, line: &str) {
        let tx = self.state.lock().follow_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(line.to_string()).await;
        }
    }

    /// End the followed log stream, as happens when the container
    /// stops.
    pub fn close_logs(&self) {
        self.state.lock().follow_tx = None;
    }

    /// Whether a `follow_logs` consumer is currently registered.
    pub fn has_log_follower(&self) -> bool {
        self.state.lock().follow_tx.is_some()
    }

    // -- assertions --

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Everything written to container stdin, split into lines.
    pub fn stdin_lines(&self) -> Vec<String> {
        let state = self.state.lock();
        let buf = state.stdin.lock();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn record(&self, call: RuntimeCall) {
        self.state.lock().calls.push(call);
    }

    fn take_failure(&self, op: &'static str) -> Option<RuntimeError> {
        self.state.lock().failures.remove(op).map(RuntimeError::Api)
    }
}

/// AsyncWrite that appends into a shared buffer.
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for CaptureWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn exists(&self, id: &str) -> RuntimeResult<bool> {
        self.record(RuntimeCall::Exists(id.to_string()));
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<()> {
        self.record(RuntimeCall::Create(spec.id.clone()));
        if let Some(err) = self.take_failure("create") {
            return Err(err);
        }
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self, id: &str) -> RuntimeResult<()> {
        self.record(RuntimeCall::Start(id.to_string()));
        if let Some(err) = self.take_failure("start") {
            return Err(err);
        }
        self.running.store(true, Ordering::SeqCst);
        self.state.lock().status.running = true;
        Ok(())
    }

    async fn stop(&self, id: &str, descriptor: &StopDescriptor) -> RuntimeResult<()> {
        self.record(RuntimeCall::Stop(id.to_string(), descriptor.clone()));
        if let Some(err) = self.take_failure("stop") {
            return Err(err);
        }
        if let StopDescriptor::Command { value } = descriptor {
            let state = self.state.lock();
            let mut buf = state.stdin.lock();
            buf.extend_from_slice(value.as_bytes());
            buf.push(b'\n');
        }
        Ok(())
    }

    async fn wait_for_stop(
        &self,
        id: &str,
        timeout: Duration,
        terminate: bool,
        cancel: CancellationToken,
    ) -> RuntimeResult<()> {
        self.record(RuntimeCall::WaitForStop {
            id: id.to_string(),
            timeout,
            terminate,
        });
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }
            if tokio::time::Instant::now() >= deadline {
                if terminate {
                    self.kill(id, "SIGKILL").await?;
                    self.set_running(false);
                    return Ok(());
                }
                return Err(RuntimeError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn kill(&self, id: &str, signal: &str) -> RuntimeResult<()> {
        self.record(RuntimeCall::Kill(id.to_string(), signal.to_string()));
        // a killed container stops and its attach stream dies with it
        self.close_console();
        self.set_running(false);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> RuntimeResult<()> {
        self.record(RuntimeCall::Destroy(id.to_string()));
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn attach(&self, id: &str) -> RuntimeResult<AttachHandle> {
        self.record(RuntimeCall::Attach(id.to_string()));
        if self.attached.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyAttached(id.to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        let stdin = {
            let mut state = self.state.lock();
            state.console_tx = Some(tx);
            Arc::clone(&state.stdin)
        };
        Ok(AttachHandle::new(Box::new(CaptureWriter(stdin)), rx))
    }

    async fn stream_stats(
        &self,
        id: &str,
        _cancel: CancellationToken,
    ) -> RuntimeResult<mpsc::Receiver<ResourceSample>> {
        let _ = id;
        let (tx, rx) = mpsc::channel(16);
        self.state.lock().stats_tx = Some(tx);
        Ok(rx)
    }

    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerStatus> {
        self.record(RuntimeCall::Inspect(id.to_string()));
        Ok(self.state.lock().status.clone())
    }

    async fn read_log(&self, id: &str, tail_lines: u32) -> RuntimeResult<Vec<String>> {
        self.record(RuntimeCall::ReadLog(id.to_string()));
        let lines = self.state.lock().log_lines.clone();
        let count = lines.len().min(tail_lines as usize);
        Ok(lines[lines.len() - count..].to_vec())
    }

    async fn follow_logs(
        &self,
        _id: &str,
        _cancel: CancellationToken,
    ) -> RuntimeResult<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().follow_tx = Some(tx);
        Ok(rx)
    }

    async fn in_situ_update(&self, id: &str, _spec: &ContainerSpec) -> RuntimeResult<()> {
        self.record(RuntimeCall::InSituUpdate(id.to_string()));
        if let Some(err) = self.take_failure("in_situ_update") {
            return Err(err);
        }
        Ok(())
    }

    async fn pull_image(
        &self,
        image: &str,
        force: bool,
        progress: mpsc::Sender<PullProgress>,
    ) -> RuntimeResult<()> {
        self.record(RuntimeCall::PullImage { image: image.to_string(), force });
        if let Some(err) = self.take_failure("pull_image") {
            return Err(err);
        }
        let _ = progress
            .try_send(PullProgress { status: "Pull complete".to_string(), detail: String::new() });
        Ok(())
    }
}
