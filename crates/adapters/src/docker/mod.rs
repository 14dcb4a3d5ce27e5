// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker implementation of [`ContainerRuntime`] over the Engine API.
//!
//! # Module layout
//!
//! - [`convert`] — [`ContainerSpec`] → Docker create payloads
//! - [`stats`] — raw stats frames → [`ResourceSample`]
//!
//! The adapter holds one shared client plus the per-container attach
//! registry that enforces the single-attachment rule and routes
//! stdin-based stop commands.

mod convert;
mod stats;

use crate::runtime::{
    AttachHandle, ContainerRuntime, ContainerStatus, PullProgress, ResourceSample,
    RuntimeError, RuntimeResult, StdinHandle,
};
use crate::spec::ContainerSpec;
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, CreateContainerOptions, KillContainerOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;
use parking_lot::Mutex;
use quay_core::StopDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Container runtime backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    client: Docker,
    /// Live attachments: id → stdin handle. Presence means attached.
    attached: Arc<Mutex<HashMap<String, StdinHandle>>>,
    /// registry host → (username, password) for authenticated pulls.
    registry_auth: Arc<HashMap<String, (String, String)>>,
}

impl DockerRuntime {
    pub fn new() -> RuntimeResult<Self> {
        let client = Docker::connect_with_local_defaults().map_err(map_error)?;
        Ok(Self {
            client,
            attached: Arc::new(Mutex::new(HashMap::new())),
            registry_auth: Arc::new(HashMap::new()),
        })
    }

    pub fn with_registry_auth(mut self, auth: HashMap<String, (String, String)>) -> Self {
        self.registry_auth = Arc::new(auth);
        self
    }

    fn credentials_for(&self, image: &str) -> Option<bollard::auth::DockerCredentials> {
        let registry = image.split('/').next()?;
        let (username, password) = self.registry_auth.get(registry)?;
        Some(bollard::auth::DockerCredentials {
            username: Some(username.clone()),
            password: Some(password.clone()),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        })
    }
}

/// Map a Docker API error onto the runtime error kinds.
fn map_error(err: bollard::errors::Error) -> RuntimeError {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, message } => {
            RuntimeError::NotFound(message)
        }
        other => RuntimeError::Api(other.to_string()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn exists(&self, id: &str) -> RuntimeResult<bool> {
        match self.client.inspect_container(id, None).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(err) => Err(map_error(err)),
        }
    }

    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<()> {
        if self.exists(&spec.id).await? {
            return Ok(());
        }
        let options = CreateContainerOptions { name: spec.id.as_str(), platform: None };
        let config = convert::container_config(spec);
        self.client.create_container(Some(options), config).await.map_err(map_error)?;
        tracing::debug!(id = %spec.id, image = %spec.image, "created container");
        Ok(())
    }

    async fn start(&self, id: &str) -> RuntimeResult<()> {
        self.client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_error)
    }

    async fn stop(&self, id: &str, descriptor: &StopDescriptor) -> RuntimeResult<()> {
        match descriptor {
            StopDescriptor::Command { value } => {
                let stdin = self.attached.lock().get(id).cloned();
                match stdin {
                    Some(handle) => handle.write_line(value).await,
                    None => Err(RuntimeError::NotFound(format!("{id}: no attached stdin"))),
                }
            }
            StopDescriptor::Signal { value } => self.kill(id, value).await,
            StopDescriptor::Stop => self
                .client
                .stop_container(id, None::<StopContainerOptions>)
                .await
                .map_err(map_error),
        }
    }

    async fn wait_for_stop(
        &self,
        id: &str,
        timeout: Duration,
        terminate: bool,
        cancel: CancellationToken,
    ) -> RuntimeResult<()> {
        let options = WaitContainerOptions { condition: "not-running" };
        let mut wait = self.client.wait_container(id, Some(options));

        let next = tokio::select! {
            () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = tokio::time::timeout(timeout, wait.next()) => result,
        };

        match next {
            Err(_elapsed) => {
                if terminate {
                    tracing::info!(%id, "stop grace expired, sending SIGKILL");
                    self.kill(id, "SIGKILL").await
                } else {
                    Err(RuntimeError::Timeout)
                }
            }
            // a missing container has, by definition, stopped
            Ok(Some(Err(err))) => {
                let mapped = map_error(err);
                if mapped.is_not_found() {
                    Ok(())
                } else {
                    Err(mapped)
                }
            }
            Ok(_) => Ok(()),
        }
    }

    async fn kill(&self, id: &str, signal: &str) -> RuntimeResult<()> {
        self.client
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await
            .map_err(map_error)
    }

    async fn destroy(&self, id: &str) -> RuntimeResult<()> {
        let options = RemoveContainerOptions { force: true, v: true, ..Default::default() };
        match self.client.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(err) => Err(map_error(err)),
        }
    }

    async fn attach(&self, id: &str) -> RuntimeResult<AttachHandle> {
        {
            let attached = self.attached.lock();
            if attached.contains_key(id) {
                return Err(RuntimeError::AlreadyAttached(id.to_string()));
            }
        }

        let options = AttachContainerOptions::<String> {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(false),
            ..Default::default()
        };
        let results =
            self.client.attach_container(id, Some(options)).await.map_err(map_error)?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>(256);
        let handle = AttachHandle::new(Box::new(results.input), rx);
        self.attached.lock().insert(id.to_string(), handle.stdin());

        let attached = Arc::clone(&self.attached);
        let id_owned = id.to_string();
        let mut output = results.output;
        tokio::spawn(async move {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(log) => {
                        if tx.send(log.into_bytes().to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(id = %id_owned, %err, "attach stream error");
                        break;
                    }
                }
            }
            attached.lock().remove(&id_owned);
            // tx drops here; the receiver sees the stream close
        });

        Ok(handle)
    }

    async fn stream_stats(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> RuntimeResult<mpsc::Receiver<ResourceSample>> {
        let options =
            bollard::container::StatsOptions { stream: true, one_shot: false };
        let mut source = self.client.stats(id, Some(options));
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    () = cancel.cancelled() => break,
                    frame = source.next() => frame,
                };
                match frame {
                    Some(Ok(raw)) => {
                        let sample = stats::sample_from(&raw);
                        if tx.send(sample).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(_)) | None => break,
                }
            }
        });

        Ok(rx)
    }

    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerStatus> {
        let info = self.client.inspect_container(id, None).await.map_err(map_error)?;
        let state = info.state.unwrap_or_default();

        let uptime_ms = state
            .started_at
            .as_deref()
            .filter(|s| !s.is_empty() && !s.starts_with("0001-"))
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|started| {
                chrono::Utc::now().signed_duration_since(started).num_milliseconds().max(0)
                    as u64
            })
            .unwrap_or(0);

        Ok(ContainerStatus {
            running: state.running.unwrap_or(false),
            exit_code: state.exit_code.unwrap_or(0),
            oom_killed: state.oom_killed.unwrap_or(false),
            uptime_ms,
        })
    }

    async fn read_log(&self, id: &str, tail_lines: u32) -> RuntimeResult<Vec<String>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail_lines.to_string(),
            ..Default::default()
        };
        let mut stream = self.client.logs(id, Some(options));
        let mut lines = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => {
                    let text = log.to_string();
                    if !text.is_empty() {
                        lines.push(text);
                    }
                }
                Err(err) => return Err(map_error(err)),
            }
        }
        Ok(lines)
    }

    async fn follow_logs(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> RuntimeResult<mpsc::Receiver<String>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            tail: "all".to_string(),
            ..Default::default()
        };
        let mut stream = self.client.logs(id, Some(options));
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            loop {
                let chunk = tokio::select! {
                    () = cancel.cancelled() => break,
                    chunk = stream.next() => chunk,
                };
                match chunk {
                    Some(Ok(log)) => {
                        let text = log.to_string();
                        for line in text.lines() {
                            if tx.send(line.to_string()).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(_)) | None => break,
                }
            }
        });

        Ok(rx)
    }

    async fn in_situ_update(&self, id: &str, spec: &ContainerSpec) -> RuntimeResult<()> {
        let options = convert::update_options(&spec.resources);
        self.client.update_container(id, options).await.map_err(map_error)?;
        tracing::info!(%id, "applied in-place resource update");
        Ok(())
    }

    async fn pull_image(
        &self,
        image: &str,
        force: bool,
        progress: mpsc::Sender<PullProgress>,
    ) -> RuntimeResult<()> {
        if !force && self.client.inspect_image(image).await.is_ok() {
            tracing::debug!(%image, "image present, skipping pull");
            return Ok(());
        }

        let options = CreateImageOptions { from_image: image, ..Default::default() };
        let credentials = self.credentials_for(image);
        let mut stream = self.client.create_image(Some(options), None, credentials);

        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    let event = PullProgress {
                        status: info.status.unwrap_or_default(),
                        detail: info
                            .progress
                            .or(info.id)
                            .unwrap_or_default(),
                    };
                    let _ = progress.try_send(event);
                }
                Err(err) => return Err(RuntimeError::ImagePull(err.to_string())),
            }
        }
        tracing::info!(%image, "image pull complete");
        Ok(())
    }
}
