// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The power state machine.
//!
//! One semaphore permit per instance serializes start/stop/restart;
//! kill proceeds even when the lock is held so a stuck action can be
//! forced through. The pre-start pipeline is a single happens-before
//! chain with only the config-rewrite stage fanned out.

use crate::error::ServerError;
use crate::server::Server;
use quay_adapters::{ContainerRuntime, PullProgress, RuntimeError};
use quay_core::{Event, PowerAction, PowerState, Topic};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

impl<R: ContainerRuntime> Server<R> {
    /// Execute a power action under the per-instance lock.
    ///
    /// `wait` bounds how long start/stop/restart may wait for the
    /// lock; `None` try-acquires and fails fast with [`ServerError::Busy`].
    pub async fn handle_power_action(
        &self,
        action: PowerAction,
        wait: Option<Duration>,
    ) -> Result<(), ServerError> {
        tracing::info!(server = %self.inner.id, action = %action, "power action received");

        if action == PowerAction::Kill {
            // best-effort acquire; kill goes through regardless
            let permit = self.inner.power_lock.clone().try_acquire_owned().ok();
            let result = self.execute_kill().await;
            drop(permit);
            return result;
        }

        let permit = self.acquire_power_lock(wait).await?;
        let result = match action {
            PowerAction::Start => self.execute_start().await,
            PowerAction::Stop => {
                self.execute_stop(self.inner.settings.stop_grace, true).await
            }
            PowerAction::Restart => self.execute_restart().await,
            PowerAction::Kill => unreachable!("handled above"),
        };
        drop(permit);
        result
    }

    async fn acquire_power_lock(
        &self,
        wait: Option<Duration>,
    ) -> Result<OwnedSemaphorePermit, ServerError> {
        let lock: Arc<Semaphore> = Arc::clone(&self.inner.power_lock);
        match wait {
            Some(timeout) if !timeout.is_zero() => {
                tokio::time::timeout(timeout, lock.acquire_owned())
                    .await
                    .map_err(|_| ServerError::Busy)?
                    .map_err(|_| ServerError::Busy)
            }
            _ => lock.try_acquire_owned().map_err(|_| ServerError::Busy),
        }
    }

    /// Guards shared by every start attempt.
    fn check_start_preconditions(&self) -> Result<(), ServerError> {
        if self.is_suspended() {
            return Err(ServerError::Suspended);
        }
        if self.is_installing() {
            return Err(ServerError::Installing);
        }
        if self.is_transferring() {
            return Err(ServerError::Transferring);
        }
        if self.is_restoring() {
            return Err(ServerError::Restoring);
        }
        Ok(())
    }

    pub(crate) async fn execute_start(&self) -> Result<(), ServerError> {
        self.check_start_preconditions()?;
        if self.state() != PowerState::Offline {
            return Ok(());
        }
        if !self.inner.fs.within_quota() {
            return Err(quay_fs::FsError::NotEnoughDiskSpace.into());
        }

        // a previous session's console pump is stale by definition here
        if let Some(task) = self.inner.console_task.lock().take() {
            task.abort();
        }

        self.set_state(PowerState::Starting);
        match self.pre_start_and_boot().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.set_state(PowerState::Offline);
                Err(err)
            }
        }
    }

    /// The pre-start chain: sync → disk check → permissions → config
    /// rewrite → container recreate → image pull → start → attach.
    async fn pre_start_and_boot(&self) -> Result<(), ServerError> {
        self.sync().await?;

        // configuration may have changed; re-check the hard gates
        if self.is_suspended() {
            return Err(ServerError::Suspended);
        }
        if !self.inner.fs.within_quota() {
            return Err(quay_fs::FsError::NotEnoughDiskSpace.into());
        }

        if self.inner.settings.check_permissions_on_boot {
            let fs = self.inner.fs.clone();
            tokio::task::spawn_blocking(move || fs.chown_recursive("/"))
                .await
                .map_err(|err| RuntimeError::Api(err.to_string()))??;
        }

        self.apply_config_patches().await?;

        // the container artifact is rebuilt on every boot
        self.inner.runtime.destroy(&self.inner.id).await.or_else(ignore_not_found)?;
        let spec = self.container_spec();
        self.pull_image(&spec.image).await?;
        self.inner.runtime.create(&spec).await?;
        self.inner.runtime.start(&self.inner.id).await?;

        self.attach_and_monitor().await?;
        Ok(())
    }

    /// Rewrite declared config files, fanned out over the blocking
    /// pool with one worker per CPU.
    async fn apply_config_patches(&self) -> Result<(), ServerError> {
        let files = self.inner.proc.read().configs.clone();
        if files.is_empty() {
            return Ok(());
        }
        let ctx = Arc::new(self.template_context());
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        let pool = Arc::new(Semaphore::new(workers));

        let mut tasks = tokio::task::JoinSet::new();
        for file in files {
            let fs = self.inner.fs.clone();
            let ctx = Arc::clone(&ctx);
            let pool = Arc::clone(&pool);
            tasks.spawn(async move {
                let _slot =
                    pool.acquire_owned().await.map_err(|e| RuntimeError::Api(e.to_string()))?;
                tokio::task::spawn_blocking(move || -> Result<(), ServerError> {
                    let path = fs.safe_path(&file.file)?;
                    quay_parser::apply(&path, &file, &ctx)?;
                    Ok(())
                })
                .await
                .map_err(|e| ServerError::Runtime(RuntimeError::Api(e.to_string())))?
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| ServerError::Runtime(RuntimeError::Api(e.to_string())))??;
        }
        Ok(())
    }

    /// Pull the image unless it is already present (or the node always
    /// pulls), publishing progress on the image-pull topics.
    async fn pull_image(&self, image: &str) -> Result<(), ServerError> {
        let bus = self.inner.bus.clone();
        bus.publish(Event::new(Topic::ImagePullStarted, serde_json::json!({"image": image})))
            .await;

        let (tx, mut rx) = tokio::sync::mpsc::channel::<PullProgress>(16);
        let forward = {
            let bus = bus.clone();
            tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    bus.publish(Event::new(
                        Topic::ImagePullStatus,
                        serde_json::json!({
                            "status": progress.status,
                            "detail": progress.detail,
                        }),
                    ))
                    .await;
                }
            })
        };

        let force = self.inner.settings.node.always_pull_images;
        let result = self.inner.runtime.pull_image(image, force, tx).await;
        let _ = forward.await;
        bus.publish(Event::new(Topic::ImagePullCompleted, serde_json::json!({"image": image})))
            .await;

        match result {
            Ok(()) => Ok(()),
            // a pull failure is recoverable when the image is cached
            Err(RuntimeError::ImagePull(detail)) => {
                tracing::warn!(server = %self.inner.id, %detail, "image pull failed, trying cached image");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Stop a stoppable instance: apply the stop descriptor, wait out
    /// the grace, optionally escalating to SIGKILL.
    pub(crate) async fn execute_stop(
        &self,
        grace: Duration,
        terminate: bool,
    ) -> Result<(), ServerError> {
        if !self.state().is_stoppable() {
            return Ok(());
        }
        self.set_state(PowerState::Stopping);

        let descriptor = self.inner.proc.read().stop.clone();
        match self.inner.runtime.stop(&self.inner.id, &descriptor).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                self.set_state(PowerState::Offline);
                return Ok(());
            }
            Err(err) => {
                self.set_state(PowerState::Offline);
                return Err(err.into());
            }
        }

        let result = self
            .inner
            .runtime
            .wait_for_stop(&self.inner.id, grace, terminate, CancellationToken::new())
            .await;
        match result {
            Ok(()) => {
                self.set_state(PowerState::Offline);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Stop, escalating to kill when the stop half times out, then
    /// start again. A stop timeout is surfaced even though the start
    /// half proceeds.
    async fn execute_restart(&self) -> Result<(), ServerError> {
        let mut stop_timeout = None;
        if self.state() != PowerState::Offline {
            match self.execute_stop(self.inner.settings.restart_stop_grace, false).await {
                Ok(()) => {}
                Err(ServerError::Runtime(RuntimeError::Timeout)) => {
                    self.inner
                        .runtime
                        .kill(&self.inner.id, "SIGKILL")
                        .await
                        .or_else(ignore_not_found)?;
                    self.set_state(PowerState::Offline);
                    stop_timeout = Some(ServerError::Runtime(RuntimeError::Timeout));
                }
                Err(err) => return Err(err),
            }
        }

        self.execute_start().await?;
        match stop_timeout {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn execute_kill(&self) -> Result<(), ServerError> {
        // record the intent so the exiting stream is not read as a crash
        if self.state() != PowerState::Offline {
            self.set_state(PowerState::Stopping);
        }
        self.inner
            .runtime
            .kill(&self.inner.id, "SIGKILL")
            .await
            .or_else(ignore_not_found)?;
        // with no attach stream alive there is nothing left to observe
        // the exit, so transition directly
        if self.inner.stdin.lock().is_none() {
            self.set_state(PowerState::Offline);
        }
        Ok(())
    }

    /// Forced shutdown used by the throttler and by suspension: stop,
    /// then kill after `grace`.
    pub(crate) async fn stop_with_kill_after(&self, grace: Duration) -> Result<(), ServerError> {
        self.execute_stop(grace, true).await
    }

    /// Boot recovery: when the container is still running from before
    /// a daemon restart, adopt it instead of leaving the instance
    /// offline.
    pub(crate) async fn reattach_running(&self) -> Result<bool, ServerError> {
        let status = match self.inner.runtime.inspect(&self.inner.id).await {
            Ok(status) => status,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if !status.running {
            return Ok(false);
        }
        self.set_state(PowerState::Running);
        self.attach_and_monitor().await?;
        Ok(true)
    }
}

fn ignore_not_found(err: RuntimeError) -> Result<(), RuntimeError> {
    if err.is_not_found() {
        Ok(())
    } else {
        Err(err)
    }
}
