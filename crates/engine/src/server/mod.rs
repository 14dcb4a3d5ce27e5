// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One managed instance.
//!
//! A [`Server`] owns its filesystem, event bus, throttler, crash
//! detector and the per-instance power lock, and is the only place
//! that talks to the runtime about its container.

mod console;
mod power;

use crate::activity::RequestActivity;
use crate::bus::EventBus;
use crate::control_plane::ControlPlane;
use crate::crash::CrashDetector;
use crate::error::ServerError;
use crate::settings::EngineSettings;
use crate::throttle::ConsoleThrottle;
use parking_lot::{Mutex, RwLock};
use quay_adapters::{ContainerRuntime, ContainerSpec, StdinHandle};
use quay_core::{
    Event, PowerState, ProcessConfiguration, ResourceUsage, ServerConfiguration, SystemClock,
};
use quay_fs::Filesystem;
use quay_parser::TemplateContext;
use quay_remote::RawServerData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Notifications the manager consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    StateChanged { id: String, state: PowerState },
    Removed { id: String },
}

pub(crate) struct ServerInner<R: ContainerRuntime> {
    pub(crate) id: String,
    pub(crate) config: RwLock<ServerConfiguration>,
    pub(crate) proc: RwLock<ProcessConfiguration>,
    pub(crate) runtime: Arc<R>,
    pub(crate) remote: Arc<dyn ControlPlane>,
    pub(crate) fs: Filesystem,
    pub(crate) bus: EventBus,
    pub(crate) settings: Arc<EngineSettings>,
    pub(crate) throttle: Mutex<ConsoleThrottle<SystemClock>>,
    pub(crate) crash: CrashDetector<SystemClock>,
    pub(crate) power_lock: Arc<Semaphore>,
    pub(crate) state: Mutex<PowerState>,
    pub(crate) usage: Mutex<ResourceUsage>,
    pub(crate) install_lock: Arc<Semaphore>,
    pub(crate) install_cancel: Mutex<Option<CancellationToken>>,
    pub(crate) restoring: AtomicBool,
    pub(crate) transferring: AtomicBool,
    pub(crate) stdin: Mutex<Option<StdinHandle>>,
    /// The live console pump; aborted before a new boot so a stale
    /// stream closure can never clobber the next session's state.
    pub(crate) console_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub(crate) messages: mpsc::UnboundedSender<EngineMessage>,
    /// Ordered feed into the bus for events produced from synchronous
    /// contexts; a single pump task preserves publish order.
    pub(crate) ordered_events: mpsc::UnboundedSender<Event>,
}

/// Handle to one instance; cheap to clone.
pub struct Server<R: ContainerRuntime> {
    pub(crate) inner: Arc<ServerInner<R>>,
}

impl<R: ContainerRuntime> Clone for Server<R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R: ContainerRuntime> Server<R> {
    /// Build an instance from control-plane data.
    pub fn new(
        data: RawServerData,
        runtime: Arc<R>,
        remote: Arc<dyn ControlPlane>,
        settings: Arc<EngineSettings>,
        messages: mpsc::UnboundedSender<EngineMessage>,
    ) -> Result<Self, ServerError> {
        let config: ServerConfiguration = serde_json::from_value(data.settings)
            .map_err(quay_core::server::MergeError::from)?;
        let id = config.uuid.clone();

        let fs = Filesystem::new(
            settings.server_data_dir(&id),
            config.build.disk_bytes() as i64,
            settings.disk_check_interval,
            settings.node.uid,
            settings.node.gid,
        )?;

        let clock = SystemClock;
        let bus = EventBus::new();
        let (ordered_events, mut ordered_rx) = mpsc::unbounded_channel::<Event>();
        {
            let bus = bus.clone();
            tokio::spawn(async move {
                while let Some(event) = ordered_rx.recv().await {
                    bus.publish(event).await;
                }
            });
        }

        Ok(Self {
            inner: Arc::new(ServerInner {
                id,
                config: RwLock::new(config),
                proc: RwLock::new(data.process_configuration),
                runtime,
                remote,
                fs,
                bus,
                ordered_events,
                throttle: Mutex::new(ConsoleThrottle::new(
                    settings.throttle.clone(),
                    clock.clone(),
                )),
                crash: CrashDetector::new(settings.crash.clone(), clock),
                settings,
                power_lock: Arc::new(Semaphore::new(1)),
                state: Mutex::new(PowerState::Offline),
                usage: Mutex::new(ResourceUsage::default()),
                install_lock: Arc::new(Semaphore::new(1)),
                install_cancel: Mutex::new(None),
                restoring: AtomicBool::new(false),
                transferring: AtomicBool::new(false),
                stdin: Mutex::new(None),
                console_task: Mutex::new(None),
                messages,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> ServerConfiguration {
        self.inner.config.read().clone()
    }

    pub fn process_configuration(&self) -> ProcessConfiguration {
        self.inner.proc.read().clone()
    }

    pub fn state(&self) -> PowerState {
        *self.inner.state.lock()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), PowerState::Running | PowerState::Starting)
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.config.read().suspended
    }

    pub fn is_installing(&self) -> bool {
        self.inner.install_lock.available_permits() == 0
    }

    pub fn is_restoring(&self) -> bool {
        self.inner.restoring.load(Ordering::SeqCst)
    }

    pub fn is_transferring(&self) -> bool {
        self.inner.transferring.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> EventBus {
        self.inner.bus.clone()
    }

    pub fn filesystem(&self) -> Filesystem {
        self.inner.fs.clone()
    }

    /// Current usage snapshot, with state and daemon-tracked disk.
    pub fn usage(&self) -> ResourceUsage {
        let mut snapshot = self.inner.usage.lock().clone();
        snapshot.state = self.state();
        snapshot.disk_bytes = self.inner.fs.cached_usage();
        snapshot
    }

    /// Factory for logged user actions on this instance.
    pub fn activity(&self, user: Option<String>, ip: &str) -> RequestActivity {
        RequestActivity::new(self.inner.id.clone(), user, ip)
    }

    /// Transition state, publish on `status`, notify the manager, and
    /// keep dependent state (throttle, usage) in line.
    pub(crate) fn set_state(&self, state: PowerState) {
        let previous = {
            let mut current = self.inner.state.lock();
            let previous = *current;
            *current = state;
            previous
        };
        if previous == state {
            return;
        }
        tracing::info!(server = %self.inner.id, from = %previous, to = %state, "state transition");

        match state {
            PowerState::Starting => self.inner.throttle.lock().reset(),
            PowerState::Offline => {
                self.inner.usage.lock().reset();
                *self.inner.stdin.lock() = None;
            }
            _ => {}
        }

        let _ = self.inner.messages.send(EngineMessage::StateChanged {
            id: self.inner.id.clone(),
            state,
        });
        let _ = self.inner.ordered_events.send(Event::status(state));
    }

    /// Refresh configuration from the control plane.
    ///
    /// A remote 404 notifies the manager that the instance is gone
    /// before surfacing the error.
    pub async fn sync(&self) -> Result<(), ServerError> {
        let data = match self.inner.remote.server_configuration(&self.inner.id).await {
            Ok(data) => data,
            Err(quay_remote::RemoteError::InstanceNotFound) => {
                let _ = self
                    .inner
                    .messages
                    .send(EngineMessage::Removed { id: self.inner.id.clone() });
                return Err(quay_remote::RemoteError::InstanceNotFound.into());
            }
            Err(err) => return Err(err.into()),
        };

        let config: ServerConfiguration = serde_json::from_value(data.settings)
            .map_err(quay_core::server::MergeError::from)?;
        self.inner.fs.set_disk_limit(config.build.disk_bytes() as i64);
        *self.inner.config.write() = config;
        *self.inner.proc.write() = data.process_configuration;
        Ok(())
    }

    /// Merge a pushed configuration patch and apply its side effects.
    pub async fn update_configuration(
        &self,
        patch: &serde_json::Value,
    ) -> Result<(), ServerError> {
        let was_suspended = self.is_suspended();
        {
            let mut config = self.inner.config.write();
            config.merge_update(patch)?;
        }
        let config = self.config();
        self.inner.fs.set_disk_limit(config.build.disk_bytes() as i64);

        // push new limits into a live container; never fatal
        let server = self.clone();
        tokio::spawn(async move {
            let spec = server.container_spec();
            if let Err(err) =
                server.inner.runtime.in_situ_update(&server.inner.id, &spec).await
            {
                if !err.is_not_found() {
                    tracing::warn!(server = %server.inner.id, %err, "in-place update failed");
                }
            }
        });

        if !was_suspended && self.is_suspended() && self.state().is_stoppable() {
            let server = self.clone();
            tokio::spawn(async move {
                let grace = server.inner.settings.stop_grace;
                if let Err(err) = server.stop_with_kill_after(grace).await {
                    tracing::warn!(server = %server.inner.id, %err, "suspension stop failed");
                }
            });
        }
        Ok(())
    }

    /// Write a command to the attached stdin.
    pub async fn send_command(&self, command: &str) -> Result<(), ServerError> {
        let stdin = self.inner.stdin.lock().clone();
        match stdin {
            Some(handle) => Ok(handle.write_line(command).await?),
            None => Err(quay_adapters::RuntimeError::NotFound(format!(
                "{}: no attached stdin",
                self.inner.id
            ))
            .into()),
        }
    }

    /// Read lines from the tail of the container log.
    pub async fn read_log(&self, lines: u32) -> Result<Vec<String>, ServerError> {
        Ok(self.inner.runtime.read_log(&self.inner.id, lines).await?)
    }

    /// Remove the container artifact; the next start recreates it.
    pub async fn environment_destroy(&self) -> Result<(), ServerError> {
        match self.inner.runtime.destroy(&self.inner.id).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// The container spec for this instance as configured right now.
    pub(crate) fn container_spec(&self) -> ContainerSpec {
        let config = self.inner.config.read();
        ContainerSpec::from_configuration(
            &config,
            self.inner.fs.root(),
            &self.inner.settings.node,
        )
    }

    /// Snapshot used to resolve `{{config.*}}`/`{{server.*}}`
    /// placeholders in config patches.
    pub(crate) fn template_context(&self) -> TemplateContext {
        let config = self.inner.config.read();
        let env: serde_json::Map<String, serde_json::Value> = config
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        let default = serde_json::json!({
            "ip": config.allocations.default.ip,
            "port": config.allocations.default.port,
        });
        let server = serde_json::json!({
            "uuid": config.uuid,
            "build": {
                "memory": config.build.memory_limit,
                "swap": config.build.swap,
                "io": config.build.io_weight,
                "cpu": config.build.cpu_limit,
                "disk": config.build.disk_space,
                "threads": config.build.threads,
                "env": env,
                "default": default.clone(),
            },
            "allocations": serde_json::json!({
                "default": default,
                "mappings": config.allocations.mappings,
            }),
        });
        TemplateContext::new(self.inner.settings.config_snapshot.clone(), server)
    }
}

#[cfg(test)]
#[path = "../server_tests/mod.rs"]
mod tests;
