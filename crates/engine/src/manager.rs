// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The instance collection.
//!
//! Bootstraps every server the control plane assigns to this node,
//! restores cached power states, and persists state transitions.
//! Nothing here calls into an instance while holding the collection
//! lock.

use crate::control_plane::ControlPlane;
use crate::error::ServerError;
use crate::server::{EngineMessage, Server};
use crate::settings::EngineSettings;
use crate::states::StateStore;
use parking_lot::RwLock;
use quay_adapters::ContainerRuntime;
use quay_core::PowerState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

pub struct Manager<R: ContainerRuntime> {
    servers: RwLock<HashMap<String, Server<R>>>,
    runtime: Arc<R>,
    remote: Arc<dyn ControlPlane>,
    settings: Arc<EngineSettings>,
    states: Arc<StateStore>,
    messages: mpsc::UnboundedSender<EngineMessage>,
}

impl<R: ContainerRuntime> Manager<R> {
    /// Create an empty manager and spawn its message pump.
    pub fn new(
        runtime: Arc<R>,
        remote: Arc<dyn ControlPlane>,
        settings: Arc<EngineSettings>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            servers: RwLock::new(HashMap::new()),
            runtime,
            remote,
            states: Arc::new(StateStore::new(settings.states_path())),
            settings,
            messages: tx,
        });
        Self::spawn_message_pump(Arc::clone(&manager), rx);
        manager
    }

    /// React to instance notifications: persist state transitions and
    /// drop records the control plane no longer knows.
    fn spawn_message_pump(
        manager: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<EngineMessage>,
    ) {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    EngineMessage::StateChanged { id, state } => {
                        let states = Arc::clone(&manager.states);
                        let _ = tokio::task::spawn_blocking(move || states.set(&id, state))
                            .await;
                    }
                    EngineMessage::Removed { id } => {
                        tracing::info!(server = %id, "control plane dropped server, removing");
                        manager.remove(&id);
                    }
                }
            }
        });
    }

    /// Load every assigned server, in parallel across a CPU-sized
    /// worker pool, then restore cached power states and prime the
    /// disk usage cache.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), ServerError> {
        let listed = self.remote.list_servers().await?;
        tracing::info!(count = listed.len(), "bootstrapping servers from the control plane");

        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        let pool = Arc::new(Semaphore::new(workers));
        let mut tasks = tokio::task::JoinSet::new();

        for data in listed {
            let manager = Arc::clone(self);
            let pool = Arc::clone(&pool);
            tasks.spawn(async move {
                let Ok(_slot) = pool.acquire_owned().await else { return };
                let uuid = data.uuid.clone();
                match Server::new(
                    data,
                    Arc::clone(&manager.runtime),
                    Arc::clone(&manager.remote),
                    Arc::clone(&manager.settings),
                    manager.messages.clone(),
                ) {
                    Ok(server) => {
                        manager.restore_state(&server).await;
                        manager.add(server);
                    }
                    Err(err) => {
                        tracing::error!(server = %uuid, %err, "failed to construct server");
                    }
                }
            });
        }
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    /// Seed the instance's state from the states file (the runtime
    /// corrects it as soon as it reports) and refresh disk usage.
    async fn restore_state(&self, server: &Server<R>) {
        let recorded = {
            let states = Arc::clone(&self.states);
            let id = server.id().to_string();
            tokio::task::spawn_blocking(move || states.get(&id))
                .await
                .unwrap_or_default()
        };
        if recorded != PowerState::Offline {
            match server.reattach_running().await {
                Ok(true) => {
                    tracing::info!(server = %server.id(), state = %recorded, "reattached to running container");
                }
                Ok(false) => {
                    tracing::info!(server = %server.id(), "recorded state was stale, container is down");
                }
                Err(err) => {
                    tracing::warn!(server = %server.id(), %err, "reattach failed");
                }
            }
        }

        let fs = server.filesystem();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = fs.refresh_usage() {
                tracing::warn!(%err, "initial disk walk failed");
            }
        })
        .await
        .ok();
    }

    pub fn get(&self, id: &str) -> Option<Server<R>> {
        self.servers.read().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Server<R>> {
        self.servers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    pub fn add(&self, server: Server<R>) {
        self.servers.write().insert(server.id().to_string(), server);
    }

    /// Drop the record and its cached state.
    pub fn remove(&self, id: &str) {
        self.servers.write().remove(id);
        self.states.remove(id);
    }

    /// Construct and register a newly created server.
    pub fn create_server(
        &self,
        data: quay_remote::RawServerData,
    ) -> Result<Server<R>, ServerError> {
        let server = Server::new(
            data,
            Arc::clone(&self.runtime),
            Arc::clone(&self.remote),
            Arc::clone(&self.settings),
            self.messages.clone(),
        )?;
        self.add(server.clone());
        Ok(server)
    }

    pub fn settings(&self) -> Arc<EngineSettings> {
        Arc::clone(&self.settings)
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
