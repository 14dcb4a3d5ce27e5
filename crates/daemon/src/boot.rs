// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.

use crate::api::{router, AppState};
use crate::config::{ConfigError, DaemonConfig};
use quay_adapters::DockerRuntime;
use quay_engine::{ControlPlane, Manager};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The control plane could not be reached during bootstrap.
    #[error("control plane unreachable: {0}")]
    RemoteUnreachable(quay_remote::RemoteError),

    #[error(transparent)]
    Runtime(#[from] quay_adapters::RuntimeError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Install the tracing subscriber: env-filtered stdout plus a rolling
/// daemon log file. Returns the appender guard to keep flushing.
pub fn init_logging(
    config: &DaemonConfig,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.system.log_directory)?;
    let file = tracing_appender::rolling::daily(&config.system.log_directory, "quay.log");
    let (writer, guard) = tracing_appender::non_blocking(file);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(guard)
}

/// Boot the node daemon and serve the API until shutdown.
pub async fn serve(config: DaemonConfig) -> Result<(), DaemonError> {
    let config = Arc::new(config);

    let remote = Arc::new(
        quay_remote::Client::new(
            config.remote.url.clone(),
            &config.remote.token_id,
            &config.remote.token,
            config.remote_timeout(),
        )
        .map_err(DaemonError::RemoteUnreachable)?,
    );
    let runtime = Arc::new(DockerRuntime::new()?);
    let settings = Arc::new(config.engine_settings());

    std::fs::create_dir_all(settings.volumes_dir())?;
    std::fs::create_dir_all(settings.backups_dir())?;
    std::fs::create_dir_all(settings.archives_dir())?;

    let control_plane: Arc<dyn ControlPlane> = remote.clone();
    let manager = Manager::new(runtime, control_plane, settings);
    manager.initialize().await.map_err(|err| match err {
        quay_engine::ServerError::Remote(remote_err) => {
            DaemonError::RemoteUnreachable(remote_err)
        }
        other => DaemonError::Io(std::io::Error::other(other.to_string())),
    })?;
    tracing::info!(servers = manager.len(), "manager initialized");

    let state = AppState::new(manager, remote, Arc::clone(&config));
    let app = router(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| DaemonError::Bind { addr: addr.clone(), source })?;
    tracing::info!(%addr, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("daemon shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            tracing::error!(%err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    tracing::info!("shutdown signal received");
}
