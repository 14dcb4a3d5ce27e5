// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated HTTP + WebSocket API.
//!
//! # Module layout
//!
//! - [`system`] — node info
//! - [`servers`] — lifecycle, power, commands
//! - [`files`] — path-safe file management
//! - [`backups`] — create/restore/remove
//! - [`ws`] — the per-server event socket

mod backups;
mod files;
mod servers;
mod system;
mod ws;

use crate::config::DaemonConfig;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use quay_adapters::ContainerRuntime;
use quay_engine::{Manager, Server, ServerError};
use std::sync::Arc;

/// Shared handler state.
pub struct AppState<R: ContainerRuntime> {
    pub manager: Arc<Manager<R>>,
    pub remote: Arc<quay_remote::Client>,
    pub config: Arc<DaemonConfig>,
    expected_auth: Arc<String>,
}

impl<R: ContainerRuntime> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            remote: Arc::clone(&self.remote),
            config: Arc::clone(&self.config),
            expected_auth: Arc::clone(&self.expected_auth),
        }
    }
}

impl<R: ContainerRuntime> AppState<R> {
    pub fn new(
        manager: Arc<Manager<R>>,
        remote: Arc<quay_remote::Client>,
        config: Arc<DaemonConfig>,
    ) -> Self {
        let expected_auth = Arc::new(config.api_authorization());
        Self { manager, remote, config, expected_auth }
    }

    /// Look up a server or fail with 404.
    fn server(&self, id: &str) -> Result<Server<R>, ApiError> {
        self.manager.get(id).ok_or(ApiError::UnknownServer)
    }
}

/// Build the versioned router.
pub fn router<R: ContainerRuntime>(state: AppState<R>) -> Router {
    let api = Router::new()
        .route("/", get(system::info))
        .route("/servers", get(servers::list).post(servers::create))
        .route(
            "/servers/:id",
            get(servers::details).patch(servers::update).delete(servers::remove),
        )
        .route("/servers/:id/power", post(servers::power))
        .route("/servers/:id/command", post(servers::command))
        .route("/servers/:id/reinstall", post(servers::reinstall))
        .route("/servers/:id/rebuild", post(servers::rebuild))
        .route("/servers/:id/suspend", post(servers::suspend))
        .route("/servers/:id/unsuspend", post(servers::unsuspend))
        .route("/servers/:id/log", get(servers::read_log))
        .route("/servers/:id/ws", get(ws::upgrade))
        .route("/servers/:id/files/contents", get(files::contents))
        .route("/servers/:id/files/download", get(files::download))
        .route("/servers/:id/files/list-directory", get(files::list_directory))
        .route("/servers/:id/files/stat", get(files::stat))
        .route("/servers/:id/files/write", post(files::write))
        .route("/servers/:id/files/create-directory", post(files::create_directory))
        .route("/servers/:id/files/rename", post(files::rename))
        .route("/servers/:id/files/copy", post(files::copy))
        .route("/servers/:id/files/compress", post(files::compress))
        .route("/servers/:id/files/decompress", post(files::decompress))
        .route("/servers/:id/files/delete", post(files::delete))
        .route("/servers/:id/backup", post(backups::create))
        .route("/servers/:id/backup/:backup_id/restore", post(backups::restore))
        .route("/servers/:id/backup/:backup_id", delete(backups::remove))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate::<R>))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

/// Bearer-token gate.
///
/// WebSocket upgrades authenticate with a user token validated
/// against the control plane inside the handler, so they pass
/// through on the `?token=` query instead.
async fn authenticate<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == state.expected_auth.as_str());

    let is_websocket = request.uri().path().ends_with("/ws")
        && request.uri().query().is_some_and(|q| q.contains("token="));

    if authorized || is_websocket {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
    ApiError::Unauthorized.into_response()
}

/// API-level failures with stable machine codes and statuses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("the requested server does not exist on this node")]
    UnknownServer,
    #[error("missing or invalid authorization")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Server(#[from] ServerError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownServer => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Server(err) => match err {
                ServerError::Busy
                | ServerError::Suspended
                | ServerError::Installing
                | ServerError::Transferring
                | ServerError::Restoring
                | ServerError::Throttled => StatusCode::CONFLICT,
                ServerError::Fs(fs) if fs.is_path_escape() => StatusCode::BAD_REQUEST,
                ServerError::Fs(fs) if fs.is_quota() => StatusCode::BAD_REQUEST,
                ServerError::Fs(quay_fs::FsError::IsDirectory(_))
                | ServerError::Fs(quay_fs::FsError::DestinationExists(_))
                | ServerError::Fs(quay_fs::FsError::ArchiveFormat(_))
                | ServerError::Fs(quay_fs::FsError::DeleteRoot) => StatusCode::BAD_REQUEST,
                ServerError::Fs(quay_fs::FsError::Io(io))
                    if io.kind() == std::io::ErrorKind::NotFound =>
                {
                    StatusCode::NOT_FOUND
                }
                ServerError::Remote(quay_remote::RemoteError::InstanceNotFound) => {
                    StatusCode::NOT_FOUND
                }
                ServerError::Remote(quay_remote::RemoteError::InvalidCredentials) => {
                    StatusCode::FORBIDDEN
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
