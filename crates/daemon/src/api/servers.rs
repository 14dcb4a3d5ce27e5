// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server lifecycle, power, and command routes.

use super::{ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use quay_adapters::ContainerRuntime;
use quay_core::{PowerAction, PowerState};
use quay_engine::Server;
use serde::Deserialize;
use std::time::Duration;

fn describe<R: ContainerRuntime>(server: &Server<R>) -> serde_json::Value {
    serde_json::json!({
        "uuid": server.id(),
        "state": server.state(),
        "is_suspended": server.is_suspended(),
        "is_installing": server.is_installing(),
        "utilization": server.usage(),
    })
}

pub(super) async fn list<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
) -> Json<serde_json::Value> {
    let servers: Vec<serde_json::Value> =
        state.manager.all().iter().map(describe).collect();
    Json(serde_json::Value::Array(servers))
}

#[derive(Deserialize)]
pub(super) struct CreateRequest {
    uuid: String,
    #[serde(default)]
    start_on_completion: bool,
}

/// Install-and-register a server the control plane just assigned.
pub(super) async fn create<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Json(body): Json<CreateRequest>,
) -> Result<StatusCode, ApiError> {
    let data = state
        .remote
        .server_configuration(&body.uuid)
        .await
        .map_err(quay_engine::ServerError::from)?;
    let server = state.manager.create_server(data)?;

    tokio::spawn(async move {
        if let Err(err) = server.install().await {
            tracing::error!(server = %server.id(), %err, "initial install failed");
            return;
        }
        if body.start_on_completion {
            if let Err(err) = server
                .handle_power_action(PowerAction::Start, Some(Duration::from_secs(30)))
                .await
            {
                tracing::warn!(server = %server.id(), %err, "post-install start failed");
            }
        }
    });
    Ok(StatusCode::ACCEPTED)
}

pub(super) async fn details<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let server = state.server(&id)?;
    Ok(Json(describe(&server)))
}

pub(super) async fn update<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    server.update_configuration(&patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Tear the instance down completely: container, data, record.
pub(super) async fn remove<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    server.abort_installation();
    server.events().destroy();
    let _ = server
        .handle_power_action(PowerAction::Kill, None)
        .await
        .map_err(|err| tracing::debug!(server = %id, %err, "kill during delete failed"));

    let _ = server.environment_destroy().await;
    let data_dir = state.manager.settings().server_data_dir(&id);
    state.manager.remove(&id);

    tokio::task::spawn_blocking(move || {
        if let Err(err) = std::fs::remove_dir_all(&data_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %data_dir.display(), %err, "data dir removal failed");
            }
        }
    });
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub(super) struct PowerQuery {
    action: String,
    #[serde(default)]
    wait_seconds: u64,
}

pub(super) async fn power<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<PowerQuery>,
) -> Result<StatusCode, ApiError> {
    let action = PowerAction::parse(&query.action)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown power action {}", query.action)))?;
    let wait = (query.wait_seconds > 0).then(|| Duration::from_secs(query.wait_seconds));

    let server = state.server(&id)?;
    server.handle_power_action(action, wait).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub(super) struct CommandQuery {
    command: String,
}

pub(super) async fn command<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
    Query(query): Query<CommandQuery>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    server.send_command(&query.command).await?;

    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("local");
    server
        .activity(None, ip)
        .log("server:console.command", serde_json::json!({"command": query.command}));
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn reinstall<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    if server.is_running() {
        return Err(ApiError::BadRequest(
            "stop the server before reinstalling".to_string(),
        ));
    }
    tokio::spawn(async move {
        if let Err(err) = server.install().await {
            tracing::error!(server = %server.id(), %err, "reinstall failed");
        }
    });
    Ok(StatusCode::ACCEPTED)
}

/// Drop the container so the next boot rebuilds it from scratch.
pub(super) async fn rebuild<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    server.environment_destroy().await?;
    Ok(StatusCode::ACCEPTED)
}

pub(super) async fn suspend<R: ContainerRuntime>(
    state: State<AppState<R>>,
    path: Path<String>,
) -> Result<StatusCode, ApiError> {
    set_suspended(state, path, true).await
}

pub(super) async fn unsuspend<R: ContainerRuntime>(
    state: State<AppState<R>>,
    path: Path<String>,
) -> Result<StatusCode, ApiError> {
    set_suspended(state, path, false).await
}

async fn set_suspended<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    suspended: bool,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    server
        .update_configuration(&serde_json::json!({"suspended": suspended}))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub(super) struct LogQuery {
    /// Number of lines from the tail.
    #[serde(default = "default_log_size")]
    size: u32,
}

fn default_log_size() -> u32 {
    100
}

pub(super) async fn read_log<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let server = state.server(&id)?;
    if server.state() == PowerState::Offline {
        return Ok(Json(serde_json::json!({"data": []})));
    }
    let lines = server.read_log(query.size.min(500)).await?;
    Ok(Json(serde_json::json!({"data": lines})))
}
