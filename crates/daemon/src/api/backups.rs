// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup routes.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use quay_adapters::ContainerRuntime;
use quay_engine::BackupAdapter;
use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct CreateBackupRequest {
    adapter: BackupAdapter,
    uuid: String,
    #[serde(default)]
    ignore: String,
}

/// Kick off a backup; the outcome is reported to the control plane
/// and published as a `backup completed` event.
pub(super) async fn create<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<CreateBackupRequest>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    tokio::spawn(async move {
        if let Err(err) = server.backup(body.adapter, &body.uuid, &body.ignore).await {
            tracing::error!(server = %server.id(), backup = %body.uuid, %err, "backup failed");
        }
    });
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub(super) struct RestoreBackupRequest {
    adapter: BackupAdapter,
    /// Presigned download URL for remotely stored artifacts.
    #[serde(default)]
    download_url: Option<String>,
}

pub(super) async fn restore<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path((id, backup_id)): Path<(String, String)>,
    Json(body): Json<RestoreBackupRequest>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;

    let bytes: Vec<u8> = match body.adapter {
        BackupAdapter::Local => {
            let path = state
                .manager
                .settings()
                .backups_dir()
                .join(format!("{backup_id}.tar.gz"));
            tokio::fs::read(&path).await.map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    ApiError::BadRequest(format!("no local artifact for backup {backup_id}"))
                } else {
                    ApiError::Server(quay_fs::FsError::Io(err).into())
                }
            })?
        }
        BackupAdapter::Remote => {
            let url = body.download_url.ok_or_else(|| {
                ApiError::BadRequest("download_url is required for remote restores".to_string())
            })?;
            let response = reqwest::get(&url)
                .await
                .map_err(|err| ApiError::BadRequest(format!("download failed: {err}")))?;
            if !response.status().is_success() {
                return Err(ApiError::BadRequest(format!(
                    "download failed with status {}",
                    response.status()
                )));
            }
            response
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("download failed: {err}")))?
                .to_vec()
        }
    };

    server.restore_backup(std::io::Cursor::new(bytes)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn remove<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path((id, backup_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let server = state.server(&id)?;
    server.remove_backup(&backup_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
