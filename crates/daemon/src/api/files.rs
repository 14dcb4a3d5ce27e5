// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-safe file management routes.
//!
//! Every operation funnels through the instance filesystem, which
//! rejects escapes before disk is touched. Blocking filesystem work
//! runs on the blocking pool.

use super::{ApiError, AppState};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use quay_adapters::ContainerRuntime;
use quay_engine::ServerError;
use quay_fs::Filesystem;
use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct FileQuery {
    file: String,
}

#[derive(Deserialize)]
pub(super) struct DirectoryQuery {
    #[serde(default = "root_directory")]
    directory: String,
}

fn root_directory() -> String {
    "/".to_string()
}

/// Run a blocking filesystem closure for a server.
async fn blocking<R, T, F>(state: &AppState<R>, id: &str, op: F) -> Result<T, ApiError>
where
    R: ContainerRuntime,
    T: Send + 'static,
    F: FnOnce(Filesystem) -> Result<T, quay_fs::FsError> + Send + 'static,
{
    let fs = state.server(id)?.filesystem();
    let result = tokio::task::spawn_blocking(move || op(fs))
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    result.map_err(|err| ApiError::Server(ServerError::Fs(err)))
}

pub(super) async fn contents<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = blocking(&state, &id, move |fs| fs.read_file(&query.file)).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub(super) async fn download<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let name = query
        .file
        .rsplit('/')
        .next()
        .unwrap_or("download")
        .to_string();
    let bytes = blocking(&state, &id, move |fs| fs.read_file(&query.file)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    ))
}

pub(super) async fn list_directory<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<Vec<quay_fs::DirEntryInfo>>, ApiError> {
    let entries =
        blocking(&state, &id, move |fs| fs.list_directory(&query.directory)).await?;
    Ok(Json(entries))
}

pub(super) async fn stat<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Json<quay_fs::FileStat>, ApiError> {
    let stat = blocking(&state, &id, move |fs| fs.stat(&query.file)).await?;
    Ok(Json(stat))
}

pub(super) async fn write<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    blocking(&state, &id, move |fs| fs.write_file(&query.file, &body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub(super) struct CreateDirectoryRequest {
    name: String,
    #[serde(default = "root_directory")]
    path: String,
}

pub(super) async fn create_directory<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<CreateDirectoryRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, &id, move |fs| {
        fs.create_directory(format!("{}/{}", body.path, body.name))
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub(super) struct RenameRequest {
    from: String,
    to: String,
}

pub(super) async fn rename<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, &id, move |fs| fs.rename(&body.from, &body.to)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub(super) struct CopyRequest {
    location: String,
}

pub(super) async fn copy<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<CopyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = blocking(&state, &id, move |fs| fs.copy_file(&body.location)).await?;
    Ok(Json(serde_json::json!({"name": name})))
}

#[derive(Deserialize)]
pub(super) struct CompressRequest {
    #[serde(default = "root_directory")]
    root: String,
    files: Vec<String>,
}

/// Build a tar.gz of the named paths next to them.
pub(super) async fn compress<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<CompressRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let archive_name = format!(
        "archive-{}.tar.gz",
        unix_timestamp()
    );
    let target = format!("{}/{archive_name}", body.root.trim_end_matches('/'));

    let name = blocking(&state, &id, move |fs| {
        let paths: Vec<std::path::PathBuf> = body
            .files
            .iter()
            .map(|f| std::path::PathBuf::from(format!("{}/{f}", body.root.trim_end_matches('/'))))
            .collect();
        let buffer = fs.archive_paths_to(Vec::new(), &paths)?;
        fs.write_file(&target, &buffer)?;
        Ok(archive_name)
    })
    .await?;
    Ok(Json(serde_json::json!({"name": name})))
}

/// Seconds-resolution epoch stamp safe for filenames.
fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    secs.to_string()
}

#[derive(Deserialize)]
pub(super) struct DecompressRequest {
    file: String,
    #[serde(default = "root_directory")]
    root: String,
}

pub(super) async fn decompress<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<DecompressRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, &id, move |fs| {
        fs.decompress_file(format!("{}/{}", body.root.trim_end_matches('/'), body.file))
            .map(drop)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub(super) struct DeleteRequest {
    #[serde(default = "root_directory")]
    root: String,
    files: Vec<String>,
}

pub(super) async fn delete<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(body): Json<DeleteRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, &id, move |fs| {
        for file in &body.files {
            fs.delete(format!("{}/{file}", body.root.trim_end_matches('/')))?;
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
