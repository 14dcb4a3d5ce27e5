// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types exchanged with the control plane.

use quay_core::ProcessConfiguration;
use serde::{Deserialize, Serialize};

/// One server as the control plane hands it out.
///
/// `settings` stays raw JSON: the instance merges it into its cached
/// snapshot with the wholesale-replacement rules, so re-typing it here
/// would lose the distinction between absent and empty fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawServerData {
    pub uuid: String,
    pub settings: serde_json::Value,
    #[serde(default)]
    pub process_configuration: ProcessConfiguration,
}

/// Paged envelope for `GET /servers`.
#[derive(Debug, Deserialize)]
pub(crate) struct ServerPage {
    pub data: Vec<RawServerData>,
    pub meta: PageMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
}

/// Install script metadata for the one-shot installer container.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationScript {
    pub container_image: String,
    pub entrypoint: String,
    pub script: String,
}

/// Presigned multipart upload descriptor for a remote backup.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupUploadUrls {
    pub upload_id: String,
    pub part_urls: Vec<String>,
    pub part_size: u64,
}

/// Credentials forwarded from the SFTP frontend.
#[derive(Debug, Clone, Serialize)]
pub struct SftpAuthRequest {
    #[serde(rename = "username")]
    pub user: String,
    pub password: String,
    pub ip: String,
}

/// Result of a successful credential check.
#[derive(Debug, Clone, Deserialize)]
pub struct SftpAuthResponse {
    pub server: String,
    pub token: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Body for `POST /backups/:uuid` completion reports.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub checksum: String,
    pub checksum_type: String,
    pub size: u64,
    pub successful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}
