// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP client itself.

use crate::error::RemoteError;
use crate::types::{
    BackupStatus, BackupUploadUrls, InstallationScript, RawServerData, ServerPage,
    SftpAuthRequest, SftpAuthResponse,
};
use crate::redact_token;
use std::time::Duration;

const ACCEPT: &str = "application/vnd.quay.v1+json";
const USER_AGENT: &str = concat!("Quay/", env!("CARGO_PKG_VERSION"));

/// Authenticated control-plane client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base: String,
    authorization: String,
}

impl Client {
    /// Build a client for `base` (the panel origin, no trailing slash)
    /// with a `token_id.token` bearer pair.
    pub fn new(
        base: impl Into<String>,
        token_id: &str,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(30)))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            authorization: format!("Bearer {token_id}.{token}"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/remote{path}", self.base)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = self.url(path);
        tracing::debug!(
            %method,
            %url,
            authorization = %redact_token(&self.authorization),
            "control plane request"
        );
        self.http
            .request(method, url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_response(status.as_u16(), &body))
    }

    /// Fetch every server assigned to this node, draining all pages.
    pub async fn list_servers(&self) -> Result<Vec<RawServerData>, RemoteError> {
        let mut servers = Vec::new();
        let mut page = 1u32;
        loop {
            let response = self
                .request(reqwest::Method::GET, "/servers")
                .query(&[("page", page.to_string()), ("per_page", "50".to_string())])
                .send()
                .await?;
            let parsed: ServerPage = Self::check(response).await?.json().await?;
            servers.extend(parsed.data);
            if parsed.meta.current_page >= parsed.meta.last_page {
                break;
            }
            page = parsed.meta.current_page + 1;
        }
        tracing::debug!(count = servers.len(), "fetched server list");
        Ok(servers)
    }

    /// Fetch one server's configuration.
    pub async fn server_configuration(&self, uuid: &str) -> Result<RawServerData, RemoteError> {
        let response =
            self.request(reqwest::Method::GET, &format!("/servers/{uuid}")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the install script for a server.
    pub async fn install_script(&self, uuid: &str) -> Result<InstallationScript, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/servers/{uuid}/install"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Report whether the install script succeeded.
    pub async fn report_install_status(
        &self,
        uuid: &str,
        successful: bool,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/servers/{uuid}/install"))
            .json(&serde_json::json!({"successful": successful}))
            .send()
            .await?;
        Self::check(response).await.map(drop)
    }

    /// Report whether a transfer archive was produced.
    pub async fn report_archive_status(
        &self,
        uuid: &str,
        successful: bool,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/servers/{uuid}/archive"))
            .json(&serde_json::json!({"successful": successful}))
            .send()
            .await?;
        Self::check(response).await.map(drop)
    }

    /// Report the terminal state of a transfer.
    pub async fn report_transfer_status(
        &self,
        uuid: &str,
        successful: bool,
    ) -> Result<(), RemoteError> {
        let suffix = if successful { "success" } else { "failure" };
        let response = self
            .request(reqwest::Method::GET, &format!("/servers/{uuid}/transfer/{suffix}"))
            .send()
            .await?;
        Self::check(response).await.map(drop)
    }

    /// Ask for presigned multipart upload URLs for a backup of `size` bytes.
    pub async fn backup_upload_urls(
        &self,
        backup_id: &str,
        size: u64,
    ) -> Result<BackupUploadUrls, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/backups/{backup_id}"))
            .query(&[("size", size.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Report a backup's terminal state.
    pub async fn report_backup_status(
        &self,
        backup_id: &str,
        checksum: &str,
        size: u64,
        successful: bool,
        upload_id: Option<String>,
    ) -> Result<(), RemoteError> {
        let body = BackupStatus {
            checksum: checksum.to_string(),
            checksum_type: "sha1".to_string(),
            size,
            successful,
            upload_id,
        };
        let response = self
            .request(reqwest::Method::POST, &format!("/backups/{backup_id}"))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await.map(drop)
    }

    /// Validate SFTP credentials; 403 maps to the typed
    /// invalid-credentials failure.
    pub async fn validate_sftp_credentials(
        &self,
        request: SftpAuthRequest,
    ) -> Result<SftpAuthResponse, RemoteError> {
        let response =
            self.request(reqwest::Method::POST, "/sftp/auth").json(&request).send().await?;
        let status = response.status().as_u16();
        if status == 403 || status == 401 {
            return Err(RemoteError::InvalidCredentials);
        }
        Ok(Self::check(response).await?.json().await?)
    }

    /// Pre-upgrade WebSocket token validation; anything but 204
    /// rejects the upgrade.
    pub async fn validate_websocket_token(
        &self,
        token: &str,
        server_uuid: &str,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/websocket/{token}"))
            .json(&serde_json::json!({"server_uuid": server_uuid}))
            .send()
            .await?;
        if response.status().as_u16() == 204 {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::from_response(status, &body))
        }
    }

    /// Raw `PUT` of one backup part to a presigned URL.
    ///
    /// No panel auth headers: the URL itself carries the grant.
    /// Returns the `ETag` when the storage backend provides one.
    pub async fn upload_backup_part(
        &self,
        url: &str,
        part: Vec<u8>,
    ) -> Result<Option<String>, RemoteError> {
        let length = part.len();
        let response = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .header(reqwest::header::CONTENT_TYPE, "application/x-gzip")
            .body(part)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}
