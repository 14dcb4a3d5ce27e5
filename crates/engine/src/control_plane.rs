// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The slice of the control plane the engine consumes, as a trait so
//! instance semantics are testable without a panel.

use async_trait::async_trait;
use quay_remote::{BackupUploadUrls, InstallationScript, RawServerData, RemoteError};

#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    async fn list_servers(&self) -> Result<Vec<RawServerData>, RemoteError>;

    async fn server_configuration(&self, uuid: &str) -> Result<RawServerData, RemoteError>;

    async fn install_script(&self, uuid: &str) -> Result<InstallationScript, RemoteError>;

    async fn report_install_status(&self, uuid: &str, successful: bool)
        -> Result<(), RemoteError>;

    async fn backup_upload_urls(
        &self,
        backup_id: &str,
        size: u64,
    ) -> Result<BackupUploadUrls, RemoteError>;

    async fn report_backup_status(
        &self,
        backup_id: &str,
        checksum: &str,
        size: u64,
        successful: bool,
        upload_id: Option<String>,
    ) -> Result<(), RemoteError>;

    async fn upload_backup_part(
        &self,
        url: &str,
        part: Vec<u8>,
    ) -> Result<Option<String>, RemoteError>;
}

#[async_trait]
impl ControlPlane for quay_remote::Client {
    async fn list_servers(&self) -> Result<Vec<RawServerData>, RemoteError> {
        quay_remote::Client::list_servers(self).await
    }

    async fn server_configuration(&self, uuid: &str) -> Result<RawServerData, RemoteError> {
        quay_remote::Client::server_configuration(self, uuid).await
    }

    async fn install_script(&self, uuid: &str) -> Result<InstallationScript, RemoteError> {
        quay_remote::Client::install_script(self, uuid).await
    }

    async fn report_install_status(
        &self,
        uuid: &str,
        successful: bool,
    ) -> Result<(), RemoteError> {
        quay_remote::Client::report_install_status(self, uuid, successful).await
    }

    async fn backup_upload_urls(
        &self,
        backup_id: &str,
        size: u64,
    ) -> Result<BackupUploadUrls, RemoteError> {
        quay_remote::Client::backup_upload_urls(self, backup_id, size).await
    }

    async fn report_backup_status(
        &self,
        backup_id: &str,
        checksum: &str,
        size: u64,
        successful: bool,
        upload_id: Option<String>,
    ) -> Result<(), RemoteError> {
        quay_remote::Client::report_backup_status(
            self, backup_id, checksum, size, successful, upload_id,
        )
        .await
    }

    async fn upload_backup_part(
        &self,
        url: &str,
        part: Vec<u8>,
    ) -> Result<Option<String>, RemoteError> {
        quay_remote::Client::upload_backup_part(self, url, part).await
    }
}
