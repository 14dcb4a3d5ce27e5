// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local backups: one tar.gz per backup under the node backup dir.

use crate::backup::{BackupOutcome, Sha1Writer};
use crate::error::ServerError;
use crate::server::Server;
use quay_adapters::ContainerRuntime;
use std::fs::File;
use std::io::BufWriter;

pub(super) async fn generate<R: ContainerRuntime>(
    server: &Server<R>,
    backup_uuid: &str,
    ignore: &str,
) -> Result<BackupOutcome, ServerError> {
    let dir = server.inner.settings.backups_dir();
    let path = dir.join(format!("{backup_uuid}.tar.gz"));
    let fs = server.inner.fs.clone();
    let ignore = ignore.to_string();

    let (checksum, size) = tokio::task::spawn_blocking(
        move || -> Result<(String, u64), ServerError> {
            std::fs::create_dir_all(&dir).map_err(quay_fs::FsError::Io)?;
            let file = File::create(&path).map_err(quay_fs::FsError::Io)?;
            let writer = Sha1Writer::new(BufWriter::new(file));
            let ignore = (!ignore.is_empty()).then_some(ignore.as_str());
            let writer = fs.archive_to(writer, ignore)?;
            Ok(writer.finish().map_err(quay_fs::FsError::Io)?)
        },
    )
    .await
    .map_err(|e| quay_adapters::RuntimeError::Api(e.to_string()))??;

    tracing::info!(backup = %backup_uuid, size, %checksum, "local backup complete");
    Ok(BackupOutcome { checksum, size, upload_id: None })
}
