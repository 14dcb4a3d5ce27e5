// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote backups: the archive is staged locally, then streamed to the
//! control plane's presigned part URLs with a sha1 computed over the
//! bytes as they go out. The staging file never outlives the upload.

use crate::backup::{BackupOutcome, Sha1Writer};
use crate::error::ServerError;
use crate::server::Server;
use quay_adapters::ContainerRuntime;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::BufWriter;
use tokio::io::AsyncReadExt;

pub(super) async fn generate<R: ContainerRuntime>(
    server: &Server<R>,
    backup_uuid: &str,
    ignore: &str,
) -> Result<BackupOutcome, ServerError> {
    let dir = server.inner.settings.backups_dir();
    let path = dir.join(format!("{backup_uuid}.tar.gz"));

    // stage the archive so the total size is known before requesting
    // part URLs
    let staged = {
        let fs = server.inner.fs.clone();
        let dir = dir.clone();
        let path = path.clone();
        let ignore = ignore.to_string();
        tokio::task::spawn_blocking(move || -> Result<u64, ServerError> {
            std::fs::create_dir_all(&dir).map_err(quay_fs::FsError::Io)?;
            let file = File::create(&path).map_err(quay_fs::FsError::Io)?;
            let writer = Sha1Writer::new(BufWriter::new(file));
            let ignore = (!ignore.is_empty()).then_some(ignore.as_str());
            let writer = fs.archive_to(writer, ignore)?;
            let (_checksum, size) = writer.finish().map_err(quay_fs::FsError::Io)?;
            Ok(size)
        })
        .await
        .map_err(|e| quay_adapters::RuntimeError::Api(e.to_string()))?
    };

    let result = match staged {
        Ok(size) => upload(server, backup_uuid, &path, size).await,
        Err(err) => Err(err),
    };

    if let Err(err) = tokio::fs::remove_file(&path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), %err, "failed to remove staged backup");
        }
    }
    result
}

async fn upload<R: ContainerRuntime>(
    server: &Server<R>,
    backup_uuid: &str,
    path: &std::path::Path,
    size: u64,
) -> Result<BackupOutcome, ServerError> {
    let urls = server.inner.remote.backup_upload_urls(backup_uuid, size).await?;
    let part_size = urls.part_size.max(1) as usize;

    let mut file = tokio::fs::File::open(path).await.map_err(quay_fs::FsError::Io)?;
    let mut hasher = Sha1::new();
    let mut part_index = 0usize;

    loop {
        let mut part = vec![0u8; part_size];
        let mut filled = 0usize;
        while filled < part_size {
            let read =
                file.read(&mut part[filled..]).await.map_err(quay_fs::FsError::Io)?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            break;
        }
        part.truncate(filled);
        hasher.update(&part);

        let url = urls.part_urls.get(part_index).ok_or_else(|| {
            quay_adapters::RuntimeError::Api(format!(
                "upload needs more than {} parts",
                urls.part_urls.len()
            ))
        })?;
        server.inner.remote.upload_backup_part(url, part).await?;
        part_index += 1;

        if filled < part_size {
            break;
        }
    }

    let checksum = hex::encode(hasher.finalize());
    tracing::info!(
        backup = %backup_uuid,
        size,
        parts = part_index,
        upload_id = %urls.upload_id,
        "remote backup uploaded"
    );
    Ok(BackupOutcome { checksum, size, upload_id: Some(urls.upload_id) })
}
