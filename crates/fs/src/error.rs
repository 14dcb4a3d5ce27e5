// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem error kinds.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// The resolved path would land outside the instance root.
    #[error("path resolves outside the instance root: {0}")]
    PathEscape(PathBuf),

    /// Writing the requested bytes would exceed the disk quota.
    #[error("not enough disk space available")]
    NotEnoughDiskSpace,

    /// A file operation was attempted against a directory.
    #[error("{0} is a directory")]
    IsDirectory(PathBuf),

    /// The instance data root itself cannot be deleted.
    #[error("refusing to delete the instance root")]
    DeleteRoot,

    /// Rename target already exists.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The archive could not be read in the expected format.
    #[error("unknown or corrupt archive: {0}")]
    ArchiveFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Quota-class failures (includes the decompression-bomb refusal).
    pub fn is_quota(&self) -> bool {
        matches!(self, FsError::NotEnoughDiskSpace)
    }

    pub fn is_path_escape(&self) -> bool {
        matches!(self, FsError::PathEscape(_))
    }
}
