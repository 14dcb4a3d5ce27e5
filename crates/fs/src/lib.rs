// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quay-fs: the path-safe filesystem layer for instance data.
//!
//! Every user-addressable path is resolved inside the instance root
//! before any operation touches disk; symlinks may be followed for
//! reads but never used to escape. Disk usage is cached and enforced
//! against the instance quota, and archives are checked for
//! decompression bombs before a single entry is written.

mod archive;
mod disk;
mod error;
mod ops;
mod path;

pub use archive::ExtractSummary;
pub use error::FsError;
pub use ops::{DirEntryInfo, FileStat};

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A filesystem rooted at one instance's data directory.
///
/// Cheap to clone; all state is shared behind an [`Arc`].
#[derive(Clone)]
pub struct Filesystem {
    inner: Arc<Inner>,
}

struct Inner {
    /// Canonicalized instance data root.
    root: PathBuf,
    uid: u32,
    gid: u32,
    /// Disk quota in bytes; 0 or negative = unlimited.
    disk_limit: AtomicI64,
    /// Cached usage in bytes.
    disk_used: AtomicI64,
    /// When the cache was last rebuilt by a full walk.
    last_lookup: Mutex<Option<Instant>>,
    /// True while a walker owns the cache.
    lookup_in_flight: AtomicBool,
    /// Serializes blocking refreshes.
    refresh_lock: Mutex<()>,
    check_interval: Duration,
}

impl Filesystem {
    /// Open (creating if needed) the data root for an instance.
    pub fn new(
        root: impl Into<PathBuf>,
        quota_bytes: i64,
        check_interval: Duration,
        uid: u32,
        gid: u32,
    ) -> Result<Self, FsError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self {
            inner: Arc::new(Inner {
                root,
                uid,
                gid,
                disk_limit: AtomicI64::new(quota_bytes),
                disk_used: AtomicI64::new(0),
                last_lookup: Mutex::new(None),
                lookup_in_flight: AtomicBool::new(false),
                refresh_lock: Mutex::new(()),
                check_interval,
            }),
        })
    }

    /// The canonical data root.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn uid(&self) -> u32 {
        self.inner.uid
    }

    pub fn gid(&self) -> u32 {
        self.inner.gid
    }

    /// Replace the quota after a configuration update.
    pub fn set_disk_limit(&self, quota_bytes: i64) {
        self.inner.disk_limit.store(quota_bytes, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) fn test_fs(dir: &Path) -> Filesystem {
    test_fs_with_quota(dir, 0)
}

#[cfg(test)]
pub(crate) fn test_fs_with_quota(dir: &Path, quota: i64) -> Filesystem {
    use std::os::unix::fs::MetadataExt;
    // uid/gid of the running test user so chown is a no-op
    let meta = std::fs::metadata(dir).unwrap();
    Filesystem::new(dir, quota, Duration::from_secs(60), meta.uid(), meta.gid()).unwrap()
}
