// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk usage accounting.
//!
//! Usage is cached and refreshed by a full walk at most once per
//! check interval, with at most one walker in flight. Writers and
//! deleters adjust the counter atomically in between walks, so the
//! cache drifts only until the next refresh.

use crate::{Filesystem, FsError};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Instant;

impl Filesystem {
    /// Current usage in bytes.
    ///
    /// With `allow_stale`, the cached value is returned immediately
    /// and a background refresh is kicked off when the cache has
    /// expired (at most one at a time). Without it, an expired cache
    /// blocks on a walk.
    pub fn disk_usage(&self, allow_stale: bool) -> Result<u64, FsError> {
        if !self.cache_expired() {
            return Ok(self.cached_usage());
        }

        if allow_stale {
            let stale = self.cached_usage();
            if self
                .inner
                .lookup_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let fs = self.clone();
                std::thread::spawn(move || {
                    if let Err(err) = fs.walk_and_store() {
                        tracing::warn!(%err, root = %fs.root().display(), "disk walk failed");
                    }
                    fs.inner.lookup_in_flight.store(false, Ordering::SeqCst);
                });
            }
            return Ok(stale);
        }

        let _guard = self.inner.refresh_lock.lock();
        // Another blocking caller may have refreshed while we waited.
        if !self.cache_expired() {
            return Ok(self.cached_usage());
        }
        self.inner.lookup_in_flight.store(true, Ordering::SeqCst);
        let result = self.walk_and_store();
        self.inner.lookup_in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// The cached usage value without any refresh.
    pub fn cached_usage(&self) -> u64 {
        self.inner.disk_used.load(Ordering::SeqCst).max(0) as u64
    }

    /// Quota in bytes; `None` when unlimited.
    pub fn disk_limit(&self) -> Option<u64> {
        let limit = self.inner.disk_limit.load(Ordering::SeqCst);
        (limit > 0).then_some(limit as u64)
    }

    /// Whether `additional` more bytes would still fit in the quota.
    ///
    /// Uses the stale-tolerant read so hot write paths never block on
    /// a walk.
    pub fn has_space_for(&self, additional: i64) -> bool {
        let Some(limit) = self.disk_limit() else {
            return true;
        };
        let used = self.disk_usage(true).unwrap_or_else(|_| self.cached_usage());
        used.saturating_add(additional.max(0) as u64) <= limit
    }

    /// True when usage is within quota (or quota is unlimited).
    pub fn within_quota(&self) -> bool {
        self.has_space_for(0)
    }

    /// Force a blocking walk, e.g. at manager boot.
    pub fn refresh_usage(&self) -> Result<u64, FsError> {
        let _guard = self.inner.refresh_lock.lock();
        self.inner.lookup_in_flight.store(true, Ordering::SeqCst);
        let result = self.walk_and_store();
        self.inner.lookup_in_flight.store(false, Ordering::SeqCst);
        result
    }

    pub(crate) fn add_usage(&self, delta: i64) {
        self.inner.disk_used.fetch_add(delta, Ordering::SeqCst);
    }

    fn cache_expired(&self) -> bool {
        let last = self.inner.last_lookup.lock();
        match *last {
            Some(at) => at.elapsed() >= self.inner.check_interval,
            None => true,
        }
    }

    fn walk_and_store(&self) -> Result<u64, FsError> {
        let total = self.walk_dir(self.root())?;
        self.inner.disk_used.store(total as i64, Ordering::SeqCst);
        *self.inner.last_lookup.lock() = Some(Instant::now());
        Ok(total)
    }

    /// Sum file sizes under `dir`. Symlinks are resolved through the
    /// safe-path rule: escaping ones are skipped, in-root targets are
    /// counted but never recursed into.
    fn walk_dir(&self, dir: &Path) -> Result<u64, FsError> {
        let mut total = 0u64;
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else { continue };
            let path = entry.path();

            if file_type.is_symlink() {
                match self.safe_path(&path) {
                    Ok(resolved) => {
                        if let Ok(meta) = fs::metadata(&resolved) {
                            if meta.is_file() {
                                total += meta.len();
                            }
                        }
                    }
                    Err(_) => continue,
                }
            } else if file_type.is_dir() {
                total += self.walk_dir(&path)?;
            } else if let Ok(meta) = entry.metadata() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
#[path = "disk_tests.rs"]
mod tests;
