// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power-state persistence for crash recovery.
//!
//! One JSON file maps instance id → power state. Writes are
//! best-effort under a single mutex; a missing file reads as empty and
//! any id not present is `offline`. The container runtime remains
//! authoritative — this file only seeds the view at boot.

use parking_lot::Mutex;
use quay_core::PowerState;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Read the whole map; missing or corrupt files read as empty.
    pub fn all(&self) -> HashMap<String, PowerState> {
        let _guard = self.lock.lock();
        self.read()
    }

    /// The recorded state for one instance, `offline` when absent.
    pub fn get(&self, id: &str) -> PowerState {
        self.all().get(id).copied().unwrap_or_default()
    }

    /// Record a state; best-effort, failures are logged and swallowed.
    pub fn set(&self, id: &str, state: PowerState) {
        let _guard = self.lock.lock();
        let mut map = self.read();
        map.insert(id.to_string(), state);
        self.write(&map);
    }

    /// Drop an instance from the file.
    pub fn remove(&self, id: &str) {
        let _guard = self.lock.lock();
        let mut map = self.read();
        if map.remove(id).is_some() {
            self.write(&map);
        }
    }

    fn read(&self) -> HashMap<String, PowerState> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    fn write(&self, map: &HashMap<String, PowerState>) {
        let Ok(raw) = serde_json::to_string(map) else { return };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(err) = std::fs::write(&self.path, raw) {
            tracing::warn!(path = %self.path.display(), %err, "failed to persist states file");
        }
    }
}

#[cfg(test)]
#[path = "states_tests.rs"]
mod tests;
