// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level settings shared by every instance on the node.

use quay_adapters::NodeSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Console throttler knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub enabled: bool,
    /// Lines allowed per window.
    pub lines: u64,
    pub line_reset_interval_ms: u64,
    /// Strikes before the instance is forcibly stopped.
    pub maximum_trigger_count: u32,
    /// Idle time after which a strike decays.
    pub decay_interval_ms: u64,
    /// Grace between the forced stop and the kill.
    pub stop_grace_period_s: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lines: 2000,
            line_reset_interval_ms: 100,
            maximum_trigger_count: 5,
            decay_interval_ms: 10_000,
            stop_grace_period_s: 15,
        }
    }
}

/// Crash detection knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashSettings {
    /// Exit code 0 still counts as a crash when set.
    pub detect_clean_exit_as_crash: bool,
    /// Two crashes within this window suppress the restart.
    pub timeout_seconds: u64,
}

impl Default for CrashSettings {
    fn default() -> Self {
        Self { detect_clean_exit_as_crash: true, timeout_seconds: 60 }
    }
}

/// Everything the engine needs to know about this node.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Root data directory: `volumes/`, `backups/`, `archives/`,
    /// `states.json` live under it.
    pub data_root: PathBuf,
    /// Install logs land in `<log_dir>/install/<id>.log`.
    pub log_dir: PathBuf,
    pub node: NodeSettings,
    pub throttle: ThrottleSettings,
    pub crash: CrashSettings,
    /// TTL for the per-instance disk usage cache.
    pub disk_check_interval: Duration,
    /// Chown the data root during pre-start.
    pub check_permissions_on_boot: bool,
    /// Grace a `stop` action waits before escalating.
    pub stop_grace: Duration,
    /// Ceiling for the stop half of a restart.
    pub restart_stop_grace: Duration,
    /// JSON view of the daemon configuration for `{{config.*}}`
    /// placeholder resolution.
    pub config_snapshot: serde_json::Value,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("/var/lib/quay"),
            log_dir: PathBuf::from("/var/log/quay"),
            node: NodeSettings::default(),
            throttle: ThrottleSettings::default(),
            crash: CrashSettings::default(),
            disk_check_interval: Duration::from_secs(150),
            check_permissions_on_boot: true,
            stop_grace: Duration::from_secs(60),
            restart_stop_grace: Duration::from_secs(600),
            config_snapshot: serde_json::Value::Null,
        }
    }
}

impl EngineSettings {
    pub fn volumes_dir(&self) -> PathBuf {
        self.data_root.join("volumes")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_root.join("backups")
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.data_root.join("archives")
    }

    pub fn states_path(&self) -> PathBuf {
        self.data_root.join("states.json")
    }

    pub fn server_data_dir(&self, id: &str) -> PathBuf {
        self.volumes_dir().join(id)
    }

    pub fn install_log_path(&self, id: &str) -> PathBuf {
        self.log_dir.join("install").join(format!("{id}.log"))
    }
}
