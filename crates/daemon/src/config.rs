// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's YAML configuration file.
//!
//! The control plane writes most of this during node provisioning;
//! operators tweak the rest. A JSON snapshot of the whole structure
//! backs `{{config.*}}` placeholders in config rewrites.

use quay_adapters::NodeSettings;
use quay_engine::{CrashSettings, EngineSettings, ThrottleSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the API listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

/// How to reach and authenticate against the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemoteSettings {
    pub url: String,
    pub token_id: String,
    pub token: String,
    /// Request timeout in seconds; 0 uses the 30s default.
    pub timeout: u64,
}

/// Node filesystem layout and ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub data: PathBuf,
    pub log_directory: PathBuf,
    /// Seconds between disk usage walks per instance.
    pub disk_check_interval: u64,
    pub check_permissions_on_boot: bool,
    /// Grace for a `stop` action before escalation, seconds.
    pub stop_grace_period: u64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            data: PathBuf::from("/var/lib/quay"),
            log_directory: PathBuf::from("/var/log/quay"),
            disk_check_interval: 150,
            check_permissions_on_boot: true,
            stop_grace_period: 60,
        }
    }
}

/// The full daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    pub api: ApiSettings,
    pub remote: RemoteSettings,
    pub system: SystemSettings,
    pub docker: NodeSettings,
    pub throttles: ThrottleSettings,
    pub crash_detection: CrashSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("configuration is missing remote.url or the auth token pair")]
    MissingRemote,
}

impl DaemonConfig {
    /// Load and validate the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: DaemonConfig = serde_yaml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        if config.remote.url.is_empty()
            || config.remote.token_id.is_empty()
            || config.remote.token.is_empty()
        {
            return Err(ConfigError::MissingRemote);
        }
        Ok(config)
    }

    /// The bearer value inbound API requests must present.
    pub fn api_authorization(&self) -> String {
        format!("Bearer {}.{}", self.remote.token_id, self.remote.token)
    }

    pub fn remote_timeout(&self) -> Option<Duration> {
        (self.remote.timeout > 0).then(|| Duration::from_secs(self.remote.timeout))
    }

    /// Project into the engine's settings.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            data_root: self.system.data.clone(),
            log_dir: self.system.log_directory.clone(),
            node: self.docker.clone(),
            throttle: self.throttles.clone(),
            crash: self.crash_detection.clone(),
            disk_check_interval: Duration::from_secs(self.system.disk_check_interval.max(1)),
            check_permissions_on_boot: self.system.check_permissions_on_boot,
            stop_grace: Duration::from_secs(self.system.stop_grace_period.max(1)),
            restart_stop_grace: Duration::from_secs(600),
            config_snapshot: serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
