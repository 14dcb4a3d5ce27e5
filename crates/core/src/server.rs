// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-instance configuration snapshot.
//!
//! The control plane owns this data; the daemon caches one
//! [`ServerConfiguration`] per instance and merges pushed updates into
//! it. Most fields merge structurally, but a handful have meaningful
//! "empty" values (cpu 0 = unlimited, booleans, the env and mapping
//! collections) and are read from the incoming JSON explicitly.

use crate::scalar::Scalar;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reservable (ip, port) pair exposed on the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Allocation {
    pub ip: String,
    pub port: u16,
}

/// All network allocations for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Allocations {
    /// The first-class allocation, exposed as `SERVER_IP`/`SERVER_PORT`.
    #[serde(default)]
    pub default: Allocation,
    /// Additional ip → ports bindings.
    #[serde(default)]
    pub mappings: IndexMap<String, Vec<u16>>,
}

impl Allocations {
    /// Iterate every (ip, port) pair, default first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        std::iter::once((self.default.ip.as_str(), self.default.port))
            .chain(
                self.mappings
                    .iter()
                    .flat_map(|(ip, ports)| ports.iter().map(move |p| (ip.as_str(), *p))),
            )
            .filter(|(_, port)| *port > 0)
    }
}

/// A custom bind mount. Host sources must be whitelisted by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Resource limits as the control plane declares them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLimits {
    /// Memory limit in MiB. 0 = unlimited.
    #[serde(default)]
    pub memory_limit: i64,
    /// Swap in MiB. Negative = unlimited swap.
    #[serde(default)]
    pub swap: i64,
    /// Block IO weight, 10–1000.
    #[serde(default = "default_io_weight")]
    pub io_weight: u16,
    /// CPU limit in permille of one core. 0 = unlimited.
    #[serde(default)]
    pub cpu_limit: i64,
    /// Disk quota in MiB. 0 = unlimited.
    #[serde(default)]
    pub disk_space: u64,
    /// Pinned CPU set (e.g. `0,2-4`), empty = no pinning.
    #[serde(default)]
    pub threads: String,
}

fn default_io_weight() -> u16 {
    500
}

impl Default for BuildLimits {
    fn default() -> Self {
        Self {
            memory_limit: 0,
            swap: 0,
            io_weight: default_io_weight(),
            cpu_limit: 0,
            disk_space: 0,
            threads: String::new(),
        }
    }
}

impl BuildLimits {
    /// Declared memory limit in bytes.
    pub fn memory_bytes(&self) -> i64 {
        self.memory_limit * 1024 * 1024
    }

    /// Disk quota in bytes, 0 = unlimited.
    pub fn disk_bytes(&self) -> u64 {
        self.disk_space * 1024 * 1024
    }

    /// Memory+swap in bytes: -1 when swap is unlimited.
    pub fn memory_swap_bytes(&self) -> i64 {
        if self.swap < 0 {
            -1
        } else {
            (self.memory_limit + self.swap) * 1024 * 1024
        }
    }
}

/// Container settings for the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContainerSettings {
    pub image: String,
    /// Disable the kernel OOM killer for this container.
    #[serde(default)]
    pub oom_disabled: bool,
}

/// The cached instance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    pub uuid: String,
    #[serde(default)]
    pub suspended: bool,
    /// Startup command template; `{{VAR}}` refers to environment values.
    #[serde(default)]
    pub invocation: String,
    #[serde(default)]
    pub environment: IndexMap<String, Scalar>,
    #[serde(default)]
    pub build: BuildLimits,
    #[serde(default)]
    pub container: ContainerSettings,
    #[serde(default)]
    pub allocations: Allocations,
    #[serde(default)]
    pub mounts: Vec<Mount>,
    #[serde(default = "default_true")]
    pub crash_detection_enabled: bool,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

fn default_true() -> bool {
    true
}

/// Failure merging a control-plane update into the snapshot.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("configuration update is not a JSON object")]
    NotAnObject,
    #[error("configuration serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerConfiguration {
    /// Merge a pushed JSON update into this snapshot.
    ///
    /// Structural merge for most fields; env vars and allocation mappings
    /// replace wholesale when the incoming block is non-empty, and the
    /// boolean / zero-meaningful fields are read from the patch directly.
    pub fn merge_update(&mut self, patch: &serde_json::Value) -> Result<(), MergeError> {
        if !patch.is_object() {
            return Err(MergeError::NotAnObject);
        }

        let mut base = serde_json::to_value(&*self)?;
        deep_merge(&mut base, patch);
        let mut merged: ServerConfiguration = serde_json::from_value(base)?;

        if let Some(env) = patch.get("environment").and_then(|v| v.as_object()) {
            if !env.is_empty() {
                merged.environment =
                    serde_json::from_value(serde_json::Value::Object(env.clone()))?;
            }
        }
        if let Some(mappings) = patch.pointer("/allocations/mappings").and_then(|v| v.as_object())
        {
            if !mappings.is_empty() {
                merged.allocations.mappings =
                    serde_json::from_value(serde_json::Value::Object(mappings.clone()))?;
            }
        }

        if let Some(b) = patch.get("suspended").and_then(serde_json::Value::as_bool) {
            merged.suspended = b;
        }
        if let Some(b) = patch.pointer("/container/oom_disabled").and_then(serde_json::Value::as_bool)
        {
            merged.container.oom_disabled = b;
        }
        if let Some(b) = patch.get("crash_detection_enabled").and_then(serde_json::Value::as_bool)
        {
            merged.crash_detection_enabled = b;
        }
        if let Some(n) = patch.pointer("/build/cpu_limit").and_then(serde_json::Value::as_i64) {
            merged.build.cpu_limit = n;
        }
        if let Some(n) = patch.pointer("/build/memory_limit").and_then(serde_json::Value::as_i64) {
            merged.build.memory_limit = n;
        }
        if let Some(n) = patch.pointer("/build/swap").and_then(serde_json::Value::as_i64) {
            merged.build.swap = n;
        }

        *self = merged;
        Ok(())
    }
}

/// Recursively merge `patch` into `base`: objects merge per key,
/// everything else is replaced.
fn deep_merge(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
