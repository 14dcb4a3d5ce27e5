// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container spec construction.
//!
//! Everything the runtime needs to create an instance container is
//! derived here from the instance configuration plus node settings, so
//! the Docker wiring itself stays declarative.

use quay_core::ServerConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment names the daemon owns; instance env may not override
/// them.
pub const RESERVED_ENV: [&str; 5] =
    ["TZ", "STARTUP", "SERVER_MEMORY", "SERVER_IP", "SERVER_PORT"];

/// Capabilities dropped from every instance container.
pub const DROPPED_CAPABILITIES: [&str; 10] = [
    "setpcap",
    "mknod",
    "audit_write",
    "net_raw",
    "dac_override",
    "fowner",
    "fsetid",
    "net_bind_service",
    "sys_chroot",
    "setfcap",
];

/// Node-level knobs that shape every container on this host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Uid the container process runs as.
    pub uid: u32,
    pub gid: u32,
    /// Host timezone passed through as `TZ`.
    pub timezone: String,
    /// Docker network containers join.
    pub network_mode: String,
    /// tmpfs size for `/tmp`, in MiB.
    pub tmpfs_size: u64,
    /// Hard cap on container pids; 0 disables the limit.
    pub container_pid_limit: i64,
    /// Host path prefixes that custom mounts may come from.
    pub allowed_mounts: Vec<String>,
    /// Memory-overhead multiplier thresholds: limit MiB → multiplier.
    /// The smallest threshold ≥ the limit wins.
    pub overhead: BTreeMap<u64, f64>,
    /// Multiplier when the limit exceeds every threshold.
    pub overhead_default: f64,
    /// Always pull images on boot, even when present locally.
    pub always_pull_images: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            uid: 988,
            gid: 988,
            timezone: "UTC".to_string(),
            network_mode: "quay0".to_string(),
            tmpfs_size: 100,
            container_pid_limit: 512,
            allowed_mounts: Vec::new(),
            overhead: BTreeMap::from([(2048, 1.15), (4096, 1.10)]),
            overhead_default: 1.05,
            always_pull_images: false,
        }
    }
}

impl NodeSettings {
    /// The multiplier applied to a declared memory limit.
    pub fn overhead_multiplier(&self, memory_limit_mib: u64) -> f64 {
        self.overhead
            .iter()
            .find(|(threshold, _)| memory_limit_mib <= **threshold)
            .map(|(_, multiplier)| *multiplier)
            .unwrap_or(self.overhead_default)
    }
}

/// A validated bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// Translated resource limits, in runtime units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecResources {
    /// Hard memory limit in bytes; 0 = unlimited.
    pub memory: i64,
    /// Soft reservation in bytes.
    pub memory_reservation: i64,
    /// Memory+swap in bytes; -1 = unlimited swap.
    pub memory_swap: i64,
    /// -1 when the cpu limit is unlimited.
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub cpu_shares: i64,
    pub io_weight: u16,
    pub cpuset: Option<String>,
    pub oom_kill_disable: bool,
    pub pids_limit: i64,
}

/// The full, runtime-agnostic container description.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name and hostname: the instance uuid.
    pub id: String,
    pub image: String,
    /// `uid:gid` the process runs as; empty = image default.
    pub user: String,
    /// Final `KEY=VALUE` list, reserved names first.
    pub env: Vec<String>,
    /// Instance data directory, mounted at `data_dir_target`.
    pub data_dir: PathBuf,
    pub data_dir_target: String,
    pub mounts: Vec<SpecMount>,
    /// Every (ip, port) to bind, tcp and udp.
    pub allocations: Vec<(String, u16)>,
    pub resources: SpecResources,
    pub tmpfs_size_mib: u64,
    pub network_mode: String,
    pub labels: Vec<(String, String)>,
    /// Override of the image command; empty keeps the image default.
    pub command: Vec<String>,
    /// One-shot installer containers run privileged with a writable
    /// rootfs; instance containers never do.
    pub privileged: bool,
    pub readonly_rootfs: bool,
}

impl ContainerSpec {
    /// Derive the container spec for an instance.
    pub fn from_configuration(
        config: &ServerConfiguration,
        data_dir: &Path,
        node: &NodeSettings,
    ) -> Self {
        let mut env: Vec<String> = vec![
            format!("TZ={}", node.timezone),
            format!("STARTUP={}", config.invocation),
            format!("SERVER_MEMORY={}", config.build.memory_limit),
            format!("SERVER_IP={}", config.allocations.default.ip),
            format!("SERVER_PORT={}", config.allocations.default.port),
        ];
        for (key, value) in &config.environment {
            if RESERVED_ENV.contains(&key.as_str()) {
                continue;
            }
            env.push(format!("{key}={value}"));
        }

        let mut mounts = Vec::new();
        for host_file in ["/etc/localtime", "/etc/timezone"] {
            if Path::new(host_file).exists() {
                mounts.push(SpecMount {
                    source: host_file.to_string(),
                    target: host_file.to_string(),
                    read_only: true,
                });
            }
        }
        for mount in &config.mounts {
            if is_mount_allowed(&mount.source, &node.allowed_mounts) {
                mounts.push(SpecMount {
                    source: mount.source.clone(),
                    target: mount.target.clone(),
                    read_only: mount.read_only,
                });
            } else {
                tracing::warn!(
                    source = %mount.source,
                    "skipping mount outside the allowed list"
                );
            }
        }

        let mut labels: Vec<(String, String)> =
            config.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        labels.push(("Service".to_string(), "Quay".to_string()));

        Self {
            id: config.uuid.clone(),
            image: config.container.image.clone(),
            user: format!("{}:{}", node.uid, node.gid),
            env,
            data_dir: data_dir.to_path_buf(),
            data_dir_target: "/home/container".to_string(),
            mounts,
            allocations: config
                .allocations
                .iter()
                .map(|(ip, port)| (ip.to_string(), port))
                .collect(),
            resources: translate_resources(config, node),
            tmpfs_size_mib: node.tmpfs_size,
            network_mode: node.network_mode.clone(),
            labels,
            command: Vec::new(),
            privileged: false,
            readonly_rootfs: true,
        }
    }
}

fn translate_resources(config: &ServerConfiguration, node: &NodeSettings) -> SpecResources {
    let build = &config.build;
    let limit_mib = build.memory_limit.max(0) as u64;

    let (memory, memory_reservation, memory_swap) = if limit_mib == 0 {
        (0, 0, if build.swap < 0 { -1 } else { 0 })
    } else {
        let multiplier = node.overhead_multiplier(limit_mib);
        let hard = ((limit_mib as f64) * multiplier) as i64 * 1024 * 1024;
        (hard, build.memory_bytes(), build.memory_swap_bytes())
    };

    SpecResources {
        memory,
        memory_reservation,
        memory_swap,
        cpu_quota: if build.cpu_limit > 0 { build.cpu_limit * 1000 } else { -1 },
        cpu_period: 100_000,
        cpu_shares: 1024,
        io_weight: build.io_weight,
        cpuset: (!build.threads.is_empty()).then(|| build.threads.clone()),
        oom_kill_disable: config.container.oom_disabled,
        pids_limit: node.container_pid_limit,
    }
}

/// A host source is allowed only when prefix-matched by an entry of
/// the node's allowed list.
fn is_mount_allowed(source: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|prefix| source.starts_with(prefix.as_str()))
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
