// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`ContainerSpec`] → Docker create/update payloads.

use crate::spec::{ContainerSpec, SpecResources, DROPPED_CAPABILITIES};
use bollard::container::{Config, UpdateContainerOptions};
use bollard::models::{HostConfig, PortBinding};
use std::collections::HashMap;

pub(super) fn container_config(spec: &ContainerSpec) -> Config<String> {
    let mut exposed: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for (ip, port) in &spec.allocations {
        for proto in ["tcp", "udp"] {
            let key = format!("{port}/{proto}");
            exposed.insert(key.clone(), HashMap::new());
            if let Some(list) =
                bindings.entry(key).or_insert_with(|| Some(Vec::new())).as_mut()
            {
                list.push(PortBinding {
                    host_ip: Some(ip.clone()),
                    host_port: Some(port.to_string()),
                });
            }
        }
    }

    let mut binds =
        vec![format!("{}:{}", spec.data_dir.display(), spec.data_dir_target)];
    for mount in &spec.mounts {
        let suffix = if mount.read_only { ":ro" } else { "" };
        binds.push(format!("{}:{}{suffix}", mount.source, mount.target));
    }

    let tmpfs = HashMap::from([(
        "/tmp".to_string(),
        format!("rw,exec,nosuid,size={}M", spec.tmpfs_size_mib),
    )]);

    let log_config = bollard::models::HostConfigLogConfig {
        typ: Some("json-file".to_string()),
        config: Some(HashMap::from([
            ("max-size".to_string(), "5m".to_string()),
            ("max-file".to_string(), "1".to_string()),
        ])),
    };

    let resources = &spec.resources;
    let host_config = HostConfig {
        binds: Some(binds),
        tmpfs: Some(tmpfs),
        port_bindings: Some(bindings),
        network_mode: Some(spec.network_mode.clone()),
        memory: positive(resources.memory),
        memory_reservation: positive(resources.memory_reservation),
        memory_swap: (resources.memory_swap != 0).then_some(resources.memory_swap),
        cpu_quota: (resources.cpu_quota > 0).then_some(resources.cpu_quota),
        cpu_period: (resources.cpu_quota > 0).then_some(resources.cpu_period),
        cpu_shares: Some(resources.cpu_shares),
        cpuset_cpus: resources.cpuset.clone(),
        blkio_weight: Some(resources.io_weight),
        oom_kill_disable: Some(resources.oom_kill_disable),
        pids_limit: positive(resources.pids_limit),
        privileged: Some(spec.privileged),
        readonly_rootfs: Some(spec.readonly_rootfs),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        cap_drop: Some(
            DROPPED_CAPABILITIES.iter().map(|c| c.to_uppercase()).collect(),
        ),
        log_config: Some(log_config),
        ..Default::default()
    };

    Config {
        hostname: Some(spec.id.clone()),
        user: (!spec.user.is_empty()).then(|| spec.user.clone()),
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        env: Some(spec.env.clone()),
        exposed_ports: Some(exposed),
        attach_stdin: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        open_stdin: Some(true),
        tty: Some(true),
        labels: Some(spec.labels.iter().cloned().collect()),
        host_config: Some(host_config),
        ..Default::default()
    }
}

pub(super) fn update_options(resources: &SpecResources) -> UpdateContainerOptions<String> {
    UpdateContainerOptions {
        memory: positive(resources.memory),
        memory_reservation: positive(resources.memory_reservation),
        memory_swap: (resources.memory_swap != 0).then_some(resources.memory_swap),
        cpu_quota: (resources.cpu_quota > 0).then_some(resources.cpu_quota),
        cpu_period: (resources.cpu_quota > 0).then_some(resources.cpu_period),
        cpu_shares: Some(resources.cpu_shares as isize),
        cpuset_cpus: resources.cpuset.clone(),
        blkio_weight: Some(resources.io_weight),
        pids_limit: positive(resources.pids_limit),
        ..Default::default()
    }
}

fn positive(value: i64) -> Option<i64> {
    (value > 0).then_some(value)
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod tests;
