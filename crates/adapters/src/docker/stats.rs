// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw stats frames → [`ResourceSample`].

use crate::runtime::ResourceSample;
use bollard::container::Stats;

/// Decode one stats frame.
///
/// CPU is reported the way operators expect: an absolute percentage
/// where 100 means one full core, derived from the usage delta across
/// the sampling window.
pub(super) fn sample_from(stats: &Stats) -> ResourceSample {
    let memory_bytes = stats.memory_stats.usage.unwrap_or(0);
    let memory_limit_bytes = stats.memory_stats.limit.unwrap_or(0);

    let cpu_delta = stats
        .cpu_stats
        .cpu_usage
        .total_usage
        .saturating_sub(stats.precpu_stats.cpu_usage.total_usage) as f64;
    let system_delta = stats
        .cpu_stats
        .system_cpu_usage
        .unwrap_or(0)
        .saturating_sub(stats.precpu_stats.system_cpu_usage.unwrap_or(0))
        as f64;
    let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(0).max(1) as f64;

    let cpu_absolute = if system_delta > 0.0 && cpu_delta > 0.0 {
        round2((cpu_delta / system_delta) * online_cpus * 100.0)
    } else {
        0.0
    };

    let (network_rx_bytes, network_tx_bytes) = stats
        .networks
        .as_ref()
        .map(|networks| {
            networks.values().fold((0u64, 0u64), |(rx, tx), iface| {
                (rx + iface.rx_bytes, tx + iface.tx_bytes)
            })
        })
        .unwrap_or((0, 0));

    ResourceSample {
        memory_bytes,
        memory_limit_bytes,
        cpu_absolute,
        network_rx_bytes,
        network_tx_bytes,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
