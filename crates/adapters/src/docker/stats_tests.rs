// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn frame(value: serde_json::Value) -> Stats {
    serde_json::from_value(value).unwrap()
}

fn base_frame() -> serde_json::Value {
    json!({
        "read": "2026-01-01T00:00:01Z",
        "preread": "2026-01-01T00:00:00Z",
        "num_procs": 0,
        "pids_stats": {},
        "blkio_stats": {},
        "storage_stats": {},
        "memory_stats": {"usage": 536870912u64, "limit": 1073741824u64},
        "cpu_stats": {
            "cpu_usage": {
                "total_usage": 2000000u64,
                "usage_in_usermode": 0,
                "usage_in_kernelmode": 0
            },
            "system_cpu_usage": 10000000u64,
            "online_cpus": 2,
            "throttling_data": {"periods": 0, "throttled_periods": 0, "throttled_time": 0}
        },
        "precpu_stats": {
            "cpu_usage": {
                "total_usage": 1000000u64,
                "usage_in_usermode": 0,
                "usage_in_kernelmode": 0
            },
            "system_cpu_usage": 6000000u64,
            "throttling_data": {"periods": 0, "throttled_periods": 0, "throttled_time": 0}
        },
        "networks": {
            "eth0": {
                "rx_bytes": 1000u64, "rx_dropped": 0, "rx_errors": 0, "rx_packets": 0,
                "tx_bytes": 2000u64, "tx_dropped": 0, "tx_errors": 0, "tx_packets": 0
            },
            "eth1": {
                "rx_bytes": 50u64, "rx_dropped": 0, "rx_errors": 0, "rx_packets": 0,
                "tx_bytes": 70u64, "tx_dropped": 0, "tx_errors": 0, "tx_packets": 0
            }
        }
    })
}

#[test]
fn memory_and_networks_are_summed() {
    let sample = sample_from(&frame(base_frame()));
    assert_eq!(sample.memory_bytes, 536870912);
    assert_eq!(sample.memory_limit_bytes, 1073741824);
    assert_eq!(sample.network_rx_bytes, 1050);
    assert_eq!(sample.network_tx_bytes, 2070);
}

#[test]
fn cpu_percentage_uses_deltas_and_core_count() {
    let sample = sample_from(&frame(base_frame()));
    // delta 1e6 over system delta 4e6 on 2 cores = 50%
    assert_eq!(sample.cpu_absolute, 50.0);
}

#[test]
fn first_frame_without_precpu_reads_zero_cpu() {
    let mut value = base_frame();
    value["precpu_stats"]["system_cpu_usage"] = json!(null);
    value["precpu_stats"]["cpu_usage"]["total_usage"] = json!(0u64);
    value["cpu_stats"]["system_cpu_usage"] = json!(null);

    let sample = sample_from(&frame(value));
    assert_eq!(sample.cpu_absolute, 0.0);
}

#[test]
fn missing_networks_read_zero() {
    let mut value = base_frame();
    value["networks"] = json!(null);
    let sample = sample_from(&frame(value));
    assert_eq!(sample.network_rx_bytes, 0);
    assert_eq!(sample.network_tx_bytes, 0);
}
