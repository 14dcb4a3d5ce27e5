// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node information.

use super::AppState;
use axum::extract::State;
use axum::Json;
use quay_adapters::ContainerRuntime;

pub(super) async fn info<R: ContainerRuntime>(
    State(_state): State<AppState<R>>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "quay",
        "version": env!("CARGO_PKG_VERSION"),
        "os": std::env::consts::OS,
        "architecture": std::env::consts::ARCH,
        "kernel_version": kernel_release().unwrap_or_default(),
        "cpu_count": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(0),
        "memory_free_bytes": free_memory_bytes().unwrap_or(0),
    }))
}

fn kernel_release() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|s| s.trim().to_string())
}

/// `MemAvailable` from /proc/meminfo, in bytes.
fn free_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            let kib: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kib * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meminfo_parsing_survives_a_missing_field() {
        // on linux this returns a value, elsewhere it degrades to None
        let _ = free_memory_bytes();
        let _ = kernel_release();
    }
}
