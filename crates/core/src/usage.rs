// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource usage snapshots published on the `stats` topic.

use crate::state::PowerState;
use serde::{Deserialize, Serialize};

/// A point-in-time view of an instance's resource consumption.
///
/// Everything except `disk_bytes` is zeroed when the instance goes
/// offline; disk usage survives because it is tracked by the daemon,
/// not the container runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub state: PowerState,
    pub memory_bytes: u64,
    pub memory_limit_bytes: u64,
    /// CPU usage as an absolute percentage (100 = one full core).
    pub cpu_absolute: f64,
    pub disk_bytes: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    /// Milliseconds since the container started, 0 when offline.
    pub uptime_ms: u64,
}

impl ResourceUsage {
    /// Reset everything the runtime reports, keeping daemon-tracked disk.
    pub fn reset(&mut self) {
        let disk = self.disk_bytes;
        *self = ResourceUsage { state: self.state, disk_bytes: disk, ..Default::default() };
    }
}
