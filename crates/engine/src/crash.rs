// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash detection with a debounce window.

use crate::settings::CrashSettings;
use parking_lot::Mutex;
use quay_adapters::ContainerStatus;
use quay_core::Clock;
use std::time::{Duration, Instant};

/// What to do about an abnormal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashDecision {
    /// Crash detection is off for this instance; tell the console.
    DetectionDisabled,
    /// Clean exit; nothing to do.
    NotACrash,
    /// Crashed, outside the debounce window: restart.
    Restart,
    /// Crashed again too quickly: report and leave it offline.
    TooFrequent,
}

/// Per-instance crash tracking.
pub struct CrashDetector<C: Clock> {
    clock: C,
    settings: CrashSettings,
    last_crash: Mutex<Option<Instant>>,
}

impl<C: Clock> CrashDetector<C> {
    pub fn new(settings: CrashSettings, clock: C) -> Self {
        Self { clock, settings, last_crash: Mutex::new(None) }
    }

    /// Interpret an exit observed right after `running`/`starting`.
    pub fn evaluate(&self, detection_enabled: bool, exit: &ContainerStatus) -> CrashDecision {
        if !detection_enabled {
            return CrashDecision::DetectionDisabled;
        }
        if exit.exit_code == 0
            && !exit.oom_killed
            && !self.settings.detect_clean_exit_as_crash
        {
            return CrashDecision::NotACrash;
        }

        let now = self.clock.now();
        let mut last = self.last_crash.lock();
        if let Some(previous) = *last {
            if now.duration_since(previous) < Duration::from_secs(self.settings.timeout_seconds)
            {
                *last = Some(now);
                return CrashDecision::TooFrequent;
            }
        }
        *last = Some(now);
        CrashDecision::Restart
    }
}

#[cfg(test)]
#[path = "crash_tests.rs"]
mod tests;
