// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Console output throttling.
//!
//! Counts lines per window; exceeding the window budget records a
//! strike (one per window) and strikes decay while the instance
//! behaves. Hitting the strike cap means the instance is terminated.

use crate::settings::ThrottleSettings;
use quay_core::Clock;
use std::time::{Duration, Instant};

/// What one observed console line means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleOutcome {
    /// Within limits.
    Ok,
    /// The window budget was just exceeded for the first time this
    /// window: notify the console.
    StrikeStarted,
    /// The strike cap is reached: stop the instance.
    Throttled,
}

/// Per-instance throttle state.
pub struct ConsoleThrottle<C: Clock> {
    clock: C,
    settings: ThrottleSettings,
    lines_in_window: u64,
    strikes: u32,
    window_start: Instant,
    struck_this_window: bool,
    last_strike: Option<Instant>,
}

impl<C: Clock> ConsoleThrottle<C> {
    pub fn new(settings: ThrottleSettings, clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            settings,
            lines_in_window: 0,
            strikes: 0,
            window_start: now,
            struck_this_window: false,
            last_strike: None,
        }
    }

    /// Reset everything; called when an instance enters `starting`.
    pub fn reset(&mut self) {
        self.lines_in_window = 0;
        self.strikes = 0;
        self.window_start = self.clock.now();
        self.struck_this_window = false;
        self.last_strike = None;
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    /// Account one console line.
    pub fn observe_line(&mut self) -> ThrottleOutcome {
        if !self.settings.enabled {
            return ThrottleOutcome::Ok;
        }
        let now = self.clock.now();

        if now.duration_since(self.window_start)
            > Duration::from_millis(self.settings.line_reset_interval_ms)
        {
            self.lines_in_window = 0;
            self.window_start = now;
            self.struck_this_window = false;
        }

        if let Some(last) = self.last_strike {
            if now.duration_since(last) > Duration::from_millis(self.settings.decay_interval_ms)
            {
                self.strikes = self.strikes.saturating_sub(1);
                self.last_strike = Some(now);
            }
        }

        self.lines_in_window += 1;
        if self.lines_in_window > self.settings.lines && !self.struck_this_window {
            self.strikes += 1;
            self.struck_this_window = true;
            self.last_strike = Some(now);

            if self.strikes >= self.settings.maximum_trigger_count {
                return ThrottleOutcome::Throttled;
            }
            return ThrottleOutcome::StrikeStarted;
        }

        if self.strikes >= self.settings.maximum_trigger_count {
            return ThrottleOutcome::Throttled;
        }
        ThrottleOutcome::Ok
    }
}

#[cfg(test)]
#[path = "throttle_tests.rs"]
mod tests;
