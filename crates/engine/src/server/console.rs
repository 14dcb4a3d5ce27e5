// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The attached-console pipeline.
//!
//! One reader task per running container splits the attach stream into
//! lines and drives everything that watches the console: the event
//! bus, the startup-done matchers, and the output throttler. Losing
//! the stream is the authoritative "container went away" signal and
//! feeds crash detection.

use crate::crash::CrashDecision;
use crate::error::ServerError;
use crate::server::Server;
use crate::throttle::ThrottleOutcome;
use quay_adapters::ContainerRuntime;
use quay_core::{Event, PowerAction, PowerState};
use tokio_util::sync::CancellationToken;

impl<R: ContainerRuntime> Server<R> {
    /// Attach to the freshly started container, replay the log tail
    /// the attach stream may have missed, and spawn the console and
    /// stats pumps.
    pub(crate) fn attach_and_monitor(
        &self,
    ) -> futures_util::future::BoxFuture<'_, Result<(), ServerError>> {
        Box::pin(async move {
            let mut handle = self.inner.runtime.attach(&self.inner.id).await?;
            *self.inner.stdin.lock() = Some(handle.stdin());

            // catch-up: the attach stream only carries output from now on
            match self.inner.runtime.read_log(&self.inner.id, 100).await {
                Ok(lines) => {
                    for line in lines {
                        self.handle_console_line(line.trim_end_matches(['\r', '\n'])).await;
                    }
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    tracing::debug!(server = %self.inner.id, %err, "log catch-up failed");
                }
            }

            let stats_cancel = CancellationToken::new();
            self.spawn_stats_pump(stats_cancel.clone()).await;

            let server = self.clone();
            let pump = tokio::spawn(async move {
                let mut pending: Vec<u8> = Vec::new();
                while let Some(chunk) = handle.output.recv().await {
                    pending.extend_from_slice(&chunk);
                    while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                        let raw: Vec<u8> = pending.drain(..=newline).collect();
                        let line = String::from_utf8_lossy(&raw);
                        server.handle_console_line(line.trim_end_matches(['\r', '\n'])).await;
                    }
                }
                // flush a trailing partial line before teardown
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    server.handle_console_line(&line).await;
                }
                stats_cancel.cancel();
                server.on_console_closed().await;
            });
            *self.inner.console_task.lock() = Some(pump);

            Ok(())
        })
    }

    /// Route one console line through throttling, startup matching,
    /// and the event bus.
    pub(crate) async fn handle_console_line(&self, line: &str) {
        let outcome = self.inner.throttle.lock().observe_line();
        match outcome {
            ThrottleOutcome::Ok => {}
            ThrottleOutcome::StrikeStarted => {
                self.inner
                    .bus
                    .publish(Event::daemon_message(
                        "Server is outputting console data too quickly, throttling...",
                    ))
                    .await;
            }
            ThrottleOutcome::Throttled => {
                tracing::warn!(server = %self.inner.id, "console throttle cap hit, terminating");
                let server = self.clone();
                tokio::spawn(async move {
                    let grace = std::time::Duration::from_secs(
                        server.inner.settings.throttle.stop_grace_period_s,
                    );
                    if let Err(err) = server.stop_with_kill_after(grace).await {
                        tracing::warn!(server = %server.inner.id, %err, "throttle stop failed");
                    }
                });
            }
        }

        if self.state() == PowerState::Starting {
            let matched = {
                let proc = self.inner.proc.read();
                if proc.startup.strip_ansi {
                    proc.startup.done.matches(&strip_ansi(line))
                } else {
                    proc.startup.done.matches(line)
                }
            };
            if matched {
                self.set_state(PowerState::Running);
            }
        }

        self.inner.bus.publish(Event::console(line)).await;
    }

    /// Decide what the closed stream means: an intentional stop goes
    /// quietly offline, anything else runs crash detection.
    async fn on_console_closed(&self) {
        *self.inner.stdin.lock() = None;

        let previous = self.state();
        if previous == PowerState::Offline {
            return;
        }
        self.set_state(PowerState::Offline);
        if previous == PowerState::Stopping {
            return;
        }

        let exit = match self.inner.runtime.inspect(&self.inner.id).await {
            Ok(status) => status,
            Err(err) => {
                tracing::debug!(server = %self.inner.id, %err, "exit inspection failed");
                return;
            }
        };
        tracing::info!(
            server = %self.inner.id,
            exit_code = exit.exit_code,
            oom_killed = exit.oom_killed,
            "container exited unexpectedly"
        );

        let enabled = self.inner.config.read().crash_detection_enabled;
        match self.inner.crash.evaluate(enabled, &exit) {
            CrashDecision::DetectionDisabled => {
                self.inner
                    .bus
                    .publish(Event::daemon_message(
                        "Server detected as crashed; crash detection is disabled, not restarting.",
                    ))
                    .await;
            }
            CrashDecision::NotACrash => {}
            CrashDecision::Restart => {
                self.inner
                    .bus
                    .publish(Event::daemon_message(format!(
                        "Server crashed with exit code {} (oom: {}), restarting...",
                        exit.exit_code, exit.oom_killed
                    )))
                    .await;
                let server = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = server
                        .handle_power_action(
                            PowerAction::Start,
                            Some(std::time::Duration::from_secs(30)),
                        )
                        .await
                    {
                        tracing::warn!(server = %server.inner.id, %err, "crash restart failed");
                    }
                });
            }
            CrashDecision::TooFrequent => {
                tracing::warn!(server = %self.inner.id, "crash loop detected, leaving offline");
                self.inner
                    .bus
                    .publish(Event::daemon_message(
                        "Server crashed too frequently and will not be restarted.",
                    ))
                    .await;
            }
        }
    }

    /// Pump resource samples into the usage snapshot and the bus.
    async fn spawn_stats_pump(&self, cancel: CancellationToken) {
        let mut samples = match self.inner.runtime.stream_stats(&self.inner.id, cancel).await {
            Ok(rx) => rx,
            Err(err) => {
                tracing::debug!(server = %self.inner.id, %err, "stats stream unavailable");
                return;
            }
        };

        let server = self.clone();
        tokio::spawn(async move {
            let mut started_at = tokio::time::Instant::now();
            let mut seen_first = false;
            while let Some(sample) = samples.recv().await {
                if !seen_first {
                    started_at = tokio::time::Instant::now();
                    seen_first = true;
                }
                let usage = {
                    let mut usage = server.inner.usage.lock();
                    usage.state = server.state();
                    usage.memory_bytes = sample.memory_bytes;
                    usage.memory_limit_bytes = sample.memory_limit_bytes;
                    usage.cpu_absolute = sample.cpu_absolute;
                    usage.network_rx_bytes = sample.network_rx_bytes;
                    usage.network_tx_bytes = sample.network_tx_bytes;
                    usage.uptime_ms = started_at.elapsed().as_millis() as u64;
                    usage.disk_bytes = server.inner.fs.cached_usage();
                    usage.clone()
                };
                server.inner.bus.publish(Event::stats(&usage)).await;
            }
        });
    }
}

/// Remove ANSI escape sequences (CSI and simple two-byte escapes).
fn strip_ansi(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            i += 1;
            if i < bytes.len() && bytes[i] == b'[' {
                i += 1;
                while i < bytes.len() && !bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                i += 1; // consume the final byte
            } else {
                i += 1; // two-byte escape
            }
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod strip_tests {
    use super::strip_ansi;

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(strip_ansi("Done (5.123s)!"), "Done (5.123s)!");
    }

    #[test]
    fn csi_color_codes_are_removed() {
        assert_eq!(strip_ansi("\x1b[32mDone\x1b[0m (5.1s)!"), "Done (5.1s)!");
    }

    #[test]
    fn dangling_escape_is_dropped() {
        assert_eq!(strip_ansi("tail\x1b"), "tail");
    }
}
