// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runaway console output forces the instance down.

use crate::control_plane::ControlPlane;
use crate::server::Server;
use crate::settings::ThrottleSettings;
use crate::test_support::{server_data, test_settings, wait_until, FakeControlPlane};
use quay_adapters::FakeRuntime;
use quay_core::{PowerAction, PowerState, Topic};
use std::sync::Arc;
use std::time::Duration;

/// Like `fixture`, but with an aggressive throttle: 5 lines per
/// second, two strikes and you're out.
fn throttled_fixture() -> (Server<FakeRuntime>, FakeRuntime, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut settings = test_settings(dir.path());
    settings.throttle = ThrottleSettings {
        enabled: true,
        lines: 5,
        line_reset_interval_ms: 1000,
        maximum_trigger_count: 2,
        decay_interval_ms: 10_000,
        stop_grace_period_s: 1,
    };

    let data = server_data("throttle-aaaa-bbbb-cccc-000000000001");
    let runtime = FakeRuntime::new();
    let remote: Arc<dyn ControlPlane> = FakeControlPlane::with_server(data.clone());
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let server = Server::new(
        data,
        Arc::new(runtime.clone()),
        remote,
        Arc::new(settings),
        tx,
    )
    .expect("server builds");

    (server, runtime, dir)
}

#[tokio::test]
async fn runaway_output_strikes_then_terminates() {
    let (server, runtime, _dir) = throttled_fixture();
    let (_sub, mut daemon_rx) = server.events().subscribe(&[Topic::DaemonMessage]);

    server.handle_power_action(PowerAction::Start, None).await.unwrap();
    server.handle_console_line("Done (1.0s)!").await;
    assert_eq!(server.state(), PowerState::Running);

    // first burst: budget is 5 lines/window → one strike, one notice
    for n in 0..15 {
        server.handle_console_line(&format!("spam {n}")).await;
    }
    let notice = daemon_rx.recv().await.unwrap();
    assert!(notice
        .data
        .as_str()
        .unwrap_or_default()
        .contains("too quickly"));
    assert_eq!(server.state(), PowerState::Running);

    // second window: violate again → strike cap → stop, then kill
    // after the 1s grace
    tokio::time::sleep(Duration::from_millis(1100)).await;
    for n in 0..15 {
        server.handle_console_line(&format!("spam again {n}")).await;
    }

    assert!(wait_until(Duration::from_secs(3), || {
        server.state() == PowerState::Offline
    })
    .await);
    assert!(runtime
        .calls()
        .iter()
        .any(|c| matches!(c, quay_adapters::RuntimeCall::Kill(_, signal) if signal == "SIGKILL")));
}

#[tokio::test]
async fn throttle_resets_when_instance_restarts() {
    let (server, _runtime, _dir) = throttled_fixture();
    server.handle_power_action(PowerAction::Start, None).await.unwrap();

    // one strike
    for n in 0..10 {
        server.handle_console_line(&format!("boot spam {n}")).await;
    }
    assert_eq!(server.inner.throttle.lock().strikes(), 1);

    // back to starting resets the counters
    server.set_state(PowerState::Offline);
    server.set_state(PowerState::Starting);
    assert_eq!(server.inner.throttle.lock().strikes(), 0);
}
