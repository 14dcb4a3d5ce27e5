// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Start/stop/restart and crash-handling flows.

use crate::error::ServerError;
use crate::test_support::{fixture, wait_until};
use quay_adapters::RuntimeCall;
use quay_core::{PowerAction, PowerState, Topic};
use std::time::Duration;

#[tokio::test]
async fn start_transitions_to_running_on_console_match() {
    let fx = fixture();
    let (_sub, mut status_rx) = fx.server.events().subscribe(&[Topic::Status]);

    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    assert_eq!(fx.server.state(), PowerState::Starting);

    // the boot pipeline ran in order: recreate → pull → create → start
    let calls = fx.runtime.calls();
    let start_pos = calls.iter().position(|c| matches!(c, RuntimeCall::Start(_))).unwrap();
    let create_pos = calls.iter().position(|c| matches!(c, RuntimeCall::Create(_))).unwrap();
    let pull_pos =
        calls.iter().position(|c| matches!(c, RuntimeCall::PullImage { .. })).unwrap();
    assert!(pull_pos < create_pos && create_pos < start_pos);

    fx.runtime.push_console_line("Done (5.123s)! For help, type \"help\"").await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Running
    })
    .await);

    // a status subscriber observed starting then running, in order
    let mut seen = Vec::new();
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(1), status_rx.recv())
            .await
            .expect("status event arrives")
            .expect("subscription stays open");
        seen.push(event.data.as_str().unwrap_or_default().to_string());
    }
    assert_eq!(seen, vec!["starting".to_string(), "running".to_string()]);
}

#[tokio::test]
async fn non_matching_lines_do_not_advance_state() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();

    fx.runtime.push_console_line("Loading libraries, please wait...").await;
    fx.runtime.push_console_line("Preparing level \"world\"").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.server.state(), PowerState::Starting);
}

#[tokio::test]
async fn stop_writes_the_command_and_escalates_to_kill() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.runtime.push_console_line("Done (1.0s)!").await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Running
    })
    .await);

    // the fake never exits by itself, so the 200ms grace expires and
    // the stop escalates
    fx.server.handle_power_action(PowerAction::Stop, None).await.unwrap();
    assert_eq!(fx.server.state(), PowerState::Offline);

    let calls = fx.runtime.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, RuntimeCall::Stop(_, quay_core::StopDescriptor::Command { value }) if value == "stop")));
    assert!(calls
        .iter()
        .any(|c| matches!(c, RuntimeCall::Kill(_, signal) if signal == "SIGKILL")));
    assert_eq!(fx.runtime.stdin_lines(), vec!["stop".to_string()]);
}

#[tokio::test]
async fn start_on_running_server_is_a_no_op() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    let calls_before = fx.runtime.calls().len();

    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    assert_eq!(fx.runtime.calls().len(), calls_before);
}

#[tokio::test]
async fn restart_runs_stop_then_start() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.runtime.push_console_line("Done (2.5s)!").await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Running
    })
    .await);

    // the restart's stop half times out (nothing exits voluntarily),
    // which kills, surfaces the timeout, and still boots the instance
    let result = fx.server.handle_power_action(PowerAction::Restart, None).await;
    assert!(matches!(
        result,
        Err(ServerError::Runtime(quay_adapters::RuntimeError::Timeout))
    ));
    assert_eq!(fx.server.state(), PowerState::Starting);

    let calls = fx.runtime.calls();
    let kill = calls.iter().position(|c| matches!(c, RuntimeCall::Kill(_, _))).unwrap();
    let last_start =
        calls.iter().rposition(|c| matches!(c, RuntimeCall::Start(_))).unwrap();
    assert!(kill < last_start);
}

#[tokio::test]
async fn crash_restarts_and_debounces() {
    let fx = fixture();
    let (_sub, mut daemon_rx) = fx.server.events().subscribe(&[Topic::DaemonMessage]);

    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.runtime.push_console_line("Done (0.5s)!").await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Running
    })
    .await);

    // first crash: exit 137, oom-killed → auto restart back to starting
    fx.runtime.set_exit(137, true);
    fx.runtime.close_console();
    assert!(wait_until(Duration::from_secs(2), || {
        fx.server.state() == PowerState::Starting
    })
    .await);
    // let the restart reach its attach before crashing again
    assert!(wait_until(Duration::from_secs(2), || fx.runtime.is_attached()).await);

    // second crash within the 60s window → stays offline
    fx.runtime.set_exit(137, true);
    fx.runtime.close_console();
    assert!(wait_until(Duration::from_secs(2), || {
        fx.server.state() == PowerState::Offline
    })
    .await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fx.server.state(), PowerState::Offline);

    let mut messages = Vec::new();
    while let Ok(event) = daemon_rx.try_recv() {
        messages.push(event.data.as_str().unwrap_or_default().to_string());
    }
    assert!(messages.iter().any(|m| m.contains("restarting")));
    assert!(messages.iter().any(|m| m.contains("too frequently")));
}

#[tokio::test]
async fn clean_exit_does_not_restart() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.runtime.push_console_line("Done (0.5s)!").await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Running
    })
    .await);

    fx.runtime.set_exit(0, false);
    fx.runtime.close_console();
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Offline
    })
    .await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // no restart was attempted
    assert_eq!(fx.server.state(), PowerState::Offline);
    assert!(!fx.runtime.is_attached());
}

#[tokio::test]
async fn offline_resets_usage_except_disk() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.runtime
        .push_stats(quay_adapters::ResourceSample {
            memory_bytes: 1024,
            memory_limit_bytes: 4096,
            cpu_absolute: 12.5,
            network_rx_bytes: 5,
            network_tx_bytes: 6,
        })
        .await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.usage().memory_bytes == 1024
    })
    .await);

    fx.runtime.set_exit(0, false);
    fx.runtime.close_console();
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Offline
    })
    .await);

    let usage = fx.server.usage();
    assert_eq!(usage.memory_bytes, 0);
    assert_eq!(usage.cpu_absolute, 0.0);
}

#[tokio::test]
async fn sync_against_gone_server_notifies_removal() {
    let mut fx = fixture();
    fx.remote.mark_gone(fx.server.id());

    let err = fx.server.sync().await.unwrap_err();
    assert!(err.is_instance_gone());

    let message = fx.messages.recv().await.unwrap();
    assert_eq!(
        message,
        crate::server::EngineMessage::Removed { id: fx.server.id().to_string() }
    );
}
