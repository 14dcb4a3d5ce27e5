// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod lifecycle;
mod throttle_kill;

use crate::error::ServerError;
use crate::test_support::{fixture, wait_until};
use quay_core::{PowerAction, PowerState, Topic};
use std::time::Duration;

#[tokio::test]
async fn start_is_rejected_when_suspended() {
    let fx = fixture();
    fx.server
        .update_configuration(&serde_json::json!({"suspended": true}))
        .await
        .unwrap();

    let err = fx.server.handle_power_action(PowerAction::Start, None).await.unwrap_err();
    assert!(matches!(err, ServerError::Suspended));
    assert_eq!(fx.server.state(), PowerState::Offline);
    // nothing was created or started
    assert!(!fx
        .runtime
        .calls()
        .iter()
        .any(|c| matches!(c, quay_adapters::RuntimeCall::Start(_))));
}

#[tokio::test]
async fn concurrent_power_actions_observe_busy() {
    let fx = fixture();
    let _held = fx.server.inner.power_lock.clone().try_acquire_owned().unwrap();

    let err = fx.server.handle_power_action(PowerAction::Start, None).await.unwrap_err();
    assert!(matches!(err, ServerError::Busy));

    let err = fx
        .server
        .handle_power_action(PowerAction::Stop, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Busy));

    // kill forces through a held lock
    fx.server.handle_power_action(PowerAction::Kill, None).await.unwrap();
    assert!(fx
        .runtime
        .calls()
        .iter()
        .any(|c| matches!(c, quay_adapters::RuntimeCall::Kill(_, signal) if signal == "SIGKILL")));
}

#[tokio::test]
async fn update_replaces_limits_and_pushes_in_situ() {
    let fx = fixture();
    fx.server
        .update_configuration(&serde_json::json!({"build": {"memory_limit": 2048}}))
        .await
        .unwrap();

    assert_eq!(fx.server.config().build.memory_limit, 2048);
    assert!(
        wait_until(Duration::from_secs(1), || {
            fx.runtime
                .calls()
                .iter()
                .any(|c| matches!(c, quay_adapters::RuntimeCall::InSituUpdate(_)))
        })
        .await
    );
}

#[tokio::test]
async fn suspending_a_running_server_stops_it_within_grace() {
    let fx = fixture();
    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.runtime.push_console_line("Done (5.123s)! For help, type \"help\"").await;
    assert!(wait_until(Duration::from_secs(1), || {
        fx.server.state() == PowerState::Running
    })
    .await);

    fx.server
        .update_configuration(&serde_json::json!({"suspended": true}))
        .await
        .unwrap();

    // grace is 200ms; the fake escalates to SIGKILL on timeout
    assert!(wait_until(Duration::from_secs(2), || {
        fx.server.state() == PowerState::Offline
    })
    .await);
    assert!(fx
        .runtime
        .calls()
        .iter()
        .any(|c| matches!(c, quay_adapters::RuntimeCall::Kill(_, _))));
}

#[tokio::test]
async fn send_command_requires_attached_stdin() {
    let fx = fixture();
    let err = fx.server.send_command("say hi").await.unwrap_err();
    assert!(matches!(
        err,
        ServerError::Runtime(quay_adapters::RuntimeError::NotFound(_))
    ));

    fx.server.handle_power_action(PowerAction::Start, None).await.unwrap();
    fx.server.send_command("say hi").await.unwrap();
    assert_eq!(fx.runtime.stdin_lines(), vec!["say hi".to_string()]);
}

#[tokio::test]
async fn events_handle_reaches_subscribers() {
    let fx = fixture();
    let bus = fx.server.events();
    let (_sub, mut rx) = bus.subscribe(&[Topic::DaemonMessage]);
    bus.publish(quay_core::Event::daemon_message("hello")).await;
    assert_eq!(rx.recv().await.unwrap().data, serde_json::json!("hello"));
}
