// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::ServerError;
use crate::test_support::{fixture, wait_until};
use quay_adapters::RuntimeCall;
use quay_core::Topic;
use std::time::Duration;

#[tokio::test]
async fn install_runs_the_sidecar_and_reports_success() {
    let fx = fixture();
    let (_sub, mut output_rx) = fx
        .server
        .events()
        .subscribe(&[Topic::InstallOutput, Topic::InstallStarted, Topic::InstallCompleted]);

    let server = fx.server.clone();
    let task = tokio::spawn(async move { server.install().await });

    // wait for the sidecar to start and the log stream to hook up,
    // then let the "script" run
    assert!(wait_until(Duration::from_secs(2), || fx.server.is_installing()).await);
    assert!(wait_until(Duration::from_secs(2), || fx.runtime.has_log_follower()).await);

    fx.runtime.push_log_line("installing dependencies").await;
    fx.runtime.push_log_line("done").await;
    fx.runtime.close_logs();
    fx.runtime.set_running(false);

    task.await.unwrap().unwrap();
    assert!(!fx.server.is_installing());

    // the sidecar was torn down and the control plane informed
    assert!(fx
        .runtime
        .calls()
        .iter()
        .any(|c| matches!(c, RuntimeCall::Destroy(id) if id.ends_with("_installer"))));
    assert_eq!(
        fx.remote.install_reports.lock().clone(),
        vec![(fx.server.id().to_string(), true)]
    );

    // events: started, output lines, completed
    let mut topics = Vec::new();
    while let Ok(event) = output_rx.try_recv() {
        topics.push(event.topic);
    }
    assert!(topics.contains(&Topic::InstallStarted));
    assert!(topics.contains(&Topic::InstallOutput));
    assert!(topics.contains(&Topic::InstallCompleted));

    // the log landed on disk with its header
    let log_path = fx.settings.install_log_path(fx.server.id());
    let log = std::fs::read_to_string(log_path).unwrap();
    assert!(log.contains("Install log for"));
    assert!(log.contains("installing dependencies"));
}

#[tokio::test]
async fn second_install_is_refused_while_one_runs() {
    let fx = fixture();
    let server = fx.server.clone();
    let task = tokio::spawn(async move { server.install().await });
    assert!(wait_until(Duration::from_secs(2), || fx.server.is_installing()).await);

    let err = fx.server.install().await.unwrap_err();
    assert!(matches!(err, ServerError::Installing));

    assert!(wait_until(Duration::from_secs(2), || fx.runtime.has_log_follower()).await);
    fx.runtime.close_logs();
    fx.runtime.set_running(false);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn install_failure_reports_failure() {
    let fx = fixture();
    fx.runtime.fail_next("pull_image", "registry unavailable");

    let err = fx.server.install().await.unwrap_err();
    assert!(matches!(err, ServerError::Runtime(_)));
    assert_eq!(
        fx.remote.install_reports.lock().clone(),
        vec![(fx.server.id().to_string(), false)]
    );
}
