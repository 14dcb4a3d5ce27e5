// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use quay_core::PowerState;
use std::time::Duration;

#[tokio::test]
async fn delivers_to_matching_topic_only() {
    let bus = EventBus::new();
    let (_sub, mut status_rx) = bus.subscribe(&[Topic::Status]);
    let (_sub2, mut console_rx) = bus.subscribe(&[Topic::Console]);

    bus.publish(Event::status(PowerState::Running)).await;

    assert_eq!(status_rx.recv().await.unwrap().topic, Topic::Status);
    assert!(console_rx.try_recv().is_err());
}

#[tokio::test]
async fn slow_subscriber_drops_but_publisher_returns() {
    let bus = EventBus::with_delivery_timeout(Duration::from_millis(10));
    // capacity 1 and nobody draining
    let (_sub, _rx) = bus.subscribe_with_capacity(&[Topic::Console], 1);

    let started = tokio::time::Instant::now();
    for n in 0..5 {
        bus.publish(Event::console(format!("line {n}"))).await;
    }
    // one event fits the buffer, the rest are dropped after ~10ms each
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn per_subscriber_order_is_publish_order() {
    let bus = EventBus::new();
    let (_sub, mut rx) = bus.subscribe(&[Topic::Console]);

    for n in 0..20 {
        bus.publish(Event::console(format!("{n}"))).await;
    }
    for n in 0..20 {
        let event = rx.recv().await.unwrap();
        assert_eq!(event.data, serde_json::json!(format!("{n}")));
    }
}

#[tokio::test]
async fn unsubscribe_detaches_sink() {
    let bus = EventBus::new();
    let (sub, mut rx) = bus.subscribe(&[Topic::Status]);
    sub.unsubscribe();

    bus.publish(Event::status(PowerState::Offline)).await;
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn destroy_closes_all_sinks() {
    let bus = EventBus::new();
    let (_sub, mut rx) = bus.subscribe(&[Topic::Console, Topic::Status]);
    bus.destroy();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn stress_publish_subscribe_unsubscribe() {
    let bus = EventBus::new();
    let mut tasks = Vec::new();

    for _ in 0..8 {
        let bus = bus.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..50 {
                let (sub, mut rx) = bus.subscribe(&[Topic::Console]);
                bus.publish(Event::console(format!("round {round}"))).await;
                // drain whatever arrived, order within this subscriber holds
                while rx.try_recv().is_ok() {}
                sub.unsubscribe();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}
