// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic-based publish/subscribe with bounded, non-blocking delivery.
//!
//! Publishing fans out to every subscriber of the topic in parallel
//! with a per-delivery timeout: a slow subscriber loses that one event
//! instead of stalling the publisher. Delivery order per subscriber
//! follows publish order from any single task.

use parking_lot::RwLock;
use quay_core::{Event, Topic};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_SINK_CAPACITY: usize = 64;

struct Sink {
    id: u64,
    tx: mpsc::Sender<Event>,
}

struct BusInner {
    topics: RwLock<HashMap<Topic, Vec<Sink>>>,
    next_id: AtomicU64,
    delivery_timeout: Duration,
}

/// Per-instance event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Handle returned by subscribe; dropping it does nothing, calling
/// [`Subscription::unsubscribe`] detaches the sink.
pub struct Subscription {
    bus: EventBus,
    id: u64,
    topics: Vec<Topic>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_delivery_timeout(DEFAULT_DELIVERY_TIMEOUT)
    }

    pub fn with_delivery_timeout(delivery_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                delivery_timeout,
            }),
        }
    }

    /// Subscribe to a set of topics on one channel.
    pub fn subscribe(&self, topics: &[Topic]) -> (Subscription, mpsc::Receiver<Event>) {
        self.subscribe_with_capacity(topics, DEFAULT_SINK_CAPACITY)
    }

    pub fn subscribe_with_capacity(
        &self,
        topics: &[Topic],
        capacity: usize,
    ) -> (Subscription, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut map = self.inner.topics.write();
            for topic in topics {
                map.entry(*topic).or_default().push(Sink { id, tx: tx.clone() });
            }
        }
        (Subscription { bus: self.clone(), id, topics: topics.to_vec() }, rx)
    }

    /// Deliver to every current subscriber of the topic.
    pub async fn publish(&self, event: Event) {
        let senders: Vec<mpsc::Sender<Event>> = {
            let map = self.inner.topics.read();
            match map.get(&event.topic) {
                Some(sinks) => sinks.iter().map(|s| s.tx.clone()).collect(),
                None => return,
            }
        };
        if senders.is_empty() {
            return;
        }

        let timeout = self.inner.delivery_timeout;
        let deliveries = senders.into_iter().map(|tx| {
            let event = event.clone();
            async move {
                if tokio::time::timeout(timeout, tx.send(event)).await.is_err() {
                    tracing::debug!("dropped event for slow subscriber after delivery timeout");
                }
            }
        });
        futures_util::future::join_all(deliveries).await;
    }

    /// Close every sink. Subscribers observe their channels ending.
    pub fn destroy(&self) {
        self.inner.topics.write().clear();
    }

    fn unsubscribe_id(&self, id: u64, topics: &[Topic]) {
        let mut map = self.inner.topics.write();
        for topic in topics {
            if let Some(sinks) = map.get_mut(topic) {
                sinks.retain(|s| s.id != id);
            }
        }
    }
}

impl Subscription {
    pub fn unsubscribe(self) {
        let bus = self.bus.clone();
        bus.unsubscribe_id(self.id, &self.topics);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
