// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-instance event topics.
//!
//! A running instance fans events out to WebSocket subscribers, the
//! console throttler, and the crash detector. The topic set is fixed;
//! payloads are JSON so subscribers can forward frames without
//! re-encoding.

use crate::state::PowerState;
use crate::usage::ResourceUsage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every topic an instance can publish on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Console,
    Status,
    Stats,
    InstallOutput,
    InstallStarted,
    InstallCompleted,
    DaemonMessage,
    BackupCompleted,
    TransferStatus,
    ImagePullStarted,
    ImagePullStatus,
    ImagePullCompleted,
}

impl Topic {
    /// The event name used on the WebSocket wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Topic::Console => "console output",
            Topic::Status => "status",
            Topic::Stats => "stats",
            Topic::InstallOutput => "install output",
            Topic::InstallStarted => "install started",
            Topic::InstallCompleted => "install completed",
            Topic::DaemonMessage => "daemon message",
            Topic::BackupCompleted => "backup completed",
            Topic::TransferStatus => "transfer status",
            Topic::ImagePullStarted => "image pull started",
            Topic::ImagePullStatus => "image pull status",
            Topic::ImagePullCompleted => "image pull completed",
        }
    }

    /// All topics, for subscribe-to-everything consumers.
    pub const ALL: [Topic; 12] = [
        Topic::Console,
        Topic::Status,
        Topic::Stats,
        Topic::InstallOutput,
        Topic::InstallStarted,
        Topic::InstallCompleted,
        Topic::DaemonMessage,
        Topic::BackupCompleted,
        Topic::TransferStatus,
        Topic::ImagePullStarted,
        Topic::ImagePullStatus,
        Topic::ImagePullCompleted,
    ];
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One published event: a topic plus its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(topic: Topic, data: serde_json::Value) -> Self {
        Self { topic, data }
    }

    pub fn console(line: impl Into<String>) -> Self {
        Self::new(Topic::Console, serde_json::Value::String(line.into()))
    }

    pub fn status(state: PowerState) -> Self {
        Self::new(Topic::Status, serde_json::Value::String(state.as_str().to_string()))
    }

    pub fn stats(usage: &ResourceUsage) -> Self {
        let data = serde_json::to_value(usage).unwrap_or(serde_json::Value::Null);
        Self::new(Topic::Stats, data)
    }

    pub fn daemon_message(message: impl Into<String>) -> Self {
        Self::new(Topic::DaemonMessage, serde_json::Value::String(message.into()))
    }

    pub fn install_output(line: impl Into<String>) -> Self {
        Self::new(Topic::InstallOutput, serde_json::Value::String(line.into()))
    }

    /// Payload of a `backup_completed` event.
    pub fn backup_completed(
        uuid: &str,
        successful: bool,
        checksum: &str,
        size: u64,
    ) -> Self {
        Self::new(
            Topic::BackupCompleted,
            serde_json::json!({
                "uuid": uuid,
                "is_successful": successful,
                "checksum": checksum,
                "checksum_type": "sha1",
                "file_size": size,
            }),
        )
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
