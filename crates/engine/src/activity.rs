// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging of user-attributed actions.

/// A logged user action against one instance: console commands, sftp
/// events, file uploads. One value per request; every `log` call
/// carries the actor and origin ip.
#[derive(Debug, Clone)]
pub struct RequestActivity {
    server: String,
    user: Option<String>,
    ip: String,
}

impl RequestActivity {
    pub fn new(server: impl Into<String>, user: Option<String>, ip: impl Into<String>) -> Self {
        Self { server: server.into(), user, ip: ip.into() }
    }

    /// Record one event with optional metadata.
    pub fn log(&self, event: &str, metadata: serde_json::Value) {
        tracing::info!(
            target: "activity",
            server = %self.server,
            user = self.user.as_deref().unwrap_or("system"),
            ip = %self.ip,
            %metadata,
            event,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_is_cheap_to_clone_and_log() {
        let activity = RequestActivity::new("abc", Some("user-1".into()), "10.0.0.9");
        activity.log("server:console.command", serde_json::json!({"command": "say hi"}));
        activity.log("server:file.upload", serde_json::json!({"file": "map.zip"}));
    }
}
