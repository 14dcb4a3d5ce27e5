// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `quay diagnostics`: a shareable, secret-free view of the node.

use quay_daemon::DaemonConfig;
use std::path::Path;
use std::process::ExitCode;

pub(crate) fn run(config_path: &Path) -> ExitCode {
    println!("quay {}", env!("CARGO_PKG_VERSION"));
    println!("os: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    match DaemonConfig::load(config_path) {
        Ok(config) => {
            let mut snapshot = serde_json::to_value(&config).unwrap_or_default();
            redact(&mut snapshot, "/remote/token");
            redact(&mut snapshot, "/remote/token_id");
            println!(
                "configuration ({}):\n{}",
                config_path.display(),
                serde_json::to_string_pretty(&snapshot).unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("configuration ({}): unreadable: {err}", config_path.display());
            ExitCode::from(1)
        }
    }
}

fn redact(snapshot: &mut serde_json::Value, pointer: &str) {
    if let Some(value) = snapshot.pointer_mut(pointer) {
        *value = serde_json::Value::String("(redacted)".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_redacted_from_output() {
        let mut snapshot = serde_json::json!({
            "remote": {"url": "https://panel", "token": "secret", "token_id": "id"}
        });
        redact(&mut snapshot, "/remote/token");
        redact(&mut snapshot, "/remote/token_id");
        assert_eq!(snapshot["remote"]["token"], "(redacted)");
        assert_eq!(snapshot["remote"]["token_id"], "(redacted)");
        assert_eq!(snapshot["remote"]["url"], "https://panel");
    }
}
