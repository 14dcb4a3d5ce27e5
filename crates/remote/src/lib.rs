// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quay-remote: the authenticated client for the control plane.
//!
//! Request/response only — no retries live at this layer. Transport
//! failures and non-2xx responses surface as distinct error kinds so
//! callers can decide; a remote 404 for a server means the control
//! plane no longer knows it and the caller should drop the local
//! record.

mod client;
mod error;
mod types;

pub use client::Client;
pub use error::RemoteError;
pub use types::{
    BackupUploadUrls, InstallationScript, RawServerData, SftpAuthRequest, SftpAuthResponse,
};

/// Redact an authorization header value past its first 15 characters.
pub fn redact_token(value: &str) -> String {
    if value.len() <= 15 {
        value.to_string()
    } else {
        format!("{}(redacted)", &value[..15])
    }
}

#[cfg(test)]
mod redact_tests {
    use super::redact_token;

    #[test]
    fn short_values_pass_through() {
        assert_eq!(redact_token("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn long_values_keep_first_15_chars() {
        let header = "Bearer node_abcdef123456.secret_value";
        let redacted = redact_token(header);
        assert_eq!(redacted, "Bearer node_abc(redacted)");
        assert!(!redacted.contains("secret"));
    }
}
