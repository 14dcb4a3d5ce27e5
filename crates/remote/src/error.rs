// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds for control-plane calls.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connect/IO failure before a response arrived.
    #[error("control plane transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response with the panel's error envelope.
    #[error("control plane returned {http_status}: {code}: {detail}")]
    Api { code: String, status: String, detail: String, http_status: u16 },

    /// The control plane no longer knows this server.
    #[error("server not found on the control plane")]
    InstanceNotFound,

    /// SFTP credential validation failed.
    #[error("invalid sftp credentials")]
    InvalidCredentials,
}

/// The panel's error envelope: `{"errors": [{code, status, detail}]}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    detail: String,
}

impl RemoteError {
    /// Build the error for a non-2xx response body.
    ///
    /// A first error with status `"404"` means the resource is gone
    /// from the control plane and maps to [`RemoteError::InstanceNotFound`].
    pub(crate) fn from_response(http_status: u16, body: &str) -> Self {
        let first = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.errors.into_iter().next())
            .unwrap_or_default();

        if first.status == "404" {
            return RemoteError::InstanceNotFound;
        }

        RemoteError::Api {
            code: first.code,
            status: first.status,
            detail: first.detail,
            http_status,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
