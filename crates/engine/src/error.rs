// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance-level error kinds.
//!
//! These are the authoritative failures the API surfaces with stable
//! machine codes; transport blips stay inside the operation that hit
//! them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The power lock could not be acquired within the deadline.
    #[error("another power action is currently being processed")]
    Busy,

    /// The instance is suspended by the control plane.
    #[error("server is suspended")]
    Suspended,

    /// An install is running; the action is refused.
    #[error("server is currently installing")]
    Installing,

    /// A transfer is running; the action is refused.
    #[error("server is currently being transferred")]
    Transferring,

    /// A backup restore is running; the action is refused.
    #[error("server is currently restoring a backup")]
    Restoring,

    /// A crash happened within the debounce window; no restart.
    #[error("server crashed too frequently, not restarting")]
    CrashTooFrequent,

    /// Console output exceeded the throttle thresholds.
    #[error("console output exceeded the configured rate limits")]
    Throttled,

    #[error(transparent)]
    Fs(#[from] quay_fs::FsError),

    #[error(transparent)]
    Remote(#[from] quay_remote::RemoteError),

    #[error(transparent)]
    Runtime(#[from] quay_adapters::RuntimeError),

    #[error("config rewrite failed: {0}")]
    Parser(#[from] quay_parser::ParserError),

    #[error("configuration update rejected: {0}")]
    Merge(#[from] quay_core::server::MergeError),
}

impl ServerError {
    /// True for the not-found signal that tells the manager to drop
    /// the local record.
    pub fn is_instance_gone(&self) -> bool {
        matches!(self, ServerError::Remote(quay_remote::RemoteError::InstanceNotFound))
    }

    /// True for quota-class failures.
    pub fn is_quota(&self) -> bool {
        matches!(self, ServerError::Fs(err) if err.is_quota())
    }
}
