// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quay-adapters: the container runtime behind a trait.
//!
//! The engine talks to [`ContainerRuntime`] and never to Docker
//! directly, so instance semantics can be tested against the fake and
//! the Docker wiring stays in one place.

mod docker;
mod runtime;
mod spec;

pub use docker::DockerRuntime;
pub use runtime::{
    AttachHandle, ContainerRuntime, ContainerStatus, PullProgress, ResourceSample,
    RuntimeError, RuntimeResult, StdinHandle,
};
pub use spec::{ContainerSpec, NodeSettings, SpecMount, SpecResources};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRuntime, RuntimeCall};
