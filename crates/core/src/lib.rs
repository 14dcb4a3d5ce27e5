// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! quay-core: shared types for the quay node daemon.
//!
//! Everything the daemon's crates agree on lives here: the loose scalar
//! values the control plane sends, the per-instance power state, the
//! server configuration snapshot, process/stop/startup descriptors, and
//! the event topics published by a running instance.

pub mod clock;
pub mod events;
pub mod process;
pub mod scalar;
pub mod server;
pub mod state;
pub mod usage;

pub use clock::{Clock, FakeClock, SystemClock};
pub use events::{Event, Topic};
pub use process::{
    ConfigurationFile, ConfigurationParser, ConsoleMatchers, FileReplacement,
    ProcessConfiguration, StartupConfiguration, StopDescriptor,
};
pub use scalar::Scalar;
pub use server::{
    Allocation, Allocations, BuildLimits, ContainerSettings, Mount, ServerConfiguration,
};
pub use state::{PowerAction, PowerState};
pub use usage::ResourceUsage;
