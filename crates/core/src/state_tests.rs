// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    offline = { PowerState::Offline, "offline" },
    starting = { PowerState::Starting, "starting" },
    running = { PowerState::Running, "running" },
    stopping = { PowerState::Stopping, "stopping" },
)]
fn serializes_lowercase(state: PowerState, expected: &str) {
    assert_eq!(serde_json::to_string(&state).unwrap(), format!("\"{expected}\""));
    assert_eq!(state.to_string(), expected);
}

#[test]
fn deserializes_from_states_file_form() {
    let state: PowerState = serde_json::from_str("\"running\"").unwrap();
    assert_eq!(state, PowerState::Running);
}

#[parameterized(
    offline = { PowerState::Offline, false },
    starting = { PowerState::Starting, true },
    running = { PowerState::Running, true },
    stopping = { PowerState::Stopping, false },
)]
fn stoppable_states(state: PowerState, expected: bool) {
    assert_eq!(state.is_stoppable(), expected);
}

#[parameterized(
    start = { "start", Some(PowerAction::Start) },
    stop = { "stop", Some(PowerAction::Stop) },
    restart = { "restart", Some(PowerAction::Restart) },
    kill = { "kill", Some(PowerAction::Kill) },
    unknown = { "reboot", None },
)]
fn parses_action_names(input: &str, expected: Option<PowerAction>) {
    assert_eq!(PowerAction::parse(input), expected);
}
