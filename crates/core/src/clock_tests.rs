// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let before = clock.now();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now() - before, Duration::from_secs(5));
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.now(), other.now());
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
