// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn next_picks_earliest() {
    let now = Instant::now();
    let mut timers = Timers::new();
    timers.arm(TimerKind::Heartbeat, now + Duration::from_secs(30));
    timers.arm(TimerKind::TypingIdle, now + Duration::from_secs(2));
    timers.arm(TimerKind::Reconnect, now + Duration::from_secs(5));

    assert_eq!(
        timers.next(),
        Some((TimerKind::TypingIdle, now + Duration::from_secs(2)))
    );
}

#[test]
fn ties_go_to_declaration_order() {
    let now = Instant::now();
    let mut timers = Timers::new();
    timers.arm(TimerKind::Reconnect, now);
    timers.arm(TimerKind::Heartbeat, now);
    assert_eq!(timers.next(), Some((TimerKind::Heartbeat, now)));
}

#[test]
fn arming_replaces_deadline() {
    let now = Instant::now();
    let mut timers = Timers::new();
    timers.arm(TimerKind::Heartbeat, now + Duration::from_secs(1));
    timers.arm(TimerKind::Heartbeat, now + Duration::from_secs(9));
    assert_eq!(
        timers.deadline(TimerKind::Heartbeat),
        Some(now + Duration::from_secs(9))
    );
}

#[test]
fn cancel_and_cancel_all() {
    let now = Instant::now();
    let mut timers = Timers::new();
    timers.arm(TimerKind::Heartbeat, now);
    timers.arm(TimerKind::PongTimeout, now);

    timers.cancel(TimerKind::Heartbeat);
    assert!(!timers.is_armed(TimerKind::Heartbeat));
    assert!(timers.is_armed(TimerKind::PongTimeout));

    timers.cancel_all();
    assert!(timers.is_empty());
    assert_eq!(timers.next(), None);
}
