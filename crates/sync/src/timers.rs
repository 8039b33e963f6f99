// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Named deadlines owned by the sync service.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    Heartbeat,
    PongTimeout,
    Reconnect,
    TypingIdle,
}

/// At most one deadline per [`TimerKind`]. Arming replaces.
#[derive(Debug, Default, Clone)]
pub struct Timers {
    deadlines: BTreeMap<TimerKind, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: TimerKind, deadline: Instant) {
        self.deadlines.insert(kind, deadline);
    }

    pub fn arm_in(&mut self, kind: TimerKind, delay: Duration) {
        self.arm(kind, Instant::now() + delay);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines.get(&kind).copied()
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    /// Earliest deadline; ties go to the kind declared first.
    pub fn next(&self) -> Option<(TimerKind, Instant)> {
        self.deadlines
            .iter()
            .min_by_key(|(kind, deadline)| (**deadline, **kind))
            .map(|(kind, deadline)| (*kind, *deadline))
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
#[path = "timers_tests.rs"]
mod tests;
