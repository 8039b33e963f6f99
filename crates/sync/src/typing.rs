// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sender-side typing debounce.
//!
//! The first keystroke announces `true` once. Each keystroke pushes the idle
//! deadline out; when it passes, `false` is announced. Emptying the input
//! announces `false` at once.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct TypingDebouncer {
    idle: Duration,
    typing: bool,
    deadline: Option<Instant>,
}

impl TypingDebouncer {
    pub fn new(idle: Duration) -> Self {
        TypingDebouncer {
            idle,
            typing: false,
            deadline: None,
        }
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// When the idle timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Records an input change. Returns the indicator to send, if any.
    pub fn on_input(&mut self, text: &str, now: Instant) -> Option<bool> {
        if text.is_empty() {
            self.deadline = None;
            return self.set_typing(false);
        }
        self.deadline = Some(now + self.idle);
        self.set_typing(true)
    }

    /// Handles the idle timer. Returns `Some(false)` if the indicator lapsed.
    pub fn on_timeout(&mut self, now: Instant) -> Option<bool> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.set_typing(false)
            }
            _ => None,
        }
    }

    /// Forgets state without announcing anything.
    pub fn reset(&mut self) {
        self.typing = false;
        self.deadline = None;
    }

    fn set_typing(&mut self, typing: bool) -> Option<bool> {
        if self.typing == typing {
            return None;
        }
        self.typing = typing;
        Some(typing)
    }
}

#[cfg(test)]
#[path = "typing_tests.rs"]
mod tests;
