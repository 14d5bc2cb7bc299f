// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Manager lifecycle state machine.
//!
//! ```text
//! Initialized ──start──▶ Starting ──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                           │                                           │
//!                           └─(fatal)─▶ previous state      start ◀─────┘
//! ```
//!
//! Mutating operations are only accepted while `Running`.

use std::sync::{RwLock, RwLockReadGuard};

use super::locks::{resilient_read, resilient_write};
use crate::types::State;

/// Message carried by every operation refused outside `Running`.
pub const NOT_RUNNING: &str = "not running";

/// Outcome of asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The transition began. Carries the state it began from.
    Begun(State),
    /// Already in the target state; nothing to do.
    Unchanged,
    /// Another transition is in progress.
    Busy(State),
}

#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<State>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Initialized),
        }
    }

    pub fn state(&self) -> State {
        *resilient_read(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    /// Pin the state at `Running` for as long as the guard lives, or fail
    /// with [`NOT_RUNNING`].
    ///
    /// A stop waits for outstanding guards, so an operation holding one
    /// completes before sessions are cleared.
    pub fn running(&self) -> Result<RwLockReadGuard<'_, State>, &'static str> {
        let state = resilient_read(&self.state);
        if *state == State::Running {
            Ok(state)
        } else {
            Err(NOT_RUNNING)
        }
    }

    /// Move to `Starting` from `Initialized` or `Stopped`.
    pub fn begin_start(&self) -> Transition {
        let mut state = resilient_write(&self.state);
        match *state {
            State::Initialized | State::Stopped => {
                let previous = *state;
                *state = State::Starting;
                tracing::debug!(target: "security::lifecycle", from = %previous, "Starting");
                Transition::Begun(previous)
            }
            State::Running => Transition::Unchanged,
            busy @ (State::Starting | State::Stopping) => Transition::Busy(busy),
        }
    }

    /// Move to `Stopping` from `Running`.
    pub fn begin_stop(&self) -> Transition {
        let mut state = resilient_write(&self.state);
        match *state {
            State::Running => {
                *state = State::Stopping;
                tracing::debug!(target: "security::lifecycle", "Stopping");
                Transition::Begun(State::Running)
            }
            State::Initialized | State::Stopped => Transition::Unchanged,
            busy @ (State::Starting | State::Stopping) => Transition::Busy(busy),
        }
    }

    /// Complete a transition begun with [`begin_start`](Self::begin_start)
    /// or [`begin_stop`](Self::begin_stop), or roll one back.
    pub fn finish(&self, to: State) {
        let mut state = resilient_write(&self.state);
        let from = *state;
        *state = to;
        tracing::info!(target: "security::lifecycle", from = %from, to = %to, "Security manager state changed");
    }
}
