//! Lifecycle state machine.
//!
//! ```text
//! Uninitialized → Initializing → Running → Draining → ShutDown
//! ```
//!
//! Transitions only move forward. A failed initialization jumps straight to
//! `ShutDown`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Uninitialized = 0,
    Initializing = 1,
    Running = 2,
    Draining = 3,
    ShutDown = 4,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Initializing,
            2 => LifecycleState::Running,
            3 => LifecycleState::Draining,
            _ => LifecycleState::ShutDown,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::ShutDown => "shut down",
        };
        f.write_str(name)
    }
}

/// Atomic holder of the current [`LifecycleState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Uninitialized as u8))
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Returns the actual state on mismatch.
    pub fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), LifecycleState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| {
                tracing::debug!(from = %from, to = %to, "Lifecycle transition");
            })
            .map_err(LifecycleState::from)
    }

    /// Jump to `ShutDown` regardless of the current state.
    pub fn finish(&self) {
        self.0.store(LifecycleState::ShutDown as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
