// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Traits and enums describing a schedulable engine subsystem.

use crate::SubsystemContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Urgency tier of a subsystem.
///
/// The order of variants defines both the traversal preference and the
/// per-frame time allowance (first = most urgent).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Priority {
    /// Core gameplay systems that must run every frame.
    Critical,
    /// Important systems.
    High,
    /// Standard systems.
    #[default]
    Normal,
    /// Non-essential systems, first to be starved under load.
    Low,
    /// Systems driven by the background cadence, never by the frame loop.
    Background,
}

impl Priority {
    /// Number of priority classes.
    pub const COUNT: usize = 5;

    /// Every priority class, most urgent first.
    pub const ALL: [Priority; Priority::COUNT] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Background,
    ];

    /// Dense index of this class, suitable for per-class arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lower-case name used in event payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Background => "background",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubsystemState {
    /// Registered, `initialize` not yet called.
    #[default]
    Uninitialized,
    /// `initialize` is in flight.
    Initializing,
    /// Eligible for scheduling.
    Running,
    /// Manually suspended.
    Paused,
    /// Quarantined after a lifecycle failure or too many update failures.
    Error,
    /// `cleanup` is in flight.
    ShuttingDown,
    /// Cleaned up; about to be removed.
    Shutdown,
}

impl SubsystemState {
    /// Lower-case name used in event payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SubsystemState::Uninitialized => "uninitialized",
            SubsystemState::Initializing => "initializing",
            SubsystemState::Running => "running",
            SubsystemState::Paused => "paused",
            SubsystemState::Error => "error",
            SubsystemState::ShuttingDown => "shutting_down",
            SubsystemState::Shutdown => "shutdown",
        }
    }

    /// Returns `true` once teardown has started.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubsystemState::ShuttingDown | SubsystemState::Shutdown)
    }
}

impl fmt::Display for SubsystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lifecycle contract every scheduled subsystem implements.
///
/// Only [`update`](Subsystem::update) is required. Errors returned from any
/// operation are caught by the integration core and never reach the host
/// loop; a subsystem that keeps failing is quarantined instead.
pub trait Subsystem: Send {
    /// Called once before the subsystem enters the `Running` state.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Advances the subsystem by `context.delta_time` seconds.
    ///
    /// Calls run to completion; the frame deadline is only checked between
    /// invocations, so long-running work here overruns the frame budget.
    fn update(&mut self, context: &SubsystemContext<'_>) -> Result<()>;

    /// Called once when the subsystem is unregistered or the manager shuts down.
    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared, lockable handle to a subsystem.
pub type SubsystemHandle = Arc<Mutex<dyn Subsystem>>;

/// Wraps a concrete subsystem into a [`SubsystemHandle`].
pub fn into_handle<S: Subsystem + 'static>(subsystem: S) -> SubsystemHandle {
    Arc::new(Mutex::new(subsystem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_matches_urgency() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert!(Priority::Low < Priority::Background);

        let mut shuffled = vec![Priority::Low, Priority::Critical, Priority::Background];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Priority::Critical, Priority::Low, Priority::Background]
        );
    }

    #[test]
    fn test_priority_indices_are_dense() {
        for (i, priority) in Priority::ALL.iter().enumerate() {
            assert_eq!(priority.index(), i);
        }
    }

    #[test]
    fn test_state_names_and_terminal_states() {
        assert_eq!(SubsystemState::default(), SubsystemState::Uninitialized);
        assert_eq!(SubsystemState::ShuttingDown.to_string(), "shutting_down");
        assert!(SubsystemState::Shutdown.is_terminal());
        assert!(!SubsystemState::Error.is_terminal());
    }

    #[test]
    fn test_default_lifecycle_hooks_succeed() {
        struct UpdateOnly;
        impl Subsystem for UpdateOnly {
            fn update(&mut self, _: &SubsystemContext<'_>) -> Result<()> {
                Ok(())
            }
        }

        let handle = into_handle(UpdateOnly);
        let mut subsystem = handle.lock().unwrap();
        assert!(subsystem.initialize().is_ok());
        assert!(subsystem.cleanup().is_ok());
    }
}
