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

//! Error-count circuit breaker shared by the frame path and the background cadence.

use crate::lifecycle::{self, LifecyclePhase};
use crate::registry::SubsystemEntry;
use conductor_core::{EventBus, SubsystemState};
use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to a subsystem after a failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The failure was counted; the subsystem keeps running.
    Recorded,
    /// The subsystem reached its threshold and was moved to `Error`.
    Quarantined,
}

/// Tracks per-subsystem failure counts and quarantines repeat offenders.
///
/// Each failure increments the subsystem's count and each success decrements
/// it by one, never below zero, so occasional errors heal on their own. A
/// subsystem whose count reaches its threshold moves to `Error` and stays
/// there until reset explicitly.
#[derive(Debug)]
pub struct ErrorIsolation {
    enabled: bool,
    global_error_count: AtomicU64,
}

impl ErrorIsolation {
    /// Creates the breaker. With `enabled == false` failures are counted but never quarantine.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            global_error_count: AtomicU64::new(0),
        }
    }

    /// Returns whether quarantine is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the number of failures recorded across all subsystems.
    pub fn global_error_count(&self) -> u64 {
        self.global_error_count.load(Ordering::Relaxed)
    }

    /// Records a successful invocation.
    pub fn record_success(&self, entry: &SubsystemEntry) {
        let mut record = entry.record();
        record.error_count = record.error_count.saturating_sub(1);
    }

    /// Records a failed update and quarantines the subsystem if it reached its threshold.
    pub fn record_failure(
        &self,
        entry: &SubsystemEntry,
        message: &str,
        events: &EventBus,
    ) -> FailureOutcome {
        self.global_error_count.fetch_add(1, Ordering::Relaxed);

        let (error_count, quarantined) = {
            let mut record = entry.record();
            record.error_count = record.error_count.saturating_add(1);
            record.last_error = Some(message.to_string());

            let active = matches!(
                record.state,
                SubsystemState::Running | SubsystemState::Paused
            );
            let quarantined =
                self.enabled && active && record.error_count >= record.error_threshold;
            if quarantined {
                record.state = SubsystemState::Error;
            }
            (record.error_count, quarantined)
        };

        if quarantined {
            log::error!(
                "Isolation: '{}' quarantined after {} errors, last: {}",
                entry.name(),
                error_count,
                message
            );
            lifecycle::emit_error(events, entry.name(), error_count, message, None);
            FailureOutcome::Quarantined
        } else {
            log::warn!(
                "Isolation: '{}' update failed ({} errors): {}",
                entry.name(),
                error_count,
                message
            );
            FailureOutcome::Recorded
        }
    }

    /// Records a failed `initialize` or `cleanup`; the subsystem moves to `Error` at once.
    pub fn record_lifecycle_failure(
        &self,
        entry: &SubsystemEntry,
        phase: LifecyclePhase,
        message: &str,
        events: &EventBus,
    ) {
        self.global_error_count.fetch_add(1, Ordering::Relaxed);

        let error_count = {
            let mut record = entry.record();
            record.error_count = record.error_count.saturating_add(1);
            record.last_error = Some(message.to_string());
            record.state = SubsystemState::Error;
            record.failed_phase = Some(phase);
            record.error_count
        };

        log::error!("Isolation: '{}' failed to {}: {}", entry.name(), phase, message);
        lifecycle::emit_error(events, entry.name(), error_count, message, Some(phase));
    }

    /// Clears the error record of a subsystem in `Error` and re-admits it.
    ///
    /// A subsystem whose `initialize` failed goes back to `Uninitialized`, so
    /// that the next bulk initialization retries it; any other goes back to
    /// `Running`. Returns the new state, or `None` if the subsystem is not in
    /// `Error`.
    pub fn reset(&self, entry: &SubsystemEntry) -> Option<SubsystemState> {
        let mut record = entry.record();
        if record.state != SubsystemState::Error {
            return None;
        }
        record.state = match record.failed_phase {
            Some(LifecyclePhase::Initialize) => SubsystemState::Uninitialized,
            _ => SubsystemState::Running,
        };
        record.error_count = 0;
        record.last_error = None;
        record.failed_phase = None;
        Some(record.state)
    }
}
