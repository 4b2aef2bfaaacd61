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

//! Construction-time configuration of the integration core.

use conductor_core::Priority;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Per-priority-class time allowance for one frame, in milliseconds.
///
/// | Class | Default | Share of a 60 Hz frame |
/// |---|---|---|
/// | Critical | 8.0 | 50% |
/// | High | 4.0 | 25% |
/// | Normal | 2.0 | 12.5% |
/// | Low | 1.0 | 6.25% |
/// | Background | 0.5 | not used by the frame walk |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityBudgets {
    /// Allowance for `Critical` subsystems.
    pub critical_ms: f32,
    /// Allowance for `High` subsystems.
    pub high_ms: f32,
    /// Allowance for `Normal` subsystems.
    pub normal_ms: f32,
    /// Allowance for `Low` subsystems.
    pub low_ms: f32,
    /// Allowance for `Background` subsystems (informational).
    pub background_ms: f32,
}

impl Default for PriorityBudgets {
    fn default() -> Self {
        Self {
            critical_ms: 8.0,
            high_ms: 4.0,
            normal_ms: 2.0,
            low_ms: 1.0,
            background_ms: 0.5,
        }
    }
}

impl PriorityBudgets {
    /// Returns the allowance of `priority`, in milliseconds.
    pub fn budget_ms(&self, priority: Priority) -> f32 {
        match priority {
            Priority::Critical => self.critical_ms,
            Priority::High => self.high_ms,
            Priority::Normal => self.normal_ms,
            Priority::Low => self.low_ms,
            Priority::Background => self.background_ms,
        }
    }

    /// Returns a copy with every class set to `budget_ms`.
    pub fn uniform(budget_ms: f32) -> Self {
        Self {
            critical_ms: budget_ms,
            high_ms: budget_ms,
            normal_ms: budget_ms,
            low_ms: budget_ms,
            background_ms: budget_ms,
        }
    }
}

/// Configuration of the [`IntegrationManager`](crate::IntegrationManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Global per-frame deadline in milliseconds (60 Hz by default).
    pub frame_deadline_ms: f32,
    /// Per-priority-class allowances.
    pub budgets: PriorityBudgets,
    /// Sleep between background cadence ticks, in milliseconds.
    pub background_interval_ms: u64,
    /// How long shutdown waits for the background loop to exit, in milliseconds.
    pub background_join_timeout_ms: u64,
    /// Consecutive (net) failures before a subsystem is quarantined.
    pub error_threshold: u32,
    /// When `false`, failures are counted but never quarantine.
    pub error_isolation_enabled: bool,
    /// Weight of the newest sample in the moving average of update time.
    pub smoothing_weight: f32,
    /// Number of frame samples kept for reporting.
    pub frame_history_capacity: usize,
    /// Number of dispatched events kept for diagnostics.
    pub event_history_capacity: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            frame_deadline_ms: 16.67,
            budgets: PriorityBudgets::default(),
            background_interval_ms: 100,
            background_join_timeout_ms: 5000,
            error_threshold: 5,
            error_isolation_enabled: true,
            smoothing_weight: 0.1,
            frame_history_capacity: 100,
            event_history_capacity: conductor_core::event::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl IntegrationConfig {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frame_deadline_ms.is_finite() && self.frame_deadline_ms > 0.0) {
            return Err(ConfigError::NonPositive("frame_deadline_ms"));
        }
        for priority in Priority::ALL {
            if self.budgets.budget_ms(priority) < 0.0 {
                return Err(ConfigError::NegativeBudget(priority));
            }
        }
        if self.background_interval_ms == 0 {
            return Err(ConfigError::NonPositive("background_interval_ms"));
        }
        if self.error_threshold == 0 {
            return Err(ConfigError::NonPositive("error_threshold"));
        }
        if !(self.smoothing_weight > 0.0 && self.smoothing_weight <= 1.0) {
            return Err(ConfigError::SmoothingOutOfRange(self.smoothing_weight));
        }
        if self.frame_history_capacity == 0 {
            return Err(ConfigError::NonPositive("frame_history_capacity"));
        }
        if self.event_history_capacity == 0 {
            return Err(ConfigError::NonPositive("event_history_capacity"));
        }
        Ok(())
    }

    /// Sleep between background cadence ticks.
    pub fn background_interval(&self) -> Duration {
        Duration::from_millis(self.background_interval_ms)
    }

    /// Bounded wait for the background loop on shutdown.
    pub fn background_join_timeout(&self) -> Duration {
        Duration::from_millis(self.background_join_timeout_ms)
    }
}

/// An invalid configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The named field must be strictly positive.
    NonPositive(&'static str),
    /// A per-class budget is negative.
    NegativeBudget(Priority),
    /// The smoothing weight is outside `(0, 1]`.
    SmoothingOutOfRange(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive(field) => write!(f, "'{field}' must be greater than zero"),
            ConfigError::NegativeBudget(priority) => {
                write!(f, "Budget for the {priority} class must not be negative")
            }
            ConfigError::SmoothingOutOfRange(weight) => {
                write!(f, "Smoothing weight {weight} must lie in (0, 1]")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
