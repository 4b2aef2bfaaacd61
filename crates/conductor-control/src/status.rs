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

//! Read-only reports returned by the query surface.

use crate::manager::ManagerState;
use crate::registry::SubsystemEntry;
use conductor_core::{EventBusStats, Priority, SubsystemState};
use serde::Serialize;

/// Status of one registered subsystem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemStatus {
    /// Registered name.
    pub name: String,
    /// Priority class.
    pub priority: Priority,
    /// Lifecycle state.
    pub state: SubsystemState,
    /// Duration of the last successful update, in milliseconds.
    pub last_update_ms: f32,
    /// Smoothed update duration, in milliseconds.
    pub average_update_ms: f32,
    /// Successful updates so far.
    pub update_count: u64,
    /// Net failure count.
    pub error_count: u32,
    /// Quarantine threshold.
    pub error_threshold: u32,
    /// Most recent failure text.
    pub last_error: Option<String>,
    /// Declared dependencies, sorted.
    pub dependencies: Vec<String>,
    /// Registered subsystems depending on this one, sorted.
    pub dependents: Vec<String>,
}

impl SubsystemStatus {
    pub(crate) fn of(entry: &SubsystemEntry, dependents: Vec<String>) -> Self {
        let record = entry.record();
        Self {
            name: entry.name().to_string(),
            priority: entry.priority(),
            state: record.state,
            last_update_ms: record.stats.last_duration_ms,
            average_update_ms: record.stats.average_duration_ms,
            update_count: record.stats.invocation_count,
            error_count: record.error_count,
            error_threshold: record.error_threshold,
            last_error: record.last_error.clone(),
            dependencies: entry.dependencies().iter().cloned().collect(),
            dependents,
        }
    }
}

/// Aggregate view of the integration manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSnapshot {
    /// Manager lifecycle state.
    pub state: ManagerState,
    /// Fraction of subsystems processed by the last bulk initialization.
    pub initialization_progress: f32,
    /// Registered subsystems.
    pub total_systems: usize,
    /// Subsystems in `Running`.
    pub running_systems: usize,
    /// Subsystems in `Paused`.
    pub paused_systems: usize,
    /// Subsystems in `Error`.
    pub error_systems: usize,
    /// Mean frame time since start, in milliseconds.
    pub average_frame_time_ms: f64,
    /// Frames run since start.
    pub frame_count: u64,
    /// Failures recorded across all subsystems.
    pub global_error_count: u64,
    /// Current execution order.
    pub execution_order: Vec<String>,
    /// Event bus counters.
    pub events: EventBusStats,
}
