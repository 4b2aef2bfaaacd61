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

//! The per-frame walk of the execution order under time budgets.

use crate::config::{IntegrationConfig, PriorityBudgets};
use crate::isolation::ErrorIsolation;
use crate::metrics::{FrameHistory, FrameReport, FrameSample};
use crate::registry::{ExecutionPlan, SubsystemEntry};
use conductor_core::utils::timer::{duration_ms, Stopwatch};
use conductor_core::{EventBus, Priority, SubsystemContext, SubsystemState};
use std::time::{Duration, SystemTime};

/// Runs one subsystem update and routes its outcome to the isolation layer.
///
/// The state is re-checked right before the call, so a subsystem paused,
/// quarantined or unregistered since the plan was taken is not invoked.
/// Returns the time spent, or `None` if the subsystem was not invoked.
pub(crate) fn run_update(
    entry: &SubsystemEntry,
    context: &SubsystemContext<'_>,
    isolation: &ErrorIsolation,
    smoothing_weight: f32,
) -> Option<Duration> {
    if entry.state() != SubsystemState::Running {
        return None;
    }

    let (elapsed, result) = entry.invoke_update(context);
    match result {
        Ok(()) => {
            entry.record().stats.record(duration_ms(elapsed), smoothing_weight);
            isolation.record_success(entry);
        }
        Err(message) => {
            isolation.record_failure(entry, &message, context.events);
        }
    }
    Some(elapsed)
}

/// Walks the execution order once per frame.
///
/// Per frame, the queued events are drained first. Subsystems are then
/// invoked in order, skipping those that are not `Running`, the `Background`
/// class, and any class whose accumulated time already reached its budget.
/// The walk stops as soon as the frame deadline is reached; the check happens
/// between invocations only, so a single slow subsystem can overrun it.
#[derive(Debug)]
pub struct FrameBudgetExecutor {
    deadline: Duration,
    budgets: PriorityBudgets,
    smoothing_weight: f32,
    history: FrameHistory,
    frame_count: u64,
    total_frame_time_ms: f64,
}

impl FrameBudgetExecutor {
    /// Creates an executor from the frame settings of `config`.
    pub fn new(config: &IntegrationConfig) -> Self {
        Self {
            deadline: Duration::try_from_secs_f32(config.frame_deadline_ms / 1000.0)
                .unwrap_or(Duration::MAX),
            budgets: config.budgets.clone(),
            smoothing_weight: config.smoothing_weight,
            history: FrameHistory::new(config.frame_history_capacity),
            frame_count: 0,
            total_frame_time_ms: 0.0,
        }
    }

    /// Runs one frame over `plan` and returns its sample.
    pub fn run_frame(
        &mut self,
        plan: &ExecutionPlan,
        delta_time: f32,
        events: &EventBus,
        isolation: &ErrorIsolation,
    ) -> FrameSample {
        let frame = Stopwatch::new();
        events.drain();

        let context = SubsystemContext::new(delta_time, events);
        let mut class_ms = [0.0f32; Priority::COUNT];
        let mut invoked = 0;
        let mut skipped_budget = 0;
        let mut deadline_hit = false;

        for entry in plan.entries.iter() {
            let priority = entry.priority();
            if priority == Priority::Background || entry.state() != SubsystemState::Running {
                continue;
            }
            if class_ms[priority.index()] >= self.budgets.budget_ms(priority) {
                log::trace!(
                    "Executor: '{}' skipped, {} budget spent",
                    entry.name(),
                    priority
                );
                skipped_budget += 1;
                continue;
            }

            let Some(elapsed) = run_update(entry, &context, isolation, self.smoothing_weight)
            else {
                continue;
            };
            class_ms[priority.index()] += duration_ms(elapsed);
            invoked += 1;

            if frame.elapsed() >= self.deadline {
                deadline_hit = true;
                log::debug!(
                    "Executor: frame deadline reached after '{}' ({:.2} ms)",
                    entry.name(),
                    frame.elapsed_ms()
                );
                break;
            }
        }

        let sample = FrameSample {
            total_ms: frame.elapsed_ms(),
            class_ms,
            timestamp: SystemTime::now(),
            invoked,
            skipped_budget,
            deadline_hit,
        };

        self.frame_count += 1;
        self.total_frame_time_ms += f64::from(sample.total_ms);
        self.history.push(sample.clone());
        sample
    }

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Mean frame time since creation, in milliseconds.
    pub fn average_frame_time_ms(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.total_frame_time_ms / self.frame_count as f64
    }

    /// The most recent frame sample.
    pub fn last_frame(&self) -> Option<&FrameSample> {
        self.history.latest()
    }

    /// Summary of the retained frame history.
    pub fn report(&self) -> FrameReport {
        self.history.report()
    }
}
