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

//! Subsystem registry with an immutable, generation-tagged execution plan.

use crate::error::RegistrationError;
use crate::lifecycle::LifecyclePhase;
use crate::scheduler;
use conductor_core::utils::sync::{lock_or_recover, panic_message};
use conductor_core::utils::timer::Stopwatch;
use conductor_core::{Priority, Subsystem, SubsystemContext, SubsystemHandle, SubsystemState};
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

/// Rolling timing statistics of successful updates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubsystemStats {
    /// Duration of the last successful update, in milliseconds.
    pub last_duration_ms: f32,
    /// Exponentially-smoothed update duration, in milliseconds.
    pub average_duration_ms: f32,
    /// Number of successful updates.
    pub invocation_count: u64,
}

impl SubsystemStats {
    /// Folds a new sample into the moving average.
    pub fn record(&mut self, duration_ms: f32, smoothing_weight: f32) {
        self.last_duration_ms = duration_ms;
        self.average_duration_ms =
            smoothing_weight * duration_ms + (1.0 - smoothing_weight) * self.average_duration_ms;
        self.invocation_count += 1;
    }
}

/// Mutable bookkeeping of one subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsystemRecord {
    /// Lifecycle state.
    pub state: SubsystemState,
    /// Timing statistics.
    pub stats: SubsystemStats,
    /// Net failure count (failures minus successes, floored at zero).
    pub error_count: u32,
    /// Text of the most recent failure.
    pub last_error: Option<String>,
    /// Failure count at which the subsystem is quarantined.
    pub error_threshold: u32,
    /// Lifecycle call that moved the subsystem to `Error`, if any.
    pub failed_phase: Option<LifecyclePhase>,
}

impl SubsystemRecord {
    fn new(error_threshold: u32) -> Self {
        Self {
            state: SubsystemState::Uninitialized,
            stats: SubsystemStats::default(),
            error_count: 0,
            last_error: None,
            error_threshold,
            failed_phase: None,
        }
    }
}

/// A registered subsystem: immutable metadata, its handle and its record.
///
/// Entries are shared by reference count between the registry, the frame
/// path and the background cadence. The record sits behind its own lock so
/// that neither domain holds the registry lock while a subsystem runs.
pub struct SubsystemEntry {
    name: String,
    priority: Priority,
    dependencies: BTreeSet<String>,
    handle: SubsystemHandle,
    record: std::sync::Mutex<SubsystemRecord>,
}

impl SubsystemEntry {
    /// Creates an `Uninitialized` entry.
    pub fn new(
        name: impl Into<String>,
        handle: SubsystemHandle,
        priority: Priority,
        dependencies: BTreeSet<String>,
        error_threshold: u32,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            dependencies,
            handle,
            record: std::sync::Mutex::new(SubsystemRecord::new(error_threshold)),
        }
    }

    /// The unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The priority class.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Declared dependency names, registered or not.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// The subsystem handle.
    pub fn handle(&self) -> &SubsystemHandle {
        &self.handle
    }

    /// Locks and returns the mutable record.
    pub fn record(&self) -> MutexGuard<'_, SubsystemRecord> {
        lock_or_recover(&self.record)
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SubsystemState {
        self.record().state
    }

    /// Overwrites the lifecycle state.
    pub fn set_state(&self, state: SubsystemState) {
        self.record().state = state;
    }

    /// Atomically moves from `from` to `to`; returns `false` if the state was not `from`.
    pub fn transition(&self, from: SubsystemState, to: SubsystemState) -> bool {
        let mut record = self.record();
        if record.state != from {
            return false;
        }
        record.state = to;
        true
    }

    /// Calls `initialize`, converting errors and panics into failure text.
    pub fn invoke_initialize(&self) -> Result<(), String> {
        self.invoke(|subsystem| subsystem.initialize())
    }

    /// Calls `update` and times it, converting errors and panics into failure text.
    pub fn invoke_update(&self, context: &SubsystemContext<'_>) -> (Duration, Result<(), String>) {
        let watch = Stopwatch::new();
        let result = self.invoke(|subsystem| subsystem.update(context));
        (watch.elapsed(), result)
    }

    /// Calls `cleanup`, converting errors and panics into failure text.
    pub fn invoke_cleanup(&self) -> Result<(), String> {
        self.invoke(|subsystem| subsystem.cleanup())
    }

    fn invoke<F>(&self, op: F) -> Result<(), String>
    where
        F: FnOnce(&mut dyn Subsystem) -> anyhow::Result<()>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut subsystem = lock_or_recover(&self.handle);
            op(&mut *subsystem)
        }));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
        }
    }
}

impl std::fmt::Debug for SubsystemEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsystemEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .field("record", &*self.record())
            .finish_non_exhaustive()
    }
}

/// The derived execution order, shared immutably with both execution domains.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Incremented on every registry mutation.
    pub generation: u64,
    /// Entries in execution order.
    pub entries: Arc<[Arc<SubsystemEntry>]>,
}

impl ExecutionPlan {
    fn empty() -> Self {
        Self {
            generation: 0,
            entries: Arc::from(Vec::new()),
        }
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }
}

/// Registry that owns subsystem entries and keeps their execution order current.
///
/// Every mutation recomputes the order through the [`scheduler`] and
/// publishes it as a fresh [`ExecutionPlan`]. Readers clone the plan, which
/// is a reference-count bump, and release the registry lock before running
/// anything.
#[derive(Debug)]
pub struct SubsystemRegistry {
    entries: HashMap<String, Arc<SubsystemEntry>>,
    plan: ExecutionPlan,
}

impl SubsystemRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            plan: ExecutionPlan::empty(),
        }
    }

    /// Adds an entry and recomputes the execution order.
    ///
    /// Fails without modifying the registry if the name is taken or if the
    /// entry's dependencies would close a cycle.
    pub fn insert(&mut self, entry: SubsystemEntry) -> Result<Arc<SubsystemEntry>, RegistrationError> {
        if self.entries.contains_key(entry.name()) {
            return Err(RegistrationError::DuplicateName(entry.name().to_string()));
        }

        let entry = Arc::new(entry);
        self.entries
            .insert(entry.name().to_string(), Arc::clone(&entry));

        match scheduler::compute_order(&self.entries) {
            Ok(order) => {
                self.publish(order);
                Ok(entry)
            }
            Err(err) => {
                self.entries.remove(entry.name());
                Err(err.into())
            }
        }
    }

    /// Removes an entry and recomputes the execution order.
    pub fn remove(&mut self, name: &str) -> Option<Arc<SubsystemEntry>> {
        let entry = self.entries.remove(name)?;
        // Removing a node can only break cycles, never create them.
        match scheduler::compute_order(&self.entries) {
            Ok(order) => self.publish(order),
            Err(err) => log::error!("SubsystemRegistry: order rebuild failed after removal: {err}"),
        }
        Some(entry)
    }

    /// Removes every entry, returning them in reverse execution order.
    pub fn drain_reverse(&mut self) -> Vec<Arc<SubsystemEntry>> {
        let reversed: Vec<_> = self.plan.entries.iter().rev().cloned().collect();
        self.entries.clear();
        self.publish(Vec::new());
        reversed
    }

    /// Returns the entry registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<SubsystemEntry>> {
        self.entries.get(name).cloned()
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of registered subsystems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no subsystems are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current execution plan.
    pub fn plan(&self) -> ExecutionPlan {
        self.plan.clone()
    }

    /// Returns the generation of the current plan.
    pub fn generation(&self) -> u64 {
        self.plan.generation
    }

    /// Returns the registered subsystems with priority `Background` that are `Running`.
    pub fn background_snapshot(&self) -> Vec<Arc<SubsystemEntry>> {
        self.plan
            .entries
            .iter()
            .filter(|e| e.priority() == Priority::Background)
            .filter(|e| e.state() == SubsystemState::Running)
            .cloned()
            .collect()
    }

    /// Returns the names of registered subsystems that depend on `name`, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.dependencies().contains(name))
            .map(|e| e.name().to_string())
            .collect();
        dependents.sort();
        dependents
    }

    fn publish(&mut self, order: Vec<Arc<SubsystemEntry>>) {
        self.plan = ExecutionPlan {
            generation: self.plan.generation + 1,
            entries: Arc::from(order),
        };
        log::debug!(
            "SubsystemRegistry: execution order (gen {}) = {:?}",
            self.plan.generation,
            self.plan.names()
        );
    }
}

impl Default for SubsystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}
