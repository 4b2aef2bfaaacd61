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

//! The integration manager: the single entry point hosts drive each frame.

use crate::background::BackgroundRunner;
use crate::config::{ConfigError, IntegrationConfig};
use crate::error::RegistrationError;
use crate::executor::FrameBudgetExecutor;
use crate::isolation::ErrorIsolation;
use crate::lifecycle::{self, LifecyclePhase, SYSTEM_PAUSED, SYSTEM_RESUMED, SYSTEM_UNREGISTERED};
use crate::metrics::{FrameReport, FrameSample};
use crate::registry::{ExecutionPlan, SubsystemEntry, SubsystemRegistry};
use crate::status::{ManagerSnapshot, SubsystemStatus};
use conductor_core::utils::sync::lock_or_recover;
use conductor_core::{
    into_handle, EventBus, EventHandler, Payload, Priority, Subsystem, SubsystemHandle,
    SubsystemState,
};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle state of the manager itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// Created, bulk initialization not run yet.
    #[default]
    Uninitialized,
    /// Bulk initialization in progress.
    Initializing,
    /// Frames are being served.
    Running,
    /// A critical subsystem failed to initialize.
    Error,
    /// Shutdown in progress.
    ShuttingDown,
    /// Every subsystem has been cleaned up; registration is closed.
    Shutdown,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::Initializing => "initializing",
            ManagerState::Running => "running",
            ManagerState::Error => "error",
            ManagerState::ShuttingDown => "shutting_down",
            ManagerState::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Owns the registered subsystems and drives them.
///
/// The host registers subsystems, calls [`initialize_all`](Self::initialize_all)
/// once, then [`update_all`](Self::update_all) every frame, and finally
/// [`shutdown`](Self::shutdown) (also run on drop). `Background` subsystems
/// are updated by a dedicated thread started at the end of initialization.
///
/// ```
/// use conductor_control::IntegrationManager;
/// use conductor_core::{Priority, Subsystem, SubsystemContext};
///
/// struct Physics;
///
/// impl Subsystem for Physics {
///     fn update(&mut self, ctx: &SubsystemContext<'_>) -> anyhow::Result<()> {
///         let _ = ctx.delta_time;
///         Ok(())
///     }
/// }
///
/// let mut manager = IntegrationManager::default();
/// manager
///     .register_subsystem("physics", Physics, Priority::Critical, &[])
///     .unwrap();
/// assert!(manager.initialize_all());
/// manager.update_all(1.0 / 60.0);
/// manager.shutdown();
/// ```
pub struct IntegrationManager {
    config: IntegrationConfig,
    registry: Arc<Mutex<SubsystemRegistry>>,
    events: Arc<EventBus>,
    isolation: Arc<ErrorIsolation>,
    executor: FrameBudgetExecutor,
    background: BackgroundRunner,
    state: ManagerState,
    initialization_progress: f32,
}

impl IntegrationManager {
    /// Creates a manager from a validated configuration.
    pub fn new(config: IntegrationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!("Integration: manager created.");
        Ok(Self::build(config))
    }

    fn build(config: IntegrationConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(SubsystemRegistry::new())),
            events: Arc::new(EventBus::with_history_capacity(
                config.event_history_capacity,
            )),
            isolation: Arc::new(ErrorIsolation::new(config.error_isolation_enabled)),
            executor: FrameBudgetExecutor::new(&config),
            background: BackgroundRunner::new(
                config.background_interval(),
                config.background_join_timeout(),
            ),
            state: ManagerState::Uninitialized,
            initialization_progress: 0.0,
            config,
        }
    }

    /// The shared event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// The manager lifecycle state.
    pub fn state(&self) -> ManagerState {
        self.state
    }

    fn registry(&self) -> MutexGuard<'_, SubsystemRegistry> {
        lock_or_recover(&self.registry)
    }

    fn entry(&self, name: &str) -> Option<Arc<SubsystemEntry>> {
        self.registry().get(name)
    }

    fn plan(&self) -> ExecutionPlan {
        self.registry().plan()
    }

    // --- Registration ---

    /// Registers a subsystem under a unique `name`.
    ///
    /// The subsystem starts `Uninitialized`; it is initialized by the next
    /// [`initialize_all`](Self::initialize_all). Dependencies on names that
    /// are not registered are ignored until they are.
    ///
    /// # Errors
    ///
    /// Fails without side effect if the name is taken, if the dependencies
    /// would close a cycle, or if the manager has been shut down.
    pub fn register(
        &self,
        name: impl Into<String>,
        handle: SubsystemHandle,
        priority: Priority,
        dependencies: &[&str],
    ) -> Result<(), RegistrationError> {
        if matches!(
            self.state,
            ManagerState::ShuttingDown | ManagerState::Shutdown
        ) {
            return Err(RegistrationError::ManagerShutDown);
        }

        let entry = SubsystemEntry::new(
            name,
            handle,
            priority,
            dependencies.iter().map(|d| d.to_string()).collect(),
            self.config.error_threshold,
        );
        let entry = self.registry().insert(entry).map_err(|e| {
            log::warn!("Integration: registration rejected: {e}");
            e
        })?;

        log::info!(
            "Integration: registered '{}' ({} priority).",
            entry.name(),
            priority
        );
        lifecycle::emit_registered(&self.events, entry.name(), priority);
        Ok(())
    }

    /// Wraps `subsystem` into a handle and registers it; returns the handle.
    pub fn register_subsystem<S: Subsystem + 'static>(
        &self,
        name: impl Into<String>,
        subsystem: S,
        priority: Priority,
        dependencies: &[&str],
    ) -> Result<SubsystemHandle, RegistrationError> {
        let handle = into_handle(subsystem);
        self.register(name, Arc::clone(&handle), priority, dependencies)?;
        Ok(handle)
    }

    /// Removes a subsystem and cleans it up.
    ///
    /// A failing `cleanup` moves the subsystem to `Error` and is reported as
    /// a `system_error` event with phase `cleanup`; removal proceeds anyway.
    /// Returns `false` if no such subsystem is registered.
    pub fn unregister(&self, name: &str) -> bool {
        let Some(entry) = self.registry().remove(name) else {
            return false;
        };
        self.cleanup_entry(&entry);

        log::info!("Integration: unregistered '{name}'.");
        lifecycle::emit_named(&self.events, SYSTEM_UNREGISTERED, name);
        true
    }

    /// Runs `cleanup` once. Returns `false` if teardown had already started.
    fn cleanup_entry(&self, entry: &SubsystemEntry) -> bool {
        {
            let mut record = entry.record();
            if record.state.is_terminal() {
                return false;
            }
            record.state = SubsystemState::ShuttingDown;
        }
        match entry.invoke_cleanup() {
            Ok(()) => entry.set_state(SubsystemState::Shutdown),
            Err(message) => self.isolation.record_lifecycle_failure(
                entry,
                LifecyclePhase::Cleanup,
                &message,
                &self.events,
            ),
        }
        true
    }

    /// Suspends a `Running` subsystem.
    pub fn pause(&self, name: &str) -> bool {
        let paused = self
            .entry(name)
            .is_some_and(|e| e.transition(SubsystemState::Running, SubsystemState::Paused));
        if paused {
            log::info!("Integration: paused '{name}'.");
            lifecycle::emit_named(&self.events, SYSTEM_PAUSED, name);
        }
        paused
    }

    /// Resumes a `Paused` subsystem.
    pub fn resume(&self, name: &str) -> bool {
        let resumed = self
            .entry(name)
            .is_some_and(|e| e.transition(SubsystemState::Paused, SubsystemState::Running));
        if resumed {
            log::info!("Integration: resumed '{name}'.");
            lifecycle::emit_named(&self.events, SYSTEM_RESUMED, name);
        }
        resumed
    }

    /// Re-admits a subsystem in `Error`, clearing its error record.
    ///
    /// A quarantined subsystem resumes `Running`. One whose `initialize`
    /// failed goes back to `Uninitialized` and is retried by the next
    /// [`initialize_all`](Self::initialize_all). Returns `false` unless the
    /// subsystem is in `Error`.
    pub fn reset(&self, name: &str) -> bool {
        let Some(state) = self.entry(name).and_then(|e| self.isolation.reset(&e)) else {
            return false;
        };
        if state == SubsystemState::Running {
            log::info!("Integration: reset '{name}' after quarantine.");
            lifecycle::emit_named(&self.events, SYSTEM_RESUMED, name);
        } else {
            log::info!("Integration: reset '{name}', awaiting initialization.");
        }
        true
    }

    /// Overrides the quarantine threshold of one subsystem.
    pub fn set_error_threshold(&self, name: &str, threshold: u32) -> bool {
        match self.entry(name) {
            Some(entry) if threshold > 0 => {
                entry.record().error_threshold = threshold;
                true
            }
            _ => false,
        }
    }

    // --- Bulk operations ---

    /// Initializes every `Uninitialized` subsystem in execution order, then
    /// starts the background cadence.
    ///
    /// A failing non-critical subsystem moves to `Error` and the sequence
    /// continues. A failing `Critical` subsystem aborts it: the manager moves
    /// to `Error` and `false` is returned.
    pub fn initialize_all(&mut self) -> bool {
        if matches!(
            self.state,
            ManagerState::ShuttingDown | ManagerState::Shutdown
        ) {
            log::warn!("Integration: cannot initialize after shutdown.");
            return false;
        }

        self.state = ManagerState::Initializing;
        self.initialization_progress = 0.0;
        let plan = self.plan();
        let total = plan.entries.len();
        let mut initialized = 0;
        let mut failed = 0;

        for entry in plan.entries.iter() {
            if entry.transition(SubsystemState::Uninitialized, SubsystemState::Initializing) {
                log::debug!("Integration: initializing '{}'.", entry.name());
                match entry.invoke_initialize() {
                    Ok(()) => {
                        entry.set_state(SubsystemState::Running);
                    }
                    Err(message) => {
                        failed += 1;
                        self.isolation.record_lifecycle_failure(
                            entry,
                            LifecyclePhase::Initialize,
                            &message,
                            &self.events,
                        );
                        if entry.priority() == Priority::Critical {
                            log::error!(
                                "Integration: critical subsystem '{}' failed to initialize, aborting.",
                                entry.name()
                            );
                            self.state = ManagerState::Error;
                            return false;
                        }
                        continue;
                    }
                }
            }
            if entry.state() == SubsystemState::Running {
                initialized += 1;
                self.initialization_progress = initialized as f32 / total as f32;
            }
        }

        self.state = ManagerState::Running;
        self.initialization_progress = 1.0;

        if !self.background.is_running() {
            if let Err(e) = self.background.start(
                Arc::clone(&self.registry),
                Arc::clone(&self.events),
                Arc::clone(&self.isolation),
                self.config.smoothing_weight,
            ) {
                log::error!("Integration: failed to start the background cadence: {e}");
            }
        }

        log::info!(
            "Integration: initialization complete, {initialized}/{total} running, {failed} failed."
        );
        lifecycle::emit_initialized(&self.events, total, initialized, failed);
        true
    }

    /// Runs one frame. Does nothing unless the manager is `Running`.
    pub fn update_all(&mut self, delta_time: f32) -> Option<FrameSample> {
        if self.state != ManagerState::Running {
            return None;
        }
        let plan = self.plan();
        Some(
            self.executor
                .run_frame(&plan, delta_time, &self.events, &self.isolation),
        )
    }

    /// Stops the background cadence and cleans up every subsystem in
    /// reverse execution order, then delivers the queued events.
    pub fn shutdown(&mut self) {
        if self.state == ManagerState::Shutdown {
            return;
        }
        log::info!("Integration: shutting down.");
        self.state = ManagerState::ShuttingDown;

        self.background.stop();

        let entries = self.registry().drain_reverse();
        for entry in &entries {
            if self.cleanup_entry(entry) {
                log::debug!("Integration: cleaned up '{}'.", entry.name());
            }
        }
        // No frame follows; deliver teardown events now.
        self.events.drain();

        self.state = ManagerState::Shutdown;
        log::info!(
            "Integration: shutdown complete ({} subsystems cleaned up).",
            entries.len()
        );
    }

    // --- Queries ---

    /// Status of one subsystem.
    pub fn subsystem_status(&self, name: &str) -> Option<SubsystemStatus> {
        let registry = self.registry();
        let entry = registry.get(name)?;
        Some(SubsystemStatus::of(&entry, registry.dependents_of(name)))
    }

    /// Status of every subsystem, in execution order.
    pub fn subsystem_statuses(&self) -> Vec<SubsystemStatus> {
        let registry = self.registry();
        let plan = registry.plan();
        plan.entries
            .iter()
            .map(|e| SubsystemStatus::of(e, registry.dependents_of(e.name())))
            .collect()
    }

    /// Names in the current execution order.
    pub fn execution_order(&self) -> Vec<String> {
        self.plan().names()
    }

    /// Aggregate view of the manager.
    pub fn snapshot(&self) -> ManagerSnapshot {
        let plan = self.plan();
        let mut running = 0;
        let mut paused = 0;
        let mut errored = 0;
        for entry in plan.entries.iter() {
            match entry.state() {
                SubsystemState::Running => running += 1,
                SubsystemState::Paused => paused += 1,
                SubsystemState::Error => errored += 1,
                _ => {}
            }
        }

        ManagerSnapshot {
            state: self.state,
            initialization_progress: self.initialization_progress,
            total_systems: plan.entries.len(),
            running_systems: running,
            paused_systems: paused,
            error_systems: errored,
            average_frame_time_ms: self.executor.average_frame_time_ms(),
            frame_count: self.executor.frame_count(),
            global_error_count: self.isolation.global_error_count(),
            execution_order: plan.names(),
            events: self.events.stats(),
        }
    }

    /// Statistics over the retained frame history.
    pub fn frame_report(&self) -> FrameReport {
        self.executor.report()
    }

    // --- Events ---

    /// Subscribes `handler` to `event_type`. See [`EventBus::subscribe`].
    pub fn subscribe(&self, event_type: impl Into<String>, handler: EventHandler) -> bool {
        self.events.subscribe(event_type, handler)
    }

    /// Unsubscribes `handler` from `event_type`. See [`EventBus::unsubscribe`].
    pub fn unsubscribe(&self, event_type: &str, handler: &EventHandler) -> bool {
        self.events.unsubscribe(event_type, handler)
    }

    /// Emits an event. See [`EventBus::emit`].
    pub fn emit(&self, event_type: impl Into<String>, payload: Payload, immediate: bool) {
        self.events.emit(event_type, payload, immediate);
    }
}

impl Default for IntegrationManager {
    fn default() -> Self {
        Self::build(IntegrationConfig::default())
    }
}

impl fmt::Debug for IntegrationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationManager")
            .field("state", &self.state)
            .field("subsystems", &self.registry().len())
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

impl Drop for IntegrationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
