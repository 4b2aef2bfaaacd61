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

use conductor_control::lifecycle::{SYSTEMS_INITIALIZED, SYSTEM_ERROR, SYSTEM_UNREGISTERED};
use conductor_control::{IntegrationConfig, IntegrationManager, ManagerState};
use conductor_core::{Priority, Subsystem, SubsystemContext, SubsystemState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type Journal = Arc<Mutex<Vec<String>>>;

/// Records every lifecycle call into a shared journal.
struct Recorder {
    name: &'static str,
    journal: Journal,
    fail_init: bool,
    fail_cleanup: bool,
}

impl Subsystem for Recorder {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(format!("init:{}", self.name));
        if self.fail_init {
            anyhow::bail!("{} could not open its device", self.name);
        }
        Ok(())
    }

    fn update(&mut self, _: &SubsystemContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(format!("cleanup:{}", self.name));
        if self.fail_cleanup {
            anyhow::bail!("{} leaked a handle", self.name);
        }
        Ok(())
    }
}

fn recorder(name: &'static str, journal: &Journal) -> Recorder {
    Recorder {
        name,
        journal: Arc::clone(journal),
        fail_init: false,
        fail_cleanup: false,
    }
}

fn entries(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}

#[test]
fn test_non_critical_init_failure_is_local() {
    // --- 1. ARRANGE ---
    let journal = Journal::default();
    let mut manager = IntegrationManager::default();
    let mut a = recorder("A", &journal);
    a.fail_init = true;
    manager.register_subsystem("A", a, Priority::Normal, &[]).unwrap();
    manager
        .register_subsystem("B", recorder("B", &journal), Priority::Normal, &["A"])
        .unwrap();
    manager
        .register_subsystem("C", recorder("C", &journal), Priority::Critical, &[])
        .unwrap();

    // --- 2. ACT ---
    let ok = manager.initialize_all();

    // --- 3. ASSERT ---
    assert!(ok);
    assert_eq!(manager.state(), ManagerState::Running);
    assert_eq!(entries(&journal, "init:"), vec!["init:C", "init:A", "init:B"]);

    let a = manager.subsystem_status("A").unwrap();
    assert_eq!(a.state, SubsystemState::Error);
    assert_eq!(a.last_error.as_deref(), Some("A could not open its device"));
    assert_eq!(
        manager.subsystem_status("B").unwrap().state,
        SubsystemState::Running
    );

    manager.update_all(0.016);
    let errors = manager.events().history_of(SYSTEM_ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get_str("phase"), Some("initialize"));
    let initialized = manager.events().history_of(SYSTEMS_INITIALIZED);
    assert_eq!(initialized[0].get("failed"), Some(&serde_json::json!(1)));
}

#[test]
fn test_critical_init_failure_aborts() {
    let journal = Journal::default();
    let mut manager = IntegrationManager::default();
    manager
        .register_subsystem("audio", recorder("audio", &journal), Priority::Low, &[])
        .unwrap();
    let mut physics = recorder("physics", &journal);
    physics.fail_init = true;
    manager
        .register_subsystem("physics", physics, Priority::Critical, &[])
        .unwrap();

    assert!(!manager.initialize_all());
    assert_eq!(manager.state(), ManagerState::Error);
    // The sequence stopped at the critical failure.
    assert_eq!(entries(&journal, "init:"), vec!["init:physics"]);
    assert!(manager.update_all(0.016).is_none());
    assert!(manager.snapshot().initialization_progress < 1.0);
}

#[test]
fn test_shutdown_cleans_up_in_reverse_order() {
    let journal = Journal::default();
    let mut manager = IntegrationManager::default();
    manager
        .register_subsystem("render", recorder("render", &journal), Priority::High, &["physics"])
        .unwrap();
    manager
        .register_subsystem("physics", recorder("physics", &journal), Priority::Critical, &[])
        .unwrap();
    manager
        .register_subsystem("audio", recorder("audio", &journal), Priority::Low, &[])
        .unwrap();
    let mut leaky = recorder("leaky", &journal);
    leaky.fail_cleanup = true;
    manager
        .register_subsystem("leaky", leaky, Priority::Normal, &[])
        .unwrap();
    manager.initialize_all();
    assert_eq!(
        manager.execution_order(),
        vec!["physics", "render", "leaky", "audio"]
    );

    manager.shutdown();

    assert_eq!(
        entries(&journal, "cleanup:"),
        vec!["cleanup:audio", "cleanup:leaky", "cleanup:render", "cleanup:physics"]
    );
    assert_eq!(manager.state(), ManagerState::Shutdown);
    assert!(manager.execution_order().is_empty());

    // The failed cleanup is reported once the shutdown drains the bus.
    let errors = manager.events().history_of(SYSTEM_ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get_str("system_name"), Some("leaky"));
    assert_eq!(errors[0].get_str("phase"), Some("cleanup"));
    assert_eq!(
        errors[0].get_str("error_message"),
        Some("leaky leaked a handle")
    );
    assert_eq!(manager.snapshot().global_error_count, 1);

    // A second shutdown (and the one on drop) is a no-op.
    manager.shutdown();
    assert_eq!(entries(&journal, "cleanup:").len(), 4);
    assert_eq!(manager.events().history_of(SYSTEM_ERROR).len(), 1);
}

#[test]
fn test_unregister_survives_failing_cleanup() {
    let journal = Journal::default();
    let mut manager = IntegrationManager::default();
    let mut leaky = recorder("leaky", &journal);
    leaky.fail_cleanup = true;
    manager
        .register_subsystem("leaky", leaky, Priority::Normal, &[])
        .unwrap();
    manager.initialize_all();

    assert!(manager.unregister("leaky"));
    assert!(manager.subsystem_status("leaky").is_none());
    assert_eq!(entries(&journal, "cleanup:"), vec!["cleanup:leaky"]);

    assert_eq!(manager.snapshot().global_error_count, 1);
    assert!(!manager.unregister("leaky"), "cleanup runs only once");

    manager.update_all(0.016);
    let removed = manager.events().history_of(SYSTEM_UNREGISTERED);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].get_str("system_name"), Some("leaky"));
    let errors = manager.events().history_of(SYSTEM_ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get_str("system_name"), Some("leaky"));
    assert_eq!(errors[0].get_str("phase"), Some("cleanup"));
}

/// Fails its first `initialize`, succeeds afterwards, and counts updates.
struct FlakyDevice {
    attempts: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl Subsystem for FlakyDevice {
    fn initialize(&mut self) -> anyhow::Result<()> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("device busy");
        }
        Ok(())
    }

    fn update(&mut self, _: &SubsystemContext<'_>) -> anyhow::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_reset_after_failed_initialize_waits_for_initialization() {
    // --- 1. ARRANGE ---
    let attempts = Arc::new(AtomicUsize::new(0));
    let updates = Arc::new(AtomicUsize::new(0));
    let mut manager = IntegrationManager::default();
    manager
        .register_subsystem(
            "gamepad",
            FlakyDevice {
                attempts: Arc::clone(&attempts),
                updates: Arc::clone(&updates),
            },
            Priority::Normal,
            &[],
        )
        .unwrap();
    assert!(manager.initialize_all());
    assert_eq!(
        manager.subsystem_status("gamepad").unwrap().state,
        SubsystemState::Error
    );

    // --- 2. ACT ---
    assert!(manager.reset("gamepad"));
    manager.update_all(0.016);

    // --- 3. ASSERT ---
    // Never updated before `initialize` succeeds.
    let status = manager.subsystem_status("gamepad").unwrap();
    assert_eq!(status.state, SubsystemState::Uninitialized);
    assert!(status.last_error.is_none());
    assert_eq!(updates.load(Ordering::SeqCst), 0);

    assert!(manager.initialize_all());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    manager.update_all(0.016);
    assert_eq!(
        manager.subsystem_status("gamepad").unwrap().state,
        SubsystemState::Running
    );
    assert_eq!(updates.load(Ordering::SeqCst), 1);
}

struct Ticker {
    ticks: Arc<AtomicUsize>,
}

impl Subsystem for Ticker {
    fn update(&mut self, _: &SubsystemContext<'_>) -> anyhow::Result<()> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_background_subsystems_run_on_their_own_cadence() {
    let mut manager = IntegrationManager::new(IntegrationConfig {
        background_interval_ms: 10,
        ..Default::default()
    })
    .unwrap();
    let ticks = Arc::new(AtomicUsize::new(0));
    manager
        .register_subsystem(
            "autosave",
            Ticker {
                ticks: Arc::clone(&ticks),
            },
            Priority::Background,
            &[],
        )
        .unwrap();

    // Frames never run background subsystems, before or after initialization.
    manager.update_all(0.016);
    assert!(manager.initialize_all());
    let before = ticks.load(Ordering::SeqCst);
    manager.update_all(0.016);

    thread::sleep(Duration::from_millis(150));
    assert!(ticks.load(Ordering::SeqCst) >= before + 2);

    // Paused background subsystems are skipped by the cadence too.
    assert!(manager.pause("autosave"));
    thread::sleep(Duration::from_millis(30));
    let paused_at = ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(ticks.load(Ordering::SeqCst), paused_at);

    let started = Instant::now();
    manager.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));
    let stopped_at = ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
}
