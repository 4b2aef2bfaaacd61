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

use conductor_control::{DependencyError, IntegrationManager, RegistrationError};
use conductor_core::{Priority, Subsystem, SubsystemContext};

struct Stub;

impl Subsystem for Stub {
    fn update(&mut self, _: &SubsystemContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

type Spec = (&'static str, Priority, &'static [&'static str]);

const WORLD: [Spec; 7] = [
    ("renderer", Priority::High, &["physics", "camera"]),
    ("physics", Priority::Critical, &["input"]),
    ("input", Priority::Critical, &[]),
    ("camera", Priority::Normal, &[]),
    ("audio", Priority::Low, &["camera"]),
    ("ai", Priority::Normal, &["physics", "pathfinding"]),
    ("autosave", Priority::Background, &[]),
];

fn order_for(specs: &[Spec]) -> Vec<String> {
    let manager = IntegrationManager::default();
    for (name, priority, deps) in specs {
        manager.register_subsystem(*name, Stub, *priority, deps).unwrap();
    }
    manager.execution_order()
}

fn position(order: &[String], name: &str) -> usize {
    order.iter().position(|n| n == name).unwrap()
}

#[test]
fn test_every_name_once_and_dependencies_first() {
    let order = order_for(&WORLD);

    assert_eq!(order.len(), WORLD.len());
    for (name, _, deps) in WORLD {
        assert_eq!(order.iter().filter(|n| *n == name).count(), 1);
        for dep in deps {
            // "pathfinding" is never registered and must not appear.
            if let Some(dep_pos) = order.iter().position(|n| n == dep) {
                assert!(
                    dep_pos < position(&order, name),
                    "{dep} must run before {name} in {order:?}"
                );
            }
        }
    }
    assert!(!order.iter().any(|n| n == "pathfinding"));
}

#[test]
fn test_order_is_independent_of_registration_sequence() {
    let reference = order_for(&WORLD);

    let mut reversed = WORLD;
    reversed.reverse();
    assert_eq!(order_for(&reversed), reference);

    let mut rotated = WORLD;
    for _ in 0..WORLD.len() {
        rotated.rotate_left(1);
        assert_eq!(order_for(&rotated), reference);
    }
}

#[test]
fn test_priority_then_name_scenario() {
    // --- ARRANGE ---
    let manager = IntegrationManager::default();
    manager.register_subsystem("A", Stub, Priority::Normal, &[]).unwrap();
    manager.register_subsystem("B", Stub, Priority::Normal, &["A"]).unwrap();
    manager.register_subsystem("C", Stub, Priority::Critical, &[]).unwrap();

    // --- ASSERT ---
    assert_eq!(manager.execution_order(), vec!["C", "A", "B"]);
}

#[test]
fn test_late_dependency_is_honored_once_registered() {
    let manager = IntegrationManager::default();
    manager.register_subsystem("hud", Stub, Priority::Critical, &["fonts"]).unwrap();
    manager.register_subsystem("alpha", Stub, Priority::Critical, &[]).unwrap();
    assert_eq!(manager.execution_order(), vec!["alpha", "hud"]);

    manager.register_subsystem("fonts", Stub, Priority::Low, &[]).unwrap();
    assert_eq!(manager.execution_order(), vec!["alpha", "fonts", "hud"]);
}

#[test]
fn test_cycle_is_rejected_without_side_effect() {
    let manager = IntegrationManager::default();
    manager.register_subsystem("a", Stub, Priority::Normal, &["c"]).unwrap();
    manager.register_subsystem("b", Stub, Priority::Normal, &["a"]).unwrap();
    let before = manager.execution_order();

    let err = manager
        .register_subsystem("c", Stub, Priority::Normal, &["b"])
        .err().expect("registration should fail");

    match err {
        RegistrationError::Dependency(DependencyError::Cycle { path }) => {
            assert_eq!(path.first(), path.last());
            assert_eq!(path.len(), 4);
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
    assert_eq!(manager.execution_order(), before);
    assert!(manager.subsystem_status("c").is_none());
}

#[test]
fn test_self_dependency_is_rejected() {
    let manager = IntegrationManager::default();
    let err = manager
        .register_subsystem("loop", Stub, Priority::Normal, &["loop"])
        .err().expect("registration should fail");
    assert!(matches!(err, RegistrationError::Dependency(_)));
    assert!(manager.execution_order().is_empty());
}

#[test]
fn test_duplicate_name_keeps_first_record() {
    let manager = IntegrationManager::default();
    manager.register_subsystem("audio", Stub, Priority::Low, &[]).unwrap();

    let err = manager
        .register_subsystem("audio", Stub, Priority::Critical, &["x"])
        .err().expect("registration should fail");

    assert_eq!(err, RegistrationError::DuplicateName("audio".to_string()));
    let status = manager.subsystem_status("audio").unwrap();
    assert_eq!(status.priority, Priority::Low);
    assert!(status.dependencies.is_empty());
}

#[test]
fn test_unregister_recomputes_order() {
    let manager = IntegrationManager::default();
    manager.register_subsystem("base", Stub, Priority::Low, &[]).unwrap();
    manager.register_subsystem("top", Stub, Priority::Critical, &["base"]).unwrap();
    assert_eq!(manager.execution_order(), vec!["base", "top"]);

    assert!(manager.unregister("base"));
    assert!(!manager.unregister("base"));
    assert_eq!(manager.execution_order(), vec!["top"]);
}
