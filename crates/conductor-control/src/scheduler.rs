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

//! Derives the per-frame execution order from priorities and dependencies.

use crate::error::DependencyError;
use crate::registry::SubsystemEntry;
use conductor_core::graph::dependency_order;
use std::collections::HashMap;
use std::sync::Arc;

/// Computes the execution order of `entries`.
///
/// Subsystems are visited by ascending priority, then by name; each one is
/// preceded by its registered dependencies, themselves visited in the same
/// preferred order. The result depends only on the content of `entries`,
/// never on the order in which they were registered.
///
/// Dependencies naming an unregistered subsystem are ignored.
///
/// # Errors
///
/// Returns [`DependencyError::Cycle`] if the registered dependencies form a cycle.
pub fn compute_order(
    entries: &HashMap<String, Arc<SubsystemEntry>>,
) -> Result<Vec<Arc<SubsystemEntry>>, DependencyError> {
    let mut preferred: Vec<&Arc<SubsystemEntry>> = entries.values().collect();
    preferred.sort_by(|a, b| {
        a.priority()
            .cmp(&b.priority())
            .then_with(|| a.name().cmp(b.name()))
    });
    let preferred_names: Vec<String> = preferred.iter().map(|e| e.name().to_string()).collect();

    let names = dependency_order(&preferred_names, |name| {
        let Some(entry) = entries.get(name) else {
            return Vec::new();
        };
        let mut dependencies: Vec<&Arc<SubsystemEntry>> = Vec::new();
        for dependency in entry.dependencies() {
            match entries.get(dependency) {
                Some(dep) => dependencies.push(dep),
                None => log::debug!(
                    "Scheduler: '{}' depends on unregistered '{}', ignoring",
                    entry.name(),
                    dependency
                ),
            }
        }
        dependencies.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        dependencies
            .into_iter()
            .map(|e| e.name().to_string())
            .collect::<Vec<String>>()
    })?;

    Ok(names
        .iter()
        .filter_map(|name| entries.get(name).cloned())
        .collect())
}
