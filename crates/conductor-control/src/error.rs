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

//! Defines the error types returned by the registration surface.

use conductor_core::graph::CycleError;
use std::fmt;

/// An error in the declared dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// Following dependencies leads back to the starting subsystem.
    Cycle {
        /// Subsystem names along the cycle, first name repeated at the end.
        path: Vec<String>,
    },
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyError::Cycle { path } => {
                write!(f, "Dependency cycle: {}", path.join(" -> "))
            }
        }
    }
}

impl std::error::Error for DependencyError {}

impl From<CycleError<String>> for DependencyError {
    fn from(err: CycleError<String>) -> Self {
        DependencyError::Cycle { path: err.cycle }
    }
}

/// An error returned when a subsystem cannot be registered.
///
/// A failed registration never modifies the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A subsystem with this name is already registered.
    DuplicateName(String),
    /// Accepting the registration would break the dependency graph.
    Dependency(DependencyError),
    /// The manager has been shut down.
    ManagerShutDown,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::DuplicateName(name) => {
                write!(f, "Subsystem '{name}' is already registered")
            }
            RegistrationError::Dependency(err) => write!(f, "Invalid dependencies: {err}"),
            RegistrationError::ManagerShutDown => {
                write!(f, "The integration manager has been shut down")
            }
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistrationError::Dependency(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DependencyError> for RegistrationError {
    fn from(err: DependencyError) -> Self {
        RegistrationError::Dependency(err)
    }
}
