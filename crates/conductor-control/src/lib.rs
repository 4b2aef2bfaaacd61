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

//! # Conductor Control
//!
//! The system integration core: it owns registered subsystems, derives their
//! execution order, runs them under per-frame time budgets, quarantines the
//! ones that keep failing and drives background subsystems on their own
//! cadence.
//!
//! [`IntegrationManager`] is the entry point; the other modules are exposed
//! for hosts that want to compose the pieces differently.

#![warn(missing_docs)]

pub mod background;
pub mod config;
pub mod error;
pub mod executor;
pub mod isolation;
pub mod lifecycle;
pub mod manager;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod status;

pub use config::{ConfigError, IntegrationConfig, PriorityBudgets};
pub use error::{DependencyError, RegistrationError};
pub use manager::{IntegrationManager, ManagerState};
pub use metrics::{FrameReport, FrameSample};
pub use status::{ManagerSnapshot, SubsystemStatus};
