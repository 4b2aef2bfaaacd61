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

//! # Conductor Core
//!
//! Foundational crate containing the subsystem lifecycle contract, the
//! publish/subscribe event bus and the ordering primitives that the
//! integration core is built on.

#![warn(missing_docs)]

pub mod context;
pub mod event;
pub mod graph;
pub mod subsystem;
pub mod utils;

pub use context::SubsystemContext;
pub use event::{payload, Event, EventBus, EventBusStats, EventHandler, Payload};
pub use subsystem::{into_handle, Priority, Subsystem, SubsystemHandle, SubsystemState};
pub use utils::timer::Stopwatch;
