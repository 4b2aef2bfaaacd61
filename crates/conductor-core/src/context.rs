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

//! Per-invocation context handed to subsystems.

use crate::event::EventBus;

/// Context passed to [`Subsystem::update`](crate::Subsystem::update).
///
/// The event bus is the only shared service a subsystem can reach from inside
/// its update. Subsystems may emit (immediately or queued) and subscribe, but
/// they never see the registry, so they cannot reorder or remove siblings
/// mid-frame.
pub struct SubsystemContext<'a> {
    /// Seconds elapsed since the previous invocation of this loop.
    pub delta_time: f32,
    /// The shared event bus.
    pub events: &'a EventBus,
}

impl<'a> SubsystemContext<'a> {
    /// Creates a new context for one round of invocations.
    pub fn new(delta_time: f32, events: &'a EventBus) -> Self {
        Self { delta_time, events }
    }
}
