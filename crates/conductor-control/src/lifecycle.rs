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

//! Names and payloads of the events the integration core emits about itself.
//!
//! All of them are queued, so subscribers observe them on the next drain.

use conductor_core::{payload, EventBus, Priority};
use serde_json::json;
use std::fmt;

/// The lifecycle call that failed, as reported in the `phase` payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// `Subsystem::initialize`.
    Initialize,
    /// `Subsystem::cleanup`.
    Cleanup,
}

impl LifecyclePhase {
    /// Name used in event payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            LifecyclePhase::Initialize => "initialize",
            LifecyclePhase::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subsystem was registered. Payload: `system_name`, `priority`.
pub const SYSTEM_REGISTERED: &str = "system_registered";
/// A subsystem was unregistered. Payload: `system_name`.
pub const SYSTEM_UNREGISTERED: &str = "system_unregistered";
/// A subsystem was paused. Payload: `system_name`.
pub const SYSTEM_PAUSED: &str = "system_paused";
/// A subsystem was resumed or reset. Payload: `system_name`.
pub const SYSTEM_RESUMED: &str = "system_resumed";
/// A subsystem failed. Payload: `system_name`, `error_count`, `error_message`,
/// and `phase` for lifecycle failures.
pub const SYSTEM_ERROR: &str = "system_error";
/// Bulk initialization finished. Payload: `total`, `running`, `failed`.
pub const SYSTEMS_INITIALIZED: &str = "systems_initialized";

pub(crate) fn emit_registered(events: &EventBus, name: &str, priority: Priority) {
    events.emit(
        SYSTEM_REGISTERED,
        payload([
            ("system_name", json!(name)),
            ("priority", json!(priority.as_str())),
        ]),
        false,
    );
}

pub(crate) fn emit_named(events: &EventBus, event_type: &str, name: &str) {
    events.emit(event_type, payload([("system_name", json!(name))]), false);
}

pub(crate) fn emit_error(
    events: &EventBus,
    name: &str,
    error_count: u32,
    message: &str,
    phase: Option<LifecyclePhase>,
) {
    let mut data = payload([
        ("system_name", json!(name)),
        ("error_count", json!(error_count)),
        ("error_message", json!(message)),
    ]);
    if let Some(phase) = phase {
        data.insert("phase".to_string(), json!(phase.as_str()));
    }
    events.emit(SYSTEM_ERROR, data, false);
}

pub(crate) fn emit_initialized(events: &EventBus, total: usize, running: usize, failed: usize) {
    events.emit(
        SYSTEMS_INITIALIZED,
        payload([
            ("total", json!(total)),
            ("running", json!(running)),
            ("failed", json!(failed)),
        ]),
        false,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_events_are_queued() {
        let bus = EventBus::new();
        emit_registered(&bus, "audio", Priority::Low);
        emit_error(&bus, "audio", 2, "device lost", Some(LifecyclePhase::Initialize));
        assert_eq!(bus.queued_len(), 2);

        bus.drain();
        let history = bus.history();
        assert_eq!(history[0].event_type, SYSTEM_REGISTERED);
        assert_eq!(history[0].get_str("priority"), Some("low"));
        assert_eq!(history[1].get_str("phase"), Some("initialize"));
        assert_eq!(history[1].get("error_count"), Some(&json!(2)));
    }
}
