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

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// String-keyed event payload.
pub type Payload = BTreeMap<String, Value>;

/// Builds a [`Payload`] from key/value pairs.
///
/// ```rust
/// use conductor_core::payload;
///
/// let data = payload([("system_name", "audio".into()), ("error_count", 3.into())]);
/// assert_eq!(data["error_count"], 3);
/// ```
pub fn payload<K, I>(pairs: I) -> Payload
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// A single published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Free-form type name subscribers are keyed on.
    pub event_type: String,
    /// Arbitrary data attached by the emitter.
    pub payload: Payload,
    /// Wall-clock time of emission.
    pub timestamp: SystemTime,
    /// Whether the event bypassed the queue.
    pub immediate: bool,
}

impl Event {
    /// Creates a new event stamped with the current time.
    pub fn new(event_type: impl Into<String>, payload: Payload, immediate: bool) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: SystemTime::now(),
            immediate,
        }
    }

    /// Returns the payload value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Returns the payload value stored under `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}
