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

//! Provides the publish/subscribe primitives used for inter-subsystem signaling.
//!
//! Events are keyed by a free-form type name and carry a string-keyed JSON
//! payload. The [`EventBus`] delivers them either immediately, on the caller's
//! thread, or through a FIFO queue that the frame loop drains once per frame.

mod bus;
mod event;

pub use self::bus::{EventBus, EventBusStats, EventHandler, DEFAULT_HISTORY_CAPACITY};
pub use self::event::{payload, Event, Payload};
