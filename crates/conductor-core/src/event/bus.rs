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

use super::event::{Event, Payload};
use crate::utils::ring::RingBuffer;
use crate::utils::sync::{lock_or_recover, panic_message};
use crate::utils::timer::Stopwatch;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of dispatched events kept for diagnostics.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// A subscriber callback.
///
/// Handler identity is the shared allocation: subscribing a clone of the same
/// `Arc` twice is a no-op, and unsubscribing requires a clone of that `Arc`.
pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Aggregate counters describing bus activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventBusStats {
    /// Number of handlers per event type.
    pub listeners: HashMap<String, usize>,
    /// Events waiting for the next drain.
    pub queued_events: usize,
    /// Events dispatched since creation.
    pub events_processed: u64,
    /// Cumulative time spent dispatching, in milliseconds.
    pub processing_time_ms: f64,
    /// Mean dispatch time per event, in milliseconds.
    pub average_processing_time_ms: f64,
}

/// Type-keyed publish/subscribe bus with immediate and deferred delivery.
///
/// Deferred events travel through an unbounded channel so that any thread
/// (including the background cadence) can enqueue without contending on the
/// subscriber table. Handlers are always invoked with no internal lock held,
/// so they may subscribe, unsubscribe or emit re-entrantly.
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<EventHandler>>>,
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    history: Mutex<RingBuffer<Event>>,
    events_processed: AtomicU64,
    processing_time_ns: AtomicU64,
}

impl EventBus {
    /// Creates a new bus with the default history capacity.
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Creates a new bus keeping at most `capacity` dispatched events.
    pub fn with_history_capacity(capacity: usize) -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus initialized (history capacity {capacity}).");
        Self {
            listeners: Mutex::new(HashMap::new()),
            sender,
            receiver,
            history: Mutex::new(RingBuffer::new(capacity)),
            events_processed: AtomicU64::new(0),
            processing_time_ns: AtomicU64::new(0),
        }
    }

    /// Subscribes `handler` to `event_type`.
    ///
    /// Returns `false` if this exact handler was already subscribed.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: EventHandler) -> bool {
        let mut listeners = lock_or_recover(&self.listeners);
        let handlers = listeners.entry(event_type.into()).or_default();
        if handlers.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Removes `handler` from `event_type`.
    ///
    /// Returns `false` (and does nothing) if it was not subscribed.
    pub fn unsubscribe(&self, event_type: &str, handler: &EventHandler) -> bool {
        let mut listeners = lock_or_recover(&self.listeners);
        let Some(handlers) = listeners.get_mut(event_type) else {
            return false;
        };
        let Some(position) = handlers.iter().position(|h| same_handler(h, handler)) else {
            return false;
        };
        handlers.remove(position);
        if handlers.is_empty() {
            listeners.remove(event_type);
        }
        true
    }

    /// Emits an event.
    ///
    /// With `immediate` set, every current subscriber has been invoked by the
    /// time this returns. Otherwise the event is queued and delivered by the
    /// next [`drain`](Self::drain), in emission order.
    pub fn emit(&self, event_type: impl Into<String>, payload: Payload, immediate: bool) {
        self.publish(Event::new(event_type, payload, immediate));
    }

    /// Publishes a pre-built event, honoring its `immediate` flag.
    pub fn publish(&self, event: Event) {
        if event.immediate {
            self.dispatch(event);
            return;
        }

        log::trace!("Queueing event '{}'.", event.event_type);
        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to queue event: {e}. Receiver likely disconnected.");
        }
    }

    /// Dispatches every event that was queued when the drain started.
    ///
    /// Events queued by handlers during the drain wait for the next one, so a
    /// handler that re-emits its own event type cannot stall the frame.
    /// Returns the number of events dispatched.
    pub fn drain(&self) -> usize {
        let pending = self.receiver.len();
        let mut dispatched = 0;
        while dispatched < pending {
            match self.receiver.try_recv() {
                Ok(event) => {
                    self.dispatch(event);
                    dispatched += 1;
                }
                Err(_) => break,
            }
        }
        if dispatched > 0 {
            log::trace!("Drained {dispatched} queued events.");
        }
        dispatched
    }

    /// Returns the number of events waiting for the next drain.
    pub fn queued_len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the number of handlers subscribed to `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        lock_or_recover(&self.listeners)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Returns the retained dispatch history, oldest first.
    pub fn history(&self) -> Vec<Event> {
        lock_or_recover(&self.history).iter().cloned().collect()
    }

    /// Returns the retained history entries of one event type, oldest first.
    pub fn history_of(&self, event_type: &str) -> Vec<Event> {
        lock_or_recover(&self.history)
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns a snapshot of the bus counters.
    pub fn stats(&self) -> EventBusStats {
        let listeners = lock_or_recover(&self.listeners)
            .iter()
            .map(|(event_type, handlers)| (event_type.clone(), handlers.len()))
            .collect();
        let events_processed = self.events_processed.load(Ordering::Relaxed);
        let processing_time_ms = self.processing_time_ns.load(Ordering::Relaxed) as f64 / 1.0e6;
        EventBusStats {
            listeners,
            queued_events: self.queued_len(),
            events_processed,
            processing_time_ms,
            average_processing_time_ms: processing_time_ms / events_processed.max(1) as f64,
        }
    }

    fn dispatch(&self, event: Event) {
        let watch = Stopwatch::new();
        let handlers: Vec<EventHandler> = lock_or_recover(&self.listeners)
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Event handler for '{}' failed: {e:#}", event.event_type);
                }
                Err(payload) => {
                    log::error!(
                        "Event handler for '{}' panicked: {}",
                        event.event_type,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        self.events_processed.fetch_add(1, Ordering::Relaxed);
        self.processing_time_ns
            .fetch_add(watch.elapsed().as_nanos() as u64, Ordering::Relaxed);
        lock_or_recover(&self.history).push(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("queued_events", &self.queued_len())
            .field("events_processed", &self.events_processed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        let handler: EventHandler = Arc::new(move |_: &Event| -> anyhow::Result<()> {
            clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, handler)
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, EventHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&seen);
        let handler: EventHandler = Arc::new(move |event: &Event| -> anyhow::Result<()> {
            let tag = event.get_str("tag").unwrap_or_default().to_string();
            clone.lock().unwrap().push(tag);
            Ok(())
        });
        (seen, handler)
    }

    fn tagged(tag: &str) -> Payload {
        payload([("tag", Value::from(tag))])
    }

    #[test]
    fn immediate_emit_delivers_before_returning() {
        let bus = EventBus::new();
        let (count, handler) = counter();
        bus.subscribe("ping", handler);

        bus.emit("ping", Payload::new(), true);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.queued_len(), 0);
    }

    #[test]
    fn deferred_emit_waits_for_drain() {
        let bus = EventBus::new();
        let (count, handler) = counter();
        bus.subscribe("ping", handler);

        bus.emit("ping", Payload::new(), false);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.queued_len(), 1);

        assert_eq!(bus.drain(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.drain(), 0);
    }

    #[test]
    fn drain_preserves_fifo_order() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe("step", handler);

        for tag in ["first", "second", "third"] {
            bus.emit("step", tagged(tag), false);
        }
        bus.drain();

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicate_subscription_is_ignored() {
        let bus = EventBus::new();
        let (count, handler) = counter();

        assert!(bus.subscribe("ping", Arc::clone(&handler)));
        assert!(!bus.subscribe("ping", Arc::clone(&handler)));
        assert_eq!(bus.listener_count("ping"), 1);

        bus.emit("ping", Payload::new(), true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_handlers_with_same_body_both_subscribe() {
        let bus = EventBus::new();
        let (_, first) = counter();
        let (_, second) = counter();
        assert!(bus.subscribe("ping", first));
        assert!(bus.subscribe("ping", second));
        assert_eq!(bus.listener_count("ping"), 2);
    }

    #[test]
    fn unsubscribe_absent_handler_is_noop() {
        let bus = EventBus::new();
        let (_, subscribed) = counter();
        let (_, stranger) = counter();
        bus.subscribe("ping", subscribed);

        assert!(!bus.unsubscribe("ping", &stranger));
        assert!(!bus.unsubscribe("unknown", &stranger));
        assert_eq!(bus.listener_count("ping"), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (count, handler) = counter();
        bus.subscribe("ping", Arc::clone(&handler));

        assert!(bus.unsubscribe("ping", &handler));
        bus.emit("ping", Payload::new(), true);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count("ping"), 0);
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let failing: EventHandler =
            Arc::new(|_: &Event| -> anyhow::Result<()> { Err(anyhow::anyhow!("handler exploded")) });
        let panicking: EventHandler =
            Arc::new(|_: &Event| -> anyhow::Result<()> { panic!("handler panicked") });
        let (count, healthy) = counter();

        bus.subscribe("ping", failing);
        bus.subscribe("ping", panicking);
        bus.subscribe("ping", healthy);

        bus.emit("ping", Payload::new(), true);
        bus.emit("ping", Payload::new(), false);
        bus.drain();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(bus.stats().events_processed, 2);
    }

    #[test]
    fn events_queued_during_drain_wait_for_next_drain() {
        let bus = Arc::new(EventBus::new());
        let weak = Arc::downgrade(&bus);
        let echo: EventHandler = Arc::new(move |_: &Event| -> anyhow::Result<()> {
            if let Some(bus) = weak.upgrade() {
                bus.emit("echo", Payload::new(), false);
            }
            Ok(())
        });
        bus.subscribe("echo", echo);

        bus.emit("echo", Payload::new(), false);
        assert_eq!(bus.drain(), 1);
        assert_eq!(bus.queued_len(), 1);
        assert_eq!(bus.drain(), 1);
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let bus = EventBus::with_history_capacity(2);
        for tag in ["a", "b", "c"] {
            bus.emit("step", tagged(tag), true);
        }

        let tags: Vec<String> = bus
            .history()
            .iter()
            .filter_map(|e| e.get_str("tag").map(str::to_string))
            .collect();
        assert_eq!(tags, vec!["b", "c"]);
        assert_eq!(bus.history_of("step").len(), 2);
        assert!(bus.history_of("other").is_empty());
    }

    #[test]
    fn events_without_subscribers_still_recorded() {
        let bus = EventBus::new();
        bus.emit("lonely", Payload::new(), true);
        assert_eq!(bus.history().len(), 1);
        assert_eq!(bus.stats().events_processed, 1);
    }

    #[test]
    fn stats_report_listeners_and_queue() {
        let bus = EventBus::new();
        let (_, a) = counter();
        let (_, b) = counter();
        bus.subscribe("x", a);
        bus.subscribe("y", b);
        bus.emit("x", Payload::new(), false);

        let stats = bus.stats();
        assert_eq!(stats.listeners.get("x"), Some(&1));
        assert_eq!(stats.listeners.get("y"), Some(&1));
        assert_eq!(stats.queued_events, 1);
        assert_eq!(stats.events_processed, 0);
    }

    #[test]
    fn emit_from_other_thread_is_drained_on_owner() {
        let bus = Arc::new(EventBus::new());
        let (count, handler) = counter();
        bus.subscribe("remote", handler);

        let remote = Arc::clone(&bus);
        thread::spawn(move || remote.emit("remote", Payload::new(), false))
            .join()
            .expect("Thread join failed");

        assert_eq!(count.load(Ordering::SeqCst), 0);
        bus.drain();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
