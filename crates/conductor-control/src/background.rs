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

//! Independent cadence for `Background` subsystems.

use crate::executor::run_update;
use crate::isolation::ErrorIsolation;
use crate::registry::SubsystemRegistry;
use conductor_core::utils::sync::lock_or_recover;
use conductor_core::utils::timer::Stopwatch;
use conductor_core::{EventBus, SubsystemContext};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Drives `Background` subsystems on a dedicated thread at a fixed interval.
///
/// Each tick snapshots the running background subsystems under the registry
/// lock, releases it, then updates them one by one. A stop request wakes the
/// thread immediately; the flag is checked once per tick.
#[derive(Debug)]
pub struct BackgroundRunner {
    interval: Duration,
    join_timeout: Duration,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    exited: Option<Receiver<()>>,
}

impl BackgroundRunner {
    /// Creates a stopped runner.
    pub fn new(interval: Duration, join_timeout: Duration) -> Self {
        Self {
            interval,
            join_timeout,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            exited: None,
        }
    }

    /// Returns `true` while the thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the background thread. Does nothing if it is already running.
    pub fn start(
        &mut self,
        registry: Arc<Mutex<SubsystemRegistry>>,
        events: Arc<EventBus>,
        isolation: Arc<ErrorIsolation>,
        smoothing_weight: f32,
    ) -> io::Result<()> {
        if self.running.load(Ordering::SeqCst) {
            log::warn!("Background: runner is already running.");
            return Ok(());
        }

        // Each thread owns its flag, so a detached one stays stopped.
        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);
        let interval = self.interval;
        let (exit_tx, exit_rx) = crossbeam_channel::bounded::<()>(1);

        let spawned = thread::Builder::new()
            .name("conductor-background".to_string())
            .spawn(move || {
                // Dropped when the loop exits, which disconnects `exited`.
                let _exit_guard = exit_tx;
                log::info!("Background: cadence thread started ({interval:?}).");

                let mut watch = Stopwatch::new();
                while running.load(Ordering::SeqCst) {
                    let delta_time = watch.restart().as_secs_f32();
                    let snapshot = lock_or_recover(&registry).background_snapshot();

                    let context = SubsystemContext::new(delta_time, &events);
                    for entry in &snapshot {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        run_update(entry, &context, &isolation, smoothing_weight);
                    }

                    thread::park_timeout(interval);
                }

                log::info!("Background: cadence thread stopped.");
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.exited = Some(exit_rx);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Stops the background thread, waiting at most the join timeout.
    ///
    /// Returns `true` if the thread exited in time (or was not running). On
    /// timeout the thread is detached and left to finish on its own.
    pub fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };
        handle.thread().unpark();

        let exited = match self.exited.take() {
            Some(rx) => rx.recv_timeout(self.join_timeout),
            None => Err(RecvTimeoutError::Disconnected),
        };
        match exited {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Background: thread did not stop within {:?}, detaching it.",
                    self.join_timeout
                );
                false
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::error!("Background: thread panicked.");
                }
                true
            }
        }
    }
}

impl Drop for BackgroundRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
