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

//! A monotonic stopwatch used to time frames and subsystem invocations.

use std::time::{Duration, Instant};

/// Measures wall-clock time from a starting instant.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Creates a new stopwatch, started immediately.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Returns the time elapsed since the stopwatch was started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the elapsed time in fractional milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f32 {
        duration_ms(self.elapsed())
    }

    /// Restarts the stopwatch and returns the time elapsed before the restart.
    ///
    /// Used as a lap timer by loops that need the delta since their last tick.
    #[inline]
    pub fn restart(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.start_time);
        self.start_time = now;
        lap
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a duration to fractional milliseconds.
#[inline]
pub fn duration_ms(duration: Duration) -> f32 {
    duration.as_secs_f32() * 1000.0
}
