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

//! Per-frame timing samples and their rolling report.

use conductor_core::utils::ring::RingBuffer;
use conductor_core::Priority;
use serde::Serialize;
use std::time::SystemTime;

/// Timing of one walk of the execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSample {
    /// Wall time of the whole frame (drain included), in milliseconds.
    pub total_ms: f32,
    /// Time spent per priority class, indexed by [`Priority::index`].
    pub class_ms: [f32; Priority::COUNT],
    /// When the frame finished.
    pub timestamp: SystemTime,
    /// Subsystems invoked this frame.
    pub invoked: usize,
    /// Subsystems skipped because their class budget was spent.
    pub skipped_budget: usize,
    /// Whether the walk stopped early on the frame deadline.
    pub deadline_hit: bool,
}

impl FrameSample {
    /// Returns the time spent in `priority` subsystems, in milliseconds.
    pub fn class_time_ms(&self, priority: Priority) -> f32 {
        self.class_ms[priority.index()]
    }
}

/// Statistics over the retained frame history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    /// Number of frames in the window.
    pub frames: usize,
    /// Mean frame time, in milliseconds.
    pub average_ms: f32,
    /// Shortest frame, in milliseconds.
    pub min_ms: f32,
    /// Longest frame, in milliseconds.
    pub max_ms: f32,
    /// Population variance of frame time.
    pub variance: f32,
    /// Mean time per priority class, indexed by [`Priority::index`].
    pub class_average_ms: [f32; Priority::COUNT],
}

/// Bounded history of frame samples.
#[derive(Debug)]
pub struct FrameHistory {
    samples: RingBuffer<FrameSample>,
    totals: RingBuffer<f32>,
}

impl FrameHistory {
    /// Creates a history that retains at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            totals: RingBuffer::new(capacity),
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: FrameSample) {
        self.totals.push(sample.total_ms);
        self.samples.push(sample);
    }

    /// Returns the most recent sample.
    pub fn latest(&self) -> Option<&FrameSample> {
        self.samples.latest()
    }

    /// Returns the number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.count()
    }

    /// Returns `true` if no frame was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Summarizes the retained window.
    pub fn report(&self) -> FrameReport {
        let frames = self.samples.count();
        let mut class_average_ms = [0.0; Priority::COUNT];
        if frames > 0 {
            for sample in self.samples.iter() {
                for (sum, ms) in class_average_ms.iter_mut().zip(sample.class_ms) {
                    *sum += ms;
                }
            }
            for avg in &mut class_average_ms {
                *avg /= frames as f32;
            }
        }

        FrameReport {
            frames,
            average_ms: self.totals.average(),
            min_ms: self.totals.min(),
            max_ms: self.totals.max(),
            variance: self.totals.variance(),
            class_average_ms,
        }
    }
}
