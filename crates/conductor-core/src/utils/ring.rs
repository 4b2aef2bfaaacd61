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

//! A bounded history buffer that evicts its oldest entry when full.

use std::collections::VecDeque;

/// A circular buffer with a capacity chosen at construction time.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a new, empty ring buffer holding at most `capacity` values.
    ///
    /// A capacity of zero is bumped to one so the newest value is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a new value into the buffer, returning the evicted oldest value if full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.data.len() == self.capacity {
            self.data.pop_front()
        } else {
            None
        };
        self.data.push_back(value);
        evicted
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the maximum number of values retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the most recently pushed value.
    pub fn latest(&self) -> Option<&T> {
        self.data.back()
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl RingBuffer<f32> {
    /// Calculates the arithmetic mean of the values in the buffer.
    pub fn average(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.count() as f32
    }

    /// Calculates the variance (spread) of the values in the buffer.
    ///
    /// High variance in frame times indicates stutter.
    pub fn variance(&self) -> f32 {
        if self.count() < 2 {
            return 0.0;
        }
        let avg = self.average();
        let sum_sq: f32 = self.iter().map(|v| (v - avg) * (v - avg)).sum();
        sum_sq / self.count() as f32
    }

    /// Returns the minimum value in the buffer, or `0.0` if empty.
    pub fn min(&self) -> f32 {
        self.iter().copied().reduce(f32::min).unwrap_or(0.0)
    }

    /// Returns the maximum value in the buffer, or `0.0` if empty.
    pub fn max(&self) -> f32 {
        self.iter().copied().reduce(f32::max).unwrap_or(0.0)
    }
}
