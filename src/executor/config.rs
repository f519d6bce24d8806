// Copyright 2025 Stoolap Contributors
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

//! Execution configuration
//!

/// Default false positive rate for bloom filters built by Using_BloomFilter
pub const DEFAULT_BLOOM_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Default largest limit an insertion-limited sort keeps in its buffer
pub const DEFAULT_MAX_INSERTION_SORT_LIMIT: usize = 10_000;

/// Per-execution tuning knobs
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Time budget for one execution in milliseconds, 0 for none
    /// Default: 0
    pub timeout_ms: u64,

    /// Whether cursors record open/row/jump counters
    /// Default: false
    pub collect_stats: bool,

    /// Target false positive rate of bloom filters
    /// Default: 0.01
    pub bloom_false_positive_rate: f64,

    /// Run skip-scan intersects sequentially even when the store can seek
    /// Default: false
    pub force_sequential_scan: bool,

    /// Limits above this make an insertion-limited sort fall back to a
    /// tree sort followed by truncation
    /// Default: 10000
    pub max_insertion_sort_limit: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            collect_stats: false,
            bloom_false_positive_rate: DEFAULT_BLOOM_FALSE_POSITIVE_RATE,
            force_sequential_scan: false,
            max_insertion_sort_limit: DEFAULT_MAX_INSERTION_SORT_LIMIT,
        }
    }
}

impl ExecConfig {
    /// Creates a new ExecConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that records per-operator statistics
    pub fn instrumented() -> Self {
        Self {
            collect_stats: true,
            ..Self::default()
        }
    }

    /// Configuration that never seeks index cursors
    pub fn sequential() -> Self {
        Self {
            force_sequential_scan: true,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }

    /// Bloom false positive rate, clamped to (0, 0.5]
    pub fn with_bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.bloom_false_positive_rate = if rate > 0.0 { rate.min(0.5) } else { 0.0001 };
        self
    }

    pub fn with_force_sequential_scan(mut self, force: bool) -> Self {
        self.force_sequential_scan = force;
        self
    }

    pub fn with_max_insertion_sort_limit(mut self, limit: usize) -> Self {
        self.max_insertion_sort_limit = limit;
        self
    }
}
