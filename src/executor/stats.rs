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

//! Per-execution operator statistics
//!
//! Counters are keyed by operator name and live in the [`QueryContext`]
//! of one execution, so concurrent executions never share them.
//!
//! [`QueryContext`]: super::context::QueryContext

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Counters for one operator kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorStats {
    /// Number of successful `open()` calls
    pub opens: u64,
    /// Rows returned by `next()`
    pub rows: u64,
    /// Successful `jump()` calls
    pub jumps: u64,
}

/// Statistics collected while executing one plan
#[derive(Debug, Default)]
pub struct ExecStats {
    operators: Mutex<FxHashMap<&'static str, OperatorStats>>,
}

impl ExecStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self, operator: &'static str) {
        self.operators.lock().entry(operator).or_default().opens += 1;
    }

    pub(crate) fn record_row(&self, operator: &'static str) {
        self.operators.lock().entry(operator).or_default().rows += 1;
    }

    pub(crate) fn record_jump(&self, operator: &'static str) {
        self.operators.lock().entry(operator).or_default().jumps += 1;
    }

    /// Counters for one operator kind (zero if it never ran)
    pub fn operator(&self, operator: &str) -> OperatorStats {
        self.operators
            .lock()
            .get(operator)
            .copied()
            .unwrap_or_default()
    }

    /// All counters, sorted by operator name
    pub fn snapshot(&self) -> Vec<(&'static str, OperatorStats)> {
        let mut entries: Vec<_> = self
            .operators
            .lock()
            .iter()
            .map(|(name, stats)| (*name, *stats))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    pub fn reset(&self) {
        self.operators.lock().clear();
    }
}

impl fmt::Display for ExecStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, stats) in self.snapshot() {
            writeln!(
                f,
                "{}: opens={} rows={} jumps={}",
                name, stats.opens, stats.rows, stats.jumps
            )?;
        }
        Ok(())
    }
}
