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

//! Storage collaborator interfaces
//!
//! The executor never touches physical storage directly. It asks a
//! [`StoreAdapter`] for group cursors (hkey-ordered traversal of one group)
//! and index cursors (ordered, ranged traversal of one index), both of
//! which hand out shared [`Row`] handles.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::core::{GroupId, HKey, IndexId, Result, Row, Schema, Value};

/// Where a group cursor starts and how far it runs
#[derive(Debug, Clone, PartialEq)]
pub enum GroupScanStart {
    /// Every row of the group
    Full,
    /// Rows positioned by an hkey
    ///
    /// Deep: every row whose hkey has `hkey` as a prefix (the subtree).
    /// Shallow: only the first row at or after `hkey`; callers that need an
    /// exact match check the returned row's hkey.
    At { hkey: HKey, deep: bool },
}

/// Cursor over the rows of one group in hkey order
pub trait GroupCursor: Send {
    /// (Re)position the cursor. Valid at any time; discards the previous
    /// position.
    fn open(&mut self, start: GroupScanStart) -> Result<()>;

    /// Next row, or `None` once the scan is exhausted
    fn next(&mut self) -> Result<Option<Row>>;

    /// Release the position. Idempotent.
    fn close(&mut self);
}

/// One end of an index key range
///
/// `values` constrain the leading index fields. Rows are compared on those
/// fields only, in ascending storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBound {
    pub values: Vec<Value>,
    pub inclusive: bool,
}

impl IndexBound {
    pub fn inclusive(values: Vec<Value>) -> Self {
        Self {
            values,
            inclusive: true,
        }
    }

    pub fn exclusive(values: Vec<Value>) -> Self {
        Self {
            values,
            inclusive: false,
        }
    }
}

/// Key range restricting an index scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexKeyRange {
    pub lo: Option<IndexBound>,
    pub hi: Option<IndexBound>,
}

impl IndexKeyRange {
    /// The whole index
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows whose leading fields equal `values`
    pub fn exact(values: Vec<Value>) -> Self {
        Self {
            lo: Some(IndexBound::inclusive(values.clone())),
            hi: Some(IndexBound::inclusive(values)),
        }
    }

    pub fn between(lo: Option<IndexBound>, hi: Option<IndexBound>) -> Self {
        Self { lo, hi }
    }

    /// True if a row with the given field values lies in the range
    pub fn contains(&self, fields: &[Value]) -> bool {
        if let Some(lo) = &self.lo {
            match compare_prefix(fields, &lo.values, &[]) {
                Ordering::Less => return false,
                Ordering::Equal if !lo.inclusive => return false,
                _ => {}
            }
        }
        if let Some(hi) = &self.hi {
            match compare_prefix(fields, &hi.values, &[]) {
                Ordering::Greater => return false,
                Ordering::Equal if !hi.inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

/// Compare the first `key.len()` fields of `fields` with `key`
///
/// `ascending[i] == false` reverses field `i`; fields past the end of
/// `ascending` compare ascending.
pub fn compare_prefix(fields: &[Value], key: &[Value], ascending: &[bool]) -> Ordering {
    for (i, k) in key.iter().enumerate() {
        let ord = match fields.get(i) {
            Some(f) => f.cmp(k),
            None => Ordering::Less,
        };
        let ord = if ascending.get(i).copied().unwrap_or(true) {
            ord
        } else {
            ord.reverse()
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Cursor over one index in a caller-chosen field order
pub trait IndexCursor: Send {
    /// Position at the start of the range
    fn open(&mut self) -> Result<()>;

    /// Next row, or `None` once the range is exhausted
    fn next(&mut self) -> Result<Option<Row>>;

    /// Reposition to the first row of the range whose leading fields are at
    /// or after `key` in this cursor's scan order
    fn jump(&mut self, key: &[Value]) -> Result<()>;

    /// Release the position. Idempotent.
    fn close(&mut self);
}

/// Storage adapter the executor runs against
pub trait StoreAdapter: Send + Sync {
    /// Registry of groups, tables, indexes and row types
    fn schema(&self) -> &Arc<Schema>;

    /// New cursor over a group
    fn group_cursor(&self, group: GroupId) -> Result<Box<dyn GroupCursor>>;

    /// New cursor over an index range
    ///
    /// `ascending` gives the direction of each leading index field; fields
    /// it does not cover are scanned ascending.
    fn index_cursor(
        &self,
        index: IndexId,
        range: IndexKeyRange,
        ascending: &[bool],
    ) -> Result<Box<dyn IndexCursor>>;

    /// True if [`IndexCursor::jump`] is a real seek rather than a linear
    /// scan
    fn supports_seek(&self) -> bool {
        true
    }
}
