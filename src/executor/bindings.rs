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

//! Positional query bindings
//!
//! A sparse table of typed slots shared by the whole cursor tree of one
//! execution. Nested-loop operators bind outer rows into a slot that the
//! inner plan reads; bloom-filter operators publish their filter the same
//! way.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::BloomFilter;
use crate::core::{Error, HKey, Result, Row, Value};

/// Content of one binding slot
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Row(Row),
    HKey(HKey),
    BloomFilter(Arc<BloomFilter>),
}

impl Binding {
    /// Kind name used in mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Value(_) => "value",
            Binding::Row(_) => "row",
            Binding::HKey(_) => "hkey",
            Binding::BloomFilter(_) => "bloom filter",
        }
    }
}

/// Shared, position-indexed bindings
///
/// Cloning yields another handle to the same slots.
#[derive(Debug, Clone, Default)]
pub struct QueryBindings {
    slots: Arc<Mutex<Vec<Option<Binding>>>>,
}

impl QueryBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a slot, replacing any previous content
    pub fn set(&self, position: usize, binding: Binding) {
        let mut slots = self.slots.lock();
        if slots.len() <= position {
            slots.resize(position + 1, None);
        }
        slots[position] = Some(binding);
    }

    pub fn set_value(&self, position: usize, value: Value) {
        self.set(position, Binding::Value(value));
    }

    pub fn set_row(&self, position: usize, row: Row) {
        self.set(position, Binding::Row(row));
    }

    pub fn set_hkey(&self, position: usize, hkey: HKey) {
        self.set(position, Binding::HKey(hkey));
    }

    pub fn set_bloom_filter(&self, position: usize, filter: Arc<BloomFilter>) {
        self.set(position, Binding::BloomFilter(filter));
    }

    /// Unbind a slot
    pub fn clear(&self, position: usize) {
        if let Some(slot) = self.slots.lock().get_mut(position) {
            *slot = None;
        }
    }

    pub fn is_set(&self, position: usize) -> bool {
        matches!(self.slots.lock().get(position), Some(Some(_)))
    }

    /// Content of a slot, or `BindingNotSet`
    pub fn get(&self, position: usize) -> Result<Binding> {
        self.slots
            .lock()
            .get(position)
            .and_then(Option::clone)
            .ok_or(Error::BindingNotSet(position))
    }

    pub fn get_value(&self, position: usize) -> Result<Value> {
        match self.get(position)? {
            Binding::Value(value) => Ok(value),
            other => Err(mismatch(position, "value", &other)),
        }
    }

    pub fn get_row(&self, position: usize) -> Result<Row> {
        match self.get(position)? {
            Binding::Row(row) => Ok(row),
            other => Err(mismatch(position, "row", &other)),
        }
    }

    /// HKey bound at a slot
    ///
    /// A bound row also answers with its own hkey.
    pub fn get_hkey(&self, position: usize) -> Result<HKey> {
        match self.get(position)? {
            Binding::HKey(hkey) => Ok(hkey),
            Binding::Row(row) => row.hkey().cloned().ok_or(Error::BindingTypeMismatch {
                position,
                expected: "hkey",
                found: "row without hkey",
            }),
            other => Err(mismatch(position, "hkey", &other)),
        }
    }

    pub fn get_bloom_filter(&self, position: usize) -> Result<Arc<BloomFilter>> {
        match self.get(position)? {
            Binding::BloomFilter(filter) => Ok(filter),
            other => Err(mismatch(position, "bloom filter", &other)),
        }
    }
}

fn mismatch(position: usize, expected: &'static str, found: &Binding) -> Error {
    Error::BindingTypeMismatch {
        position,
        expected,
        found: found.kind(),
    }
}
