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

//! Row handle
//!
//! A [`Row`] is a cheap-to-clone handle: values live in an `Arc<[Value]>` and
//! the hkey in an `Arc<HKey>`. Cloning shares the storage. A producer that
//! wants to reuse a row buffer must go through [`Row::recycle_values`],
//! which only succeeds while it is the sole owner, so a row a caller still
//! holds can never change underneath it.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use super::error::{Error, Result};
use super::hkey::HKey;
use super::row_type::RowType;
use super::value::Value;

/// A typed row with an optional hierarchical key
#[derive(Debug, Clone)]
pub struct Row {
    row_type: Arc<RowType>,
    values: Arc<[Value]>,
    hkey: Option<Arc<HKey>>,
}

impl Row {
    /// Create a row, checking its arity against the row type
    pub fn new(row_type: &Arc<RowType>, values: Vec<Value>) -> Result<Row> {
        if values.len() != row_type.field_count() {
            return Err(Error::RowArity {
                row_type: row_type.to_string(),
                expected: row_type.field_count(),
                got: values.len(),
            });
        }
        Ok(Self::from_parts(row_type.clone(), values.into(), None))
    }

    /// Create a row positioned in its group
    pub fn with_hkey(row_type: &Arc<RowType>, values: Vec<Value>, hkey: HKey) -> Result<Row> {
        let mut row = Self::new(row_type, values)?;
        row.hkey = Some(Arc::new(hkey));
        Ok(row)
    }

    /// Assemble a row without checking arity
    #[inline]
    pub(crate) fn from_parts(
        row_type: Arc<RowType>,
        values: Arc<[Value]>,
        hkey: Option<Arc<HKey>>,
    ) -> Row {
        Self {
            row_type,
            values,
            hkey,
        }
    }

    #[inline]
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// True if this row is of exactly the given type
    #[inline]
    pub fn is_type(&self, row_type: &RowType) -> bool {
        RowType::same(&self.row_type, row_type)
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Field value, or `Error::FieldOutOfBounds`
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or(Error::FieldOutOfBounds {
            index,
            len: self.values.len(),
        })
    }

    #[inline]
    pub fn hkey(&self) -> Option<&HKey> {
        self.hkey.as_deref()
    }

    #[inline]
    pub(crate) fn hkey_arc(&self) -> Option<&Arc<HKey>> {
        self.hkey.as_ref()
    }

    pub(crate) fn shared_values(&self) -> &Arc<[Value]> {
        &self.values
    }

    /// True while another handle shares this row's values
    #[inline]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.values) > 1
    }

    /// Mutable access to the value buffer for in-place reuse
    ///
    /// Returns `None` while the row is shared.
    pub fn recycle_values(&mut self) -> Option<&mut [Value]> {
        Arc::get_mut(&mut self.values)
    }

    /// Replace the hkey of a row this handle owns
    pub fn set_hkey(&mut self, hkey: Option<HKey>) {
        self.hkey = hkey.map(Arc::new);
    }

    pub(crate) fn set_hkey_arc(&mut self, hkey: Option<Arc<HKey>>) {
        self.hkey = hkey;
    }

    /// Same values and hkey under a different row type of equal arity
    pub fn retyped(&self, row_type: &Arc<RowType>) -> Result<Row> {
        if row_type.field_count() != self.values.len() {
            return Err(Error::RowArity {
                row_type: row_type.to_string(),
                expected: row_type.field_count(),
                got: self.values.len(),
            });
        }
        Ok(Self::from_parts(
            row_type.clone(),
            self.values.clone(),
            self.hkey.clone(),
        ))
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.values.to_vec()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        RowType::same(&self.row_type, &other.row_type)
            && self.values == other.values
            && self.hkey == other.hkey
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.row_type)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")?;
        if let Some(hkey) = &self.hkey {
            write!(f, " {}", hkey)?;
        }
        Ok(())
    }
}
