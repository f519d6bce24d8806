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

//! Row filters: hkey-ordered predicate selection and row-type filtering

use std::sync::Arc;

use crate::core::{Error, HKey, Result, Row, RowType};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::expression::Expression;
use crate::executor::operator::{Operator, OperatorImpl};

// ============================================================================
// Select_HKeyOrdered
// ============================================================================

/// Predicate filter over an hkey-ordered stream
///
/// The predicate is evaluated on rows of `predicate_type` only. A row of a
/// descendant type survives iff its nearest ancestor of `predicate_type`
/// survived; rows of unrelated types pass through.
#[derive(Debug)]
pub struct Select {
    input: Arc<Operator>,
    predicate_type: Arc<RowType>,
    predicate: Expression,
}

impl Select {
    pub fn new(
        input: Arc<Operator>,
        predicate_type: &Arc<RowType>,
        predicate: Expression,
    ) -> Result<Self> {
        predicate.result_type(Some(&**predicate_type))?;
        Ok(Self {
            input,
            predicate_type: predicate_type.clone(),
            predicate,
        })
    }
}

impl OperatorImpl for Select {
    fn row_type(&self) -> Option<Arc<RowType>> {
        self.input.row_type()
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!("Select({}: {})", self.predicate_type, self.predicate)
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = SelectCursor {
            input: self.input.cursor(ctx, bindings)?,
            predicate_type: self.predicate_type.clone(),
            predicate: self.predicate.clone(),
            bindings: bindings.clone(),
            last: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct SelectCursor {
    input: Box<dyn Cursor>,
    predicate_type: Arc<RowType>,
    predicate: Expression,
    bindings: QueryBindings,
    /// hkey of the latest predicate row and whether it passed
    last: Option<(Option<Arc<HKey>>, bool)>,
}

impl SelectCursor {
    fn keep_descendant(&self, row: &Row) -> bool {
        match (&self.last, row.hkey()) {
            (Some((Some(ancestor), passed)), Some(hkey)) if ancestor.is_ancestor_of(hkey) => {
                *passed
            }
            _ => false,
        }
    }
}

impl CursorImpl for SelectCursor {
    const NAME: &'static str = "Select_HKeyOrdered";

    fn open(&mut self) -> Result<()> {
        self.last = None;
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.input.next()? {
            if row.is_type(&self.predicate_type) {
                let passed = self.predicate.eval_predicate(Some(&row), &self.bindings)?;
                self.last = Some((row.hkey_arc().cloned(), passed));
                if passed {
                    return Ok(Some(row));
                }
            } else if self.predicate_type.is_ancestor_of(row.row_type()) {
                if self.keep_descendant(&row) {
                    return Ok(Some(row));
                }
            } else {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.last = None;
        self.input.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.input.destroy()
    }
}

// ============================================================================
// Filter_Default
// ============================================================================

/// Keeps only rows of the given types
#[derive(Debug)]
pub struct Filter {
    input: Arc<Operator>,
    keep_types: Vec<Arc<RowType>>,
}

impl Filter {
    pub fn new(input: Arc<Operator>, keep_types: Vec<Arc<RowType>>) -> Result<Self> {
        if keep_types.is_empty() {
            return Err(Error::invalid_plan("filter keeps no row types"));
        }
        Ok(Self { input, keep_types })
    }
}

impl OperatorImpl for Filter {
    fn row_type(&self) -> Option<Arc<RowType>> {
        match self.keep_types.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.keep_types.iter().map(|t| t.to_string()).collect();
        format!("Filter({})", names.join(", "))
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = FilterCursor {
            input: self.input.cursor(ctx, bindings)?,
            keep_types: self.keep_types.clone(),
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct FilterCursor {
    input: Box<dyn Cursor>,
    keep_types: Vec<Arc<RowType>>,
}

impl CursorImpl for FilterCursor {
    const NAME: &'static str = "Filter_Default";

    fn open(&mut self) -> Result<()> {
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.input.next()? {
            if self.keep_types.iter().any(|t| row.is_type(t)) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.input.destroy()
    }
}
