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

//! Nested-loop operators
//!
//! Both operators bind each outer row into a binding slot and (re)open the
//! inner cursor, whose plan reads the slot. Map emits the inner rows as
//! they are; Product combines them with the outer row.

use std::sync::Arc;

use crate::core::{Error, Result, Row, RowType, TableDef, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

// ============================================================================
// Map_NestedLoops
// ============================================================================

/// Runs `inner` once per outer row with that row bound at `binding`
#[derive(Debug)]
pub struct MapNestedLoops {
    outer: Arc<Operator>,
    inner: Arc<Operator>,
    binding: usize,
}

impl MapNestedLoops {
    pub fn new(outer: Arc<Operator>, inner: Arc<Operator>, binding: usize) -> Result<Self> {
        Ok(Self {
            outer,
            inner,
            binding,
        })
    }
}

impl OperatorImpl for MapNestedLoops {
    fn row_type(&self) -> Option<Arc<RowType>> {
        self.inner.row_type()
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.outer, &self.inner]
    }

    fn describe(&self) -> String {
        format!("Map_NestedLoops(binding {})", self.binding)
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = MapCursor {
            outer: self.outer.cursor(ctx, bindings)?,
            inner: self.inner.cursor(ctx, bindings)?,
            binding: self.binding,
            bindings: bindings.clone(),
            inner_open: false,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct MapCursor {
    outer: Box<dyn Cursor>,
    inner: Box<dyn Cursor>,
    binding: usize,
    bindings: QueryBindings,
    inner_open: bool,
}

impl CursorImpl for MapCursor {
    const NAME: &'static str = "Map_NestedLoops";

    fn open(&mut self) -> Result<()> {
        self.inner_open = false;
        self.outer.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if self.inner_open {
                if let Some(row) = self.inner.next()? {
                    return Ok(Some(row));
                }
                self.inner_open = false;
            }
            let Some(outer) = self.outer.next()? else {
                return Ok(None);
            };
            self.bindings.set_row(self.binding, outer);
            self.inner.open()?;
            self.inner_open = true;
        }
    }

    fn close(&mut self) -> Result<()> {
        self.inner_open = false;
        self.inner.close()?;
        self.outer.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.inner.destroy()?;
        self.outer.destroy()
    }
}

// ============================================================================
// Product_NestedLoops
// ============================================================================

/// Product of each outer row with the inner rows of its branch
///
/// Outer rows of `outer_type` are bound at `binding`; every inner row of
/// `inner_type` yields one product row. The inner fields that belong to the
/// shared branch are already present in the outer row and are dropped.
/// Outer rows of other types pass through.
#[derive(Debug)]
pub struct ProductNestedLoops {
    outer: Arc<Operator>,
    inner: Arc<Operator>,
    outer_type: Arc<RowType>,
    inner_type: Arc<RowType>,
    product_type: Arc<RowType>,
    binding: usize,
}

impl ProductNestedLoops {
    pub fn new(
        outer: Arc<Operator>,
        inner: Arc<Operator>,
        outer_type: &Arc<RowType>,
        inner_type: &Arc<RowType>,
        binding: usize,
    ) -> Result<Self> {
        let branch = shared_branch(outer_type, inner_type)?;
        let product_type = RowType::product(outer_type, inner_type, &branch)?;
        Ok(Self {
            outer,
            inner,
            outer_type: outer_type.clone(),
            inner_type: inner_type.clone(),
            product_type,
            binding,
        })
    }
}

/// Deepest table both row types are built from
fn shared_branch(outer: &RowType, inner: &RowType) -> Result<Arc<TableDef>> {
    let inner_tables = inner.component_tables();
    outer
        .component_tables()
        .into_iter()
        .filter(|t| inner_tables.iter().any(|i| i.id == t.id))
        .max_by_key(|t| t.depth())
        .ok_or_else(|| {
            Error::invalid_plan(format!("{} and {} share no branch", outer, inner))
        })
}

impl OperatorImpl for ProductNestedLoops {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.product_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.outer, &self.inner]
    }

    fn derived_type(&self) -> Option<&Arc<RowType>> {
        Some(&self.product_type)
    }

    fn describe(&self) -> String {
        format!(
            "Product_NestedLoops({} x {}, binding {})",
            self.outer_type, self.inner_type, self.binding
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = ProductCursor {
            outer: self.outer.cursor(ctx, bindings)?,
            inner: self.inner.cursor(ctx, bindings)?,
            outer_type: self.outer_type.clone(),
            inner_type: self.inner_type.clone(),
            product_type: self.product_type.clone(),
            right_skip: self.product_type.product_right_skip().unwrap_or(0),
            binding: self.binding,
            bindings: bindings.clone(),
            outer_row: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct ProductCursor {
    outer: Box<dyn Cursor>,
    inner: Box<dyn Cursor>,
    outer_type: Arc<RowType>,
    inner_type: Arc<RowType>,
    product_type: Arc<RowType>,
    right_skip: usize,
    binding: usize,
    bindings: QueryBindings,
    /// Outer row whose inner cursor is open
    outer_row: Option<Row>,
}

impl ProductCursor {
    fn product(&self, outer: &Row, inner: &Row) -> Row {
        let mut values: Vec<Value> = Vec::with_capacity(self.product_type.field_count());
        values.extend_from_slice(outer.values());
        values.extend_from_slice(&inner.values()[self.right_skip..]);
        Row::from_parts(self.product_type.clone(), values.into(), None)
    }
}

impl CursorImpl for ProductCursor {
    const NAME: &'static str = "Product_NestedLoops";

    fn open(&mut self) -> Result<()> {
        self.outer_row = None;
        self.outer.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(outer) = self.outer_row.as_ref() {
                match self.inner.next()? {
                    Some(inner) if inner.is_type(&self.inner_type) => {
                        return Ok(Some(self.product(outer, &inner)));
                    }
                    Some(_) => continue,
                    None => self.outer_row = None,
                }
            }
            let Some(outer) = self.outer.next()? else {
                return Ok(None);
            };
            if !outer.is_type(&self.outer_type) {
                return Ok(Some(outer));
            }
            self.bindings.set_row(self.binding, outer.clone());
            self.inner.open()?;
            self.outer_row = Some(outer);
        }
    }

    fn close(&mut self) -> Result<()> {
        self.outer_row = None;
        self.inner.close()?;
        self.outer.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.outer_row = None;
        self.inner.destroy()?;
        self.outer.destroy()
    }
}
