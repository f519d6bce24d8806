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

//! Intersect_Ordered: merge-intersection of two ordered streams
//!
//! Each side is ordered on `compare_fields` fields that follow its fixed
//! (equality-constrained) leading fields. Per-field directions come from
//! `ascending`; the first differing field decides.
//!
//! ```text
//! left  behind  -> emit it under LEFT join, else advance (or jump) left
//! right behind  -> emit it under RIGHT join, else advance (or jump) right
//! equal         -> emit the output side's row and advance that side
//! ```
//!
//! With skip-scan the losing cursor jumps to its own fixed fields followed
//! by the winner's comparison values instead of stepping row by row.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::api::options::{IntersectOptions, IntersectOutput, JoinType, ScanMode};
use crate::core::{Error, Result, Row, RowType, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{ColumnSelector, Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

#[derive(Debug)]
pub struct Intersect {
    left: Arc<Operator>,
    right: Arc<Operator>,
    left_type: Arc<RowType>,
    right_type: Arc<RowType>,
    left_fixed: usize,
    right_fixed: usize,
    compare_fields: usize,
    ascending: Vec<bool>,
    join: JoinType,
    options: IntersectOptions,
    /// Shapes of the key rows handed to `jump`
    left_key_type: Arc<RowType>,
    right_key_type: Arc<RowType>,
}

impl Intersect {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        left: Arc<Operator>,
        right: Arc<Operator>,
        left_type: &Arc<RowType>,
        right_type: &Arc<RowType>,
        left_fixed: usize,
        right_fixed: usize,
        ascending: Vec<bool>,
        join: JoinType,
        options: IntersectOptions,
    ) -> Result<Self> {
        options.validate(join)?;
        let compare_fields = ascending.len();
        if compare_fields == 0 {
            return Err(Error::invalid_plan("intersect compares no fields"));
        }
        for (rt, fixed) in [(left_type, left_fixed), (right_type, right_fixed)] {
            if fixed + compare_fields > rt.field_count() {
                return Err(Error::invalid_plan(format!(
                    "{} has {} fields, intersect needs {}",
                    rt,
                    rt.field_count(),
                    fixed + compare_fields
                )));
            }
        }
        for i in 0..compare_fields {
            let l = left_type.field_type(left_fixed + i)?;
            let r = right_type.field_type(right_fixed + i)?;
            if !l.is_compatible_with(r) {
                return Err(Error::invalid_plan(format!(
                    "intersect field {} compares {} with {}",
                    i, l, r
                )));
            }
        }
        if options.scan == ScanMode::SkipScan && !(left.supports_jump() && right.supports_jump())
        {
            return Err(Error::invalid_plan(
                "skip-scan intersect needs inputs that support jump",
            ));
        }
        let key_type = |rt: &RowType, fixed: usize| {
            RowType::derived("intersect key", rt.fields()[..fixed + compare_fields].to_vec())
        };
        Ok(Self {
            left_key_type: key_type(left_type, left_fixed),
            right_key_type: key_type(right_type, right_fixed),
            left,
            right,
            left_type: left_type.clone(),
            right_type: right_type.clone(),
            left_fixed,
            right_fixed,
            compare_fields,
            ascending,
            join,
            options,
        })
    }
}

impl OperatorImpl for Intersect {
    fn row_type(&self) -> Option<Arc<RowType>> {
        match self.options.output {
            IntersectOutput::OutputLeft => Some(self.left_type.clone()),
            IntersectOutput::OutputRight => Some(self.right_type.clone()),
        }
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        let directions: Vec<&str> = self
            .ascending
            .iter()
            .map(|&asc| if asc { "ASC" } else { "DESC" })
            .collect();
        format!(
            "Intersect_Ordered({} skip {}, {} skip {}, {} {}, {}, {})",
            self.left_type,
            self.left_fixed,
            self.right_type,
            self.right_fixed,
            self.join,
            directions.join(" "),
            match self.options.output {
                IntersectOutput::OutputLeft => "OUTPUT_LEFT",
                IntersectOutput::OutputRight => "OUTPUT_RIGHT",
            },
            match self.options.scan {
                ScanMode::SequentialScan => "SEQUENTIAL_SCAN",
                ScanMode::SkipScan => "SKIP_SCAN",
            }
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let mut skip_scan = self.options.scan == ScanMode::SkipScan;
        if skip_scan && (!ctx.store().supports_seek() || ctx.config().force_sequential_scan) {
            tracing::debug!(
                left = %self.left_type,
                right = %self.right_type,
                "skip-scan intersect running sequentially"
            );
            skip_scan = false;
        }
        let cursor = IntersectCursor {
            left: Side::new(
                self.left.cursor(ctx, bindings)?,
                &self.left_type,
                self.left_fixed,
                &self.left_key_type,
            ),
            right: Side::new(
                self.right.cursor(ctx, bindings)?,
                &self.right_type,
                self.right_fixed,
                &self.right_key_type,
            ),
            compare_fields: self.compare_fields,
            ascending: self.ascending.clone(),
            join: self.join,
            output: self.options.output,
            skip_scan,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

/// One input of the merge with its current row
struct Side {
    cursor: Box<dyn Cursor>,
    row_type: Arc<RowType>,
    fixed: usize,
    key_type: Arc<RowType>,
    key_columns: ColumnSelector,
    current: Option<Row>,
    done: bool,
}

impl Side {
    fn new(
        cursor: Box<dyn Cursor>,
        row_type: &Arc<RowType>,
        fixed: usize,
        key_type: &Arc<RowType>,
    ) -> Self {
        Self {
            cursor,
            row_type: row_type.clone(),
            fixed,
            key_type: key_type.clone(),
            key_columns: ColumnSelector::leading(key_type.field_count()),
            current: None,
            done: false,
        }
    }

    fn open(&mut self) -> Result<()> {
        self.current = None;
        self.done = false;
        self.cursor.open()
    }

    /// Fill `current` unless the side is exhausted
    fn fill(&mut self) -> Result<()> {
        while self.current.is_none() && !self.done {
            match self.cursor.next()? {
                Some(row) if row.is_type(&self.row_type) => self.current = Some(row),
                Some(_) => {}
                None => self.done = true,
            }
        }
        Ok(())
    }

    fn compare_values<'a>(&self, row: &'a Row, n: usize) -> &'a [Value] {
        &row.values()[self.fixed..self.fixed + n]
    }

    /// Comparison values of the current row
    fn current_values(&self, n: usize) -> Vec<Value> {
        self.current
            .as_ref()
            .map(|row| self.compare_values(row, n).to_vec())
            .unwrap_or_default()
    }

    /// Reposition at or after own fixed fields followed by `target`
    fn jump_to(&mut self, target: &[Value]) -> Result<()> {
        let Some(current) = self.current.take() else {
            return Ok(());
        };
        let mut key = Vec::with_capacity(self.key_type.field_count());
        key.extend_from_slice(&current.values()[..self.fixed]);
        key.extend_from_slice(target);
        let key_row = Row::from_parts(self.key_type.clone(), key.into(), None);
        self.cursor.jump(&key_row, &self.key_columns)
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.cursor.close()
    }
}

struct IntersectCursor {
    left: Side,
    right: Side,
    compare_fields: usize,
    ascending: Vec<bool>,
    join: JoinType,
    output: IntersectOutput,
    skip_scan: bool,
}

impl IntersectCursor {
    fn compare(&self, left: &Row, right: &Row) -> Ordering {
        let l = self.left.compare_values(left, self.compare_fields);
        let r = self.right.compare_values(right, self.compare_fields);
        for ((a, b), &asc) in l.iter().zip(r).zip(&self.ascending) {
            let ord = if asc { a.cmp(b) } else { b.cmp(a) };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl CursorImpl for IntersectCursor {
    const NAME: &'static str = "Intersect_Ordered";

    fn open(&mut self) -> Result<()> {
        self.left.open()?;
        self.right.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let n = self.compare_fields;
        loop {
            self.left.fill()?;
            self.right.fill()?;
            let order = match (&self.left.current, &self.right.current) {
                (Some(l), Some(r)) => Some(self.compare(l, r)),
                _ => None,
            };
            let Some(order) = order else {
                // one side is exhausted
                if self.join.keeps_left() && self.left.current.is_some() {
                    return Ok(self.left.current.take());
                }
                if self.join.keeps_right() {
                    return Ok(self.right.current.take());
                }
                return Ok(None);
            };
            match order {
                Ordering::Less if self.join.keeps_left() => {
                    return Ok(self.left.current.take());
                }
                Ordering::Less if self.skip_scan => {
                    let target = self.right.current_values(n);
                    self.left.jump_to(&target)?;
                }
                Ordering::Less => self.left.current = None,
                Ordering::Greater if self.join.keeps_right() => {
                    return Ok(self.right.current.take());
                }
                Ordering::Greater if self.skip_scan => {
                    let target = self.left.current_values(n);
                    self.right.jump_to(&target)?;
                }
                Ordering::Greater => self.right.current = None,
                Ordering::Equal => {
                    return Ok(match self.output {
                        IntersectOutput::OutputLeft => self.left.current.take(),
                        IntersectOutput::OutputRight => self.right.current.take(),
                    });
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let left = self.left.close();
        let right = self.right.close();
        left.and(right)
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.left.cursor.destroy()?;
        self.right.cursor.destroy()
    }
}
