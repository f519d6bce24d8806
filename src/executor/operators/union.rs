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

//! Union operators: ordered merge, hkey merge and concatenation

use std::cmp::Ordering;
use std::sync::Arc;

use crate::core::{DataType, Error, HKey, Result, Row, RowType, RowTypeKind, TableDef, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

/// Next row of `row_type` from `cursor`, skipping other types
fn next_of_type(cursor: &mut dyn Cursor, row_type: &RowType) -> Result<Option<Row>> {
    while let Some(row) = cursor.next()? {
        if row.is_type(row_type) {
            return Ok(Some(row));
        }
    }
    Ok(None)
}

// ============================================================================
// Union_Ordered
// ============================================================================

/// Merge of two streams ordered on the same fields
///
/// Right rows are emitted as rows of the left type. On equal keys the left
/// row is emitted, followed by the right row only with `output_equal`.
#[derive(Debug)]
pub struct Union {
    left: Arc<Operator>,
    right: Arc<Operator>,
    left_type: Arc<RowType>,
    right_type: Arc<RowType>,
    left_fixed: usize,
    right_fixed: usize,
    ascending: Vec<bool>,
    output_equal: bool,
}

impl Union {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        left: Arc<Operator>,
        right: Arc<Operator>,
        left_type: &Arc<RowType>,
        right_type: &Arc<RowType>,
        left_fixed: usize,
        right_fixed: usize,
        ascending: Vec<bool>,
        output_equal: bool,
    ) -> Result<Self> {
        if left_type.field_count() != right_type.field_count() {
            return Err(Error::invalid_plan(format!(
                "cannot union {} and {}: different field counts",
                left_type, right_type
            )));
        }
        for (l, r) in left_type.fields().iter().zip(right_type.fields()) {
            if !l.is_compatible_with(*r) {
                return Err(Error::invalid_plan(format!(
                    "cannot union {} and {}: {} vs {}",
                    left_type, right_type, l, r
                )));
            }
        }
        if ascending.is_empty() {
            return Err(Error::invalid_plan("union compares no fields"));
        }
        if left_fixed.max(right_fixed) + ascending.len() > left_type.field_count() {
            return Err(Error::invalid_plan(format!(
                "union compares past the end of {}",
                left_type
            )));
        }
        Ok(Self {
            left,
            right,
            left_type: left_type.clone(),
            right_type: right_type.clone(),
            left_fixed,
            right_fixed,
            ascending,
            output_equal,
        })
    }
}

impl OperatorImpl for Union {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.left_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        format!(
            "Union_Ordered({} skip {}, {} skip {}, {} fields{})",
            self.left_type,
            self.left_fixed,
            self.right_type,
            self.right_fixed,
            self.ascending.len(),
            if self.output_equal { ", OUTPUT_EQUAL" } else { "" }
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = UnionCursor {
            left: self.left.cursor(ctx, bindings)?,
            right: self.right.cursor(ctx, bindings)?,
            left_type: self.left_type.clone(),
            right_type: self.right_type.clone(),
            left_fixed: self.left_fixed,
            right_fixed: self.right_fixed,
            ascending: self.ascending.clone(),
            output_equal: self.output_equal,
            left_row: None,
            right_row: None,
            left_done: false,
            right_done: false,
            pending: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct UnionCursor {
    left: Box<dyn Cursor>,
    right: Box<dyn Cursor>,
    left_type: Arc<RowType>,
    right_type: Arc<RowType>,
    left_fixed: usize,
    right_fixed: usize,
    ascending: Vec<bool>,
    output_equal: bool,
    left_row: Option<Row>,
    right_row: Option<Row>,
    left_done: bool,
    right_done: bool,
    /// Right row of an equal pair, emitted after the left one
    pending: Option<Row>,
}

impl UnionCursor {
    fn compare(&self, left: &Row, right: &Row) -> Ordering {
        let l = &left.values()[self.left_fixed..];
        let r = &right.values()[self.right_fixed..];
        for ((a, b), &asc) in l.iter().zip(r).zip(&self.ascending) {
            let ord = if asc { a.cmp(b) } else { b.cmp(a) };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn take_right(&mut self) -> Result<Option<Row>> {
        match self.right_row.take() {
            Some(row) => row.retyped(&self.left_type).map(Some),
            None => Ok(None),
        }
    }
}

impl CursorImpl for UnionCursor {
    const NAME: &'static str = "Union_Ordered";

    fn open(&mut self) -> Result<()> {
        self.left_row = None;
        self.right_row = None;
        self.left_done = false;
        self.right_done = false;
        self.pending = None;
        self.left.open()?;
        self.right.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        if self.left_row.is_none() && !self.left_done {
            self.left_row = next_of_type(self.left.as_mut(), &self.left_type)?;
            self.left_done = self.left_row.is_none();
        }
        if self.right_row.is_none() && !self.right_done {
            self.right_row = next_of_type(self.right.as_mut(), &self.right_type)?;
            self.right_done = self.right_row.is_none();
        }
        let order = match (&self.left_row, &self.right_row) {
            (Some(l), Some(r)) => self.compare(l, r),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => return Ok(None),
        };
        match order {
            Ordering::Less => Ok(self.left_row.take()),
            Ordering::Greater => self.take_right(),
            Ordering::Equal => {
                if self.output_equal {
                    self.pending = self.take_right()?;
                } else {
                    self.right_row = None;
                }
                Ok(self.left_row.take())
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.left_row = None;
        self.right_row = None;
        self.pending = None;
        self.left.close()?;
        self.right.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.left.destroy()?;
        self.right.destroy()
    }
}

// ============================================================================
// HKeyUnion_Ordered
// ============================================================================

/// Union of the hkeys of two hkey-ordered streams, as rows of an hkey type
///
/// Input hkeys are truncated to the depth of the output table, which must
/// be an ancestor of (or the same as) the tables of both inputs. Repeated
/// hkeys are emitted once.
#[derive(Debug)]
pub struct HKeyUnion {
    left: Arc<Operator>,
    right: Arc<Operator>,
    left_type: Arc<RowType>,
    right_type: Arc<RowType>,
    output_type: Arc<RowType>,
    depth: usize,
}

impl HKeyUnion {
    pub fn new(
        left: Arc<Operator>,
        right: Arc<Operator>,
        left_type: &Arc<RowType>,
        right_type: &Arc<RowType>,
        output_hkey_type: &Arc<RowType>,
    ) -> Result<Self> {
        let output_table = match output_hkey_type.kind() {
            RowTypeKind::HKey(table) => table.clone(),
            _ => {
                return Err(Error::invalid_plan(format!(
                    "{} is not an hkey row type",
                    output_hkey_type
                )))
            }
        };
        for rt in [left_type, right_type] {
            let covered = rt
                .hkey_table()
                .is_some_and(|t: &Arc<TableDef>| output_table.contains(t));
            if !covered {
                return Err(Error::invalid_plan(format!(
                    "{} rows are not below {}",
                    rt, output_table.name
                )));
            }
        }
        Ok(Self {
            left,
            right,
            left_type: left_type.clone(),
            right_type: right_type.clone(),
            output_type: output_hkey_type.clone(),
            depth: output_table.depth(),
        })
    }
}

impl OperatorImpl for HKeyUnion {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.output_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        format!(
            "HKeyUnion_Ordered({}, {} -> {})",
            self.left_type, self.right_type, self.output_type
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = HKeyUnionCursor {
            left: self.left.cursor(ctx, bindings)?,
            right: self.right.cursor(ctx, bindings)?,
            left_type: self.left_type.clone(),
            right_type: self.right_type.clone(),
            output_type: self.output_type.clone(),
            depth: self.depth,
            left_key: None,
            right_key: None,
            left_done: false,
            right_done: false,
            last: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct HKeyUnionCursor {
    left: Box<dyn Cursor>,
    right: Box<dyn Cursor>,
    left_type: Arc<RowType>,
    right_type: Arc<RowType>,
    output_type: Arc<RowType>,
    depth: usize,
    left_key: Option<HKey>,
    right_key: Option<HKey>,
    left_done: bool,
    right_done: bool,
    /// Last emitted hkey
    last: Option<HKey>,
}

impl HKeyUnionCursor {
    fn truncated(
        cursor: &mut dyn Cursor,
        row_type: &RowType,
        depth: usize,
    ) -> Result<Option<HKey>> {
        match next_of_type(cursor, row_type)? {
            Some(row) => match row.hkey() {
                Some(hkey) => Ok(Some(hkey.prefix(depth))),
                None => Err(Error::internal(format!("{} row has no hkey", row_type))),
            },
            None => Ok(None),
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.left_key.is_none() && !self.left_done {
            self.left_key = Self::truncated(self.left.as_mut(), &self.left_type, self.depth)?;
            self.left_done = self.left_key.is_none();
        }
        if self.right_key.is_none() && !self.right_done {
            self.right_key = Self::truncated(self.right.as_mut(), &self.right_type, self.depth)?;
            self.right_done = self.right_key.is_none();
        }
        Ok(())
    }

    fn hkey_row(&self, hkey: HKey) -> Result<Row> {
        let values: Vec<Value> = hkey.key_values().cloned().collect();
        Row::with_hkey(&self.output_type, values, hkey)
    }
}

impl CursorImpl for HKeyUnionCursor {
    const NAME: &'static str = "HKeyUnion_Ordered";

    fn open(&mut self) -> Result<()> {
        self.left_key = None;
        self.right_key = None;
        self.left_done = false;
        self.right_done = false;
        self.last = None;
        self.left.open()?;
        self.right.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            self.fill()?;
            let order = match (&self.left_key, &self.right_key) {
                (Some(l), Some(r)) => l.cmp(r),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => return Ok(None),
            };
            let next = match order {
                Ordering::Less => self.left_key.take(),
                Ordering::Greater => self.right_key.take(),
                Ordering::Equal => {
                    self.right_key = None;
                    self.left_key.take()
                }
            };
            let Some(hkey) = next else {
                return Ok(None);
            };
            if self.last.as_ref() == Some(&hkey) {
                continue;
            }
            self.last = Some(hkey.clone());
            return self.hkey_row(hkey).map(Some);
        }
    }

    fn close(&mut self) -> Result<()> {
        self.left_key = None;
        self.right_key = None;
        self.last = None;
        self.left.close()?;
        self.right.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.left.destroy()?;
        self.right.destroy()
    }
}

// ============================================================================
// UnionAll
// ============================================================================

/// Concatenation of several inputs, retyped to one derived row type
#[derive(Debug)]
pub struct UnionAll {
    inputs: Vec<(Arc<Operator>, Arc<RowType>)>,
    output_type: Arc<RowType>,
}

impl UnionAll {
    pub fn new(inputs: Vec<(Arc<Operator>, Arc<RowType>)>) -> Result<Self> {
        let Some((_, first)) = inputs.first() else {
            return Err(Error::invalid_plan("union all of no inputs"));
        };
        let mut fields: Vec<DataType> = first.fields().to_vec();
        for (_, rt) in &inputs[1..] {
            if rt.field_count() != fields.len() {
                return Err(Error::invalid_plan(format!(
                    "union all input {} has {} fields, expected {}",
                    rt,
                    rt.field_count(),
                    fields.len()
                )));
            }
            for (field, &other) in fields.iter_mut().zip(rt.fields()) {
                if !field.is_compatible_with(other) {
                    return Err(Error::invalid_plan(format!(
                        "union all input {} mixes {} and {}",
                        rt, field, other
                    )));
                }
                if *field == DataType::Null {
                    *field = other;
                }
            }
        }
        Ok(Self {
            output_type: RowType::derived("union_all", fields),
            inputs,
        })
    }
}

impl OperatorImpl for UnionAll {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.output_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        self.inputs.iter().map(|(op, _)| op).collect()
    }

    fn derived_type(&self) -> Option<&Arc<RowType>> {
        Some(&self.output_type)
    }

    fn describe(&self) -> String {
        format!("UnionAll({} inputs)", self.inputs.len())
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let inputs = self
            .inputs
            .iter()
            .map(|(op, rt)| Ok((op.cursor(ctx, bindings)?, rt.clone())))
            .collect::<Result<Vec<_>>>()?;
        let cursor = UnionAllCursor {
            inputs,
            output_type: self.output_type.clone(),
            current: 0,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct UnionAllCursor {
    inputs: Vec<(Box<dyn Cursor>, Arc<RowType>)>,
    output_type: Arc<RowType>,
    /// Index of the input being drained
    current: usize,
}

impl CursorImpl for UnionAllCursor {
    const NAME: &'static str = "UnionAll";

    fn open(&mut self) -> Result<()> {
        self.current = 0;
        match self.inputs.first_mut() {
            Some((cursor, _)) => cursor.open(),
            None => Ok(()),
        }
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while let Some((cursor, row_type)) = self.inputs.get_mut(self.current) {
            if let Some(row) = next_of_type(cursor.as_mut(), row_type)? {
                return row.retyped(&self.output_type).map(Some);
            }
            self.current += 1;
            if let Some((next, _)) = self.inputs.get_mut(self.current) {
                next.open()?;
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        for (cursor, _) in &mut self.inputs {
            cursor.close()?;
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        for (cursor, _) in &mut self.inputs {
            cursor.destroy()?;
        }
        Ok(())
    }
}
