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

//! Flatten: parent/child join over one hkey-ordered stream
//!
//! A child row follows its parent in hkey order, so the join needs only the
//! most recent parent. An unmatched parent's null-extended row is emitted as
//! soon as a row sorting after the synthetic key `parent hkey + null child
//! segments` arrives, which keeps the output in hkey order.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::options::{FlattenOptions, JoinType};
use crate::core::{Error, HKey, HKeySegment, Result, Row, RowType, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

/// Parent/child flatten
#[derive(Debug)]
pub struct Flatten {
    input: Arc<Operator>,
    parent_type: Arc<RowType>,
    child_type: Arc<RowType>,
    output_type: Arc<RowType>,
    join: JoinType,
    options: FlattenOptions,
    /// Segments below the parent down to the child table, all keys NULL
    null_child_segments: Vec<HKeySegment>,
}

impl Flatten {
    pub fn new(
        input: Arc<Operator>,
        parent_type: &Arc<RowType>,
        child_type: &Arc<RowType>,
        join: JoinType,
        options: FlattenOptions,
    ) -> Result<Self> {
        options.validate(join)?;
        let output_type = RowType::flattened(parent_type, child_type)?;
        let (parent_table, child_table) = match (parent_type.table(), child_type.table()) {
            (Some(p), Some(c)) => (p, c),
            _ => return Err(Error::internal("flattened type without tables")),
        };
        let null_child_segments = (parent_table.depth()..child_table.depth())
            .map(|level| {
                let nulls = child_table.hkey_columns[level]
                    .iter()
                    .map(|&c| Value::null(child_table.columns[c].data_type));
                HKeySegment::new(child_table.ancestry_ordinals[level], nulls)
            })
            .collect();
        Ok(Self {
            input,
            parent_type: parent_type.clone(),
            child_type: child_type.clone(),
            output_type,
            join,
            options,
            null_child_segments,
        })
    }
}

impl OperatorImpl for Flatten {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.output_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input]
    }

    fn derived_type(&self) -> Option<&Arc<RowType>> {
        Some(&self.output_type)
    }

    fn describe(&self) -> String {
        let options = self.options.to_string();
        format!(
            "Flatten({} {} JOIN {}{}{})",
            self.parent_type,
            self.join,
            self.child_type,
            if options.is_empty() { "" } else { ", " },
            options
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = FlattenCursor {
            input: self.input.cursor(ctx, bindings)?,
            parent_type: self.parent_type.clone(),
            child_type: self.child_type.clone(),
            output_type: self.output_type.clone(),
            join: self.join,
            options: self.options,
            null_child_segments: self.null_child_segments.clone(),
            parent: None,
            parent_matched: false,
            pending: VecDeque::new(),
            input_done: false,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct FlattenCursor {
    input: Box<dyn Cursor>,
    parent_type: Arc<RowType>,
    child_type: Arc<RowType>,
    output_type: Arc<RowType>,
    join: JoinType,
    options: FlattenOptions,
    null_child_segments: Vec<HKeySegment>,
    parent: Option<Row>,
    /// The current parent produced a flattened or null-extended row
    parent_matched: bool,
    pending: VecDeque<Row>,
    input_done: bool,
}

impl FlattenCursor {
    fn combine(&self, parent: Option<&Row>, child: &Row) -> Row {
        let mut values = Vec::with_capacity(self.output_type.field_count());
        match parent {
            Some(p) => values.extend_from_slice(p.values()),
            None => values.extend(self.parent_type.fields().iter().map(|&t| Value::null(t))),
        }
        values.extend_from_slice(child.values());
        Row::from_parts(
            self.output_type.clone(),
            values.into(),
            child.hkey_arc().cloned(),
        )
    }

    /// Synthetic hkey of the missing child of `parent`
    fn null_child_hkey(&self, parent: &HKey) -> HKey {
        let mut hkey = parent.clone();
        for segment in &self.null_child_segments {
            hkey.push(segment.clone());
        }
        hkey
    }

    fn null_extended(&self, parent: &Row) -> Row {
        let mut values = Vec::with_capacity(self.output_type.field_count());
        values.extend_from_slice(parent.values());
        values.extend(self.child_type.fields().iter().map(|&t| Value::null(t)));
        let hkey = match parent.hkey() {
            Some(h) if !self.options.left_join_shortens_hkey => {
                Some(Arc::new(self.null_child_hkey(h)))
            }
            _ => parent.hkey_arc().cloned(),
        };
        Row::from_parts(self.output_type.clone(), values.into(), hkey)
    }

    /// Retire the current parent, emitting its null-extended row if it
    /// never matched
    fn finish_parent(&mut self) {
        if let Some(parent) = self.parent.take() {
            if !self.parent_matched && self.join.keeps_left() {
                let row = self.null_extended(&parent);
                self.pending.push_back(row);
            }
        }
        self.parent_matched = false;
    }

    fn process(&mut self, row: Row) {
        if row.is_type(&self.parent_type) {
            self.finish_parent();
            if self.options.keep_parent {
                self.pending.push_back(row.clone());
            }
            self.parent = Some(row);
            return;
        }

        if row.is_type(&self.child_type) {
            let is_child = match (self.parent.as_ref().and_then(Row::hkey), row.hkey()) {
                (Some(p), Some(c)) => p.is_ancestor_of(c),
                _ => false,
            };
            if is_child {
                let flattened = self.combine(self.parent.as_ref(), &row);
                self.pending.push_back(flattened);
                self.parent_matched = true;
            } else {
                self.finish_parent();
                if self.join.keeps_right() {
                    let orphan = self.combine(None, &row);
                    self.pending.push_back(orphan);
                }
            }
            if self.options.keep_child {
                self.pending.push_back(row);
            }
            return;
        }

        if let Some(parent) = self.parent.as_ref() {
            match (parent.hkey(), row.hkey()) {
                (Some(p), Some(r)) if p.is_ancestor_of(r) => {
                    if !self.parent_matched
                        && self.join.keeps_left()
                        && *r > self.null_child_hkey(p)
                    {
                        let extended = self.null_extended(parent);
                        self.pending.push_back(extended);
                        self.parent_matched = true;
                    }
                }
                _ => self.finish_parent(),
            }
        }
        self.pending.push_back(row);
    }
}

impl CursorImpl for FlattenCursor {
    const NAME: &'static str = "Flatten";

    fn open(&mut self) -> Result<()> {
        self.parent = None;
        self.parent_matched = false;
        self.pending.clear();
        self.input_done = false;
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            if self.input_done {
                return Ok(None);
            }
            match self.input.next()? {
                Some(row) => self.process(row),
                None => {
                    self.input_done = true;
                    self.finish_parent();
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.parent = None;
        self.pending.clear();
        self.input.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.input.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::operators::scan::{GroupScan, GroupScanMode};
    use crate::executor::operators::test_support::Fixture;

    fn flatten(fx: &Fixture, join: JoinType, options: FlattenOptions) -> Operator {
        let scan = Arc::new(Operator::GroupScan(
            GroupScan::new(&fx.schema, fx.group, GroupScanMode::Full).unwrap(),
        ));
        Operator::Flatten(
            Flatten::new(
                scan,
                &fx.table_type(fx.customer),
                &fx.table_type(fx.orders),
                join,
                options,
            )
            .unwrap(),
        )
    }

    fn flattened_only(rows: Vec<String>) -> Vec<String> {
        rows.into_iter().filter(|r| r.starts_with("flatten")).collect()
    }

    #[test]
    fn test_inner_flatten_passes_other_rows() {
        let fx = Fixture::new();
        let rows = fx.render(&flatten(&fx, JoinType::Inner, FlattenOptions::new()));
        assert_eq!(
            rows,
            vec![
                "flatten(customer, orders)[1, alice, 10, 1, 5] {1:(1),2:(10)}",
                "item[100, 1, 10, 2] {1:(1),2:(10),3:(100)}",
                "item[101, 1, 10, 3] {1:(1),2:(10),3:(101)}",
                "flatten(customer, orders)[1, alice, 11, 1, 7] {1:(1),2:(11)}",
                "item[110, 1, 11, 1] {1:(1),2:(11),3:(110)}",
                "address[1000, 1, paris] {1:(1),4:(1000)}",
                "flatten(customer, orders)[2, bob, 20, 2, 5] {1:(2),2:(20)}",
                "item[200, 2, 20, 4] {1:(2),2:(20),3:(200)}",
                "address[3000, 3, rome] {1:(3),4:(3000)}",
                "item[400, 4, 40, 5] {1:(4),2:(40),3:(400)}",
            ]
        );
    }

    #[test]
    fn test_left_flatten_emits_null_child_in_hkey_order() {
        let fx = Fixture::new();
        let rows = fx.render(&flatten(&fx, JoinType::Left, FlattenOptions::new()));
        let carol = rows
            .iter()
            .position(|r| r.starts_with("flatten(customer, orders)[3"))
            .unwrap();
        assert_eq!(
            rows[carol],
            "flatten(customer, orders)[3, carol, NULL, NULL, NULL] {1:(3),2:(NULL)}"
        );
        assert_eq!(rows[carol + 1], "address[3000, 3, rome] {1:(3),4:(3000)}");

        let hkeys: Vec<HKey> = fx
            .run(&flatten(&fx, JoinType::Left, FlattenOptions::new()))
            .iter()
            .map(|r| r.hkey().unwrap().clone())
            .collect();
        assert!(hkeys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_left_join_shortens_hkey() {
        let fx = Fixture::new();
        let op = flatten(
            &fx,
            JoinType::Left,
            FlattenOptions::new().left_join_shortens_hkey(),
        );
        let rows = flattened_only(fx.render(&op));
        assert_eq!(
            rows[3],
            "flatten(customer, orders)[3, carol, NULL, NULL, NULL] {1:(3)}"
        );
    }

    #[test]
    fn test_right_and_full_keep_orphans() {
        let fx = Fixture::new();
        let right = flattened_only(fx.render(&flatten(&fx, JoinType::Right, FlattenOptions::new())));
        assert_eq!(right.len(), 4);
        assert_eq!(
            right[3],
            "flatten(customer, orders)[NULL, NULL, 40, 4, 9] {1:(4),2:(40)}"
        );

        let full = flattened_only(fx.render(&flatten(&fx, JoinType::Full, FlattenOptions::new())));
        assert_eq!(full.len(), 5);
        assert!(full[3].contains("[3, carol, NULL, NULL, NULL]"));
        assert!(full[4].contains("[NULL, NULL, 40, 4, 9]"));
    }

    #[test]
    fn test_keep_parent_and_child() {
        let fx = Fixture::new();
        let rows = fx.render(&flatten(
            &fx,
            JoinType::Inner,
            FlattenOptions::new().keep_parent().keep_child(),
        ));
        assert_eq!(
            &rows[..3],
            &[
                "customer[1, alice] {1:(1)}",
                "flatten(customer, orders)[1, alice, 10, 1, 5] {1:(1),2:(10)}",
                "orders[10, 1, 5] {1:(1),2:(10)}",
            ]
        );
        // the orphan order is kept as a plain child row
        assert!(rows.contains(&"orders[40, 4, 9] {1:(4),2:(40)}".to_string()));
    }

    #[test]
    fn test_invalid_flattens() {
        let fx = Fixture::new();
        let scan = Arc::new(Operator::GroupScan(
            GroupScan::new(&fx.schema, fx.group, GroupScanMode::Full).unwrap(),
        ));
        let shortens_inner = Flatten::new(
            scan.clone(),
            &fx.table_type(fx.customer),
            &fx.table_type(fx.orders),
            JoinType::Inner,
            FlattenOptions::new().left_join_shortens_hkey(),
        );
        assert!(shortens_inner.unwrap_err().is_plan_error());

        let reversed = Flatten::new(
            scan,
            &fx.table_type(fx.orders),
            &fx.table_type(fx.customer),
            JoinType::Inner,
            FlattenOptions::new(),
        );
        assert!(reversed.unwrap_err().is_plan_error());
    }

    #[test]
    fn test_derived_types_and_explain() {
        let fx = Fixture::new();
        let op = flatten(&fx, JoinType::Left, FlattenOptions::new().keep_child());
        let mut types = Vec::new();
        op.derived_types(&mut types);
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].to_string(), "flatten(customer, orders)");
        assert_eq!(
            op.to_string(),
            "Flatten(customer LEFT JOIN orders, KEEP_CHILD)\n  GroupScan(coi full)\n"
        );
    }
}
