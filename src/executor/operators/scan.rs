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

//! Leaf operators: group scans, index scans and literal rows

use std::sync::Arc;

use crate::core::{Error, GroupId, HKey, IndexDef, Result, Row, RowType, Schema};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{ColumnSelector, Cursor, CursorImpl, ManagedCursor};
use crate::executor::expression::Expression;
use crate::executor::operator::{Operator, OperatorImpl};
use crate::storage::{
    GroupCursor, GroupScanStart, IndexBound, IndexCursor, IndexKeyRange, StoreAdapter,
};

// ============================================================================
// GroupScan
// ============================================================================

/// Which rows of the group a [`GroupScan`] visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScanMode {
    /// Every row, in hkey order
    Full,
    /// Rows reachable from the hkey bound at `binding`
    ///
    /// The hkey is first truncated to `depth` levels when given. Deep scans
    /// return the whole subtree; shallow scans return the single row with
    /// exactly that hkey, if it exists.
    Positional {
        binding: usize,
        depth: Option<usize>,
        deep: bool,
    },
}

/// Scan of one group in hkey order
#[derive(Debug)]
pub struct GroupScan {
    group: GroupId,
    group_name: String,
    mode: GroupScanMode,
}

impl GroupScan {
    pub fn new(schema: &Schema, group: GroupId, mode: GroupScanMode) -> Result<Self> {
        let def = schema.group(group)?;
        if let GroupScanMode::Positional { depth: Some(0), .. } = mode {
            return Err(Error::invalid_plan("group scan depth must be at least 1"));
        }
        Ok(Self {
            group,
            group_name: def.name.clone(),
            mode,
        })
    }
}

impl OperatorImpl for GroupScan {
    fn row_type(&self) -> Option<Arc<RowType>> {
        None
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        Vec::new()
    }

    fn describe(&self) -> String {
        match self.mode {
            GroupScanMode::Full => format!("GroupScan({} full)", self.group_name),
            GroupScanMode::Positional {
                binding,
                depth,
                deep,
            } => format!(
                "GroupScan({} at binding {}{}, {})",
                self.group_name,
                binding,
                depth.map(|d| format!(" depth {}", d)).unwrap_or_default(),
                if deep { "deep" } else { "shallow" }
            ),
        }
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = GroupScanCursor {
            storage: ctx.store().group_cursor(self.group)?,
            mode: self.mode,
            bindings: bindings.clone(),
            exact: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct GroupScanCursor {
    storage: Box<dyn GroupCursor>,
    mode: GroupScanMode,
    bindings: QueryBindings,
    /// Hkey a shallow scan must match exactly
    exact: Option<HKey>,
}

impl CursorImpl for GroupScanCursor {
    const NAME: &'static str = "GroupScan";

    fn open(&mut self) -> Result<()> {
        match self.mode {
            GroupScanMode::Full => self.storage.open(GroupScanStart::Full),
            GroupScanMode::Positional {
                binding,
                depth,
                deep,
            } => {
                let mut hkey = self.bindings.get_hkey(binding)?;
                if let Some(depth) = depth {
                    hkey.truncate(depth);
                }
                if !deep {
                    self.exact = Some(hkey.clone());
                }
                self.storage.open(GroupScanStart::At { hkey, deep })
            }
        }
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let row = self.storage.next()?;
        match &self.exact {
            Some(exact) => Ok(row.filter(|r| r.hkey() == Some(exact))),
            None => Ok(row),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.storage.close();
        self.exact = None;
        Ok(())
    }
}

// ============================================================================
// IndexScan
// ============================================================================

/// One end of an index scan range, as expressions over the bindings
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanBound {
    pub values: Vec<Expression>,
    pub inclusive: bool,
}

impl IndexScanBound {
    pub fn inclusive(values: Vec<Expression>) -> Self {
        Self {
            values,
            inclusive: true,
        }
    }

    pub fn exclusive(values: Vec<Expression>) -> Self {
        Self {
            values,
            inclusive: false,
        }
    }

    fn resolve(&self, bindings: &QueryBindings) -> Result<IndexBound> {
        let values = self
            .values
            .iter()
            .map(|e| e.eval(None, bindings))
            .collect::<Result<Vec<_>>>()?;
        Ok(IndexBound {
            values,
            inclusive: self.inclusive,
        })
    }
}

/// Key range of an index scan
///
/// Bounds are evaluated when the cursor opens, so they may read rows and
/// values bound by an enclosing nested loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexScanRange {
    pub lo: Option<IndexScanBound>,
    pub hi: Option<IndexScanBound>,
}

impl IndexScanRange {
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows whose leading fields equal `values`
    pub fn exact(values: Vec<Expression>) -> Self {
        Self {
            lo: Some(IndexScanBound::inclusive(values.clone())),
            hi: Some(IndexScanBound::inclusive(values)),
        }
    }

    pub fn between(lo: Option<IndexScanBound>, hi: Option<IndexScanBound>) -> Self {
        Self { lo, hi }
    }

    fn resolve(&self, bindings: &QueryBindings) -> Result<IndexKeyRange> {
        let lo = self.lo.as_ref().map(|b| b.resolve(bindings)).transpose()?;
        let hi = self.hi.as_ref().map(|b| b.resolve(bindings)).transpose()?;
        Ok(IndexKeyRange::between(lo, hi))
    }

    fn bound_len(&self) -> usize {
        let lo = self.lo.as_ref().map_or(0, |b| b.values.len());
        let hi = self.hi.as_ref().map_or(0, |b| b.values.len());
        lo.max(hi)
    }
}

/// Ordered scan of an index range
#[derive(Debug)]
pub struct IndexScan {
    index: Arc<IndexDef>,
    row_type: Arc<RowType>,
    range: IndexScanRange,
    /// Direction of each leading index field
    ascending: Vec<bool>,
}

impl IndexScan {
    pub fn new(
        schema: &Schema,
        index: crate::core::IndexId,
        range: IndexScanRange,
        ascending: Vec<bool>,
    ) -> Result<Self> {
        let def = schema.index(index)?.clone();
        let row_type = schema.index_row_type(index)?;
        if ascending.len() > row_type.field_count() {
            return Err(Error::invalid_plan(format!(
                "{} has {} fields, ordering names {}",
                row_type,
                row_type.field_count(),
                ascending.len()
            )));
        }
        if range.bound_len() > row_type.field_count() {
            return Err(Error::invalid_plan(format!(
                "range bound longer than the fields of {}",
                row_type
            )));
        }
        Ok(Self {
            index: def,
            row_type,
            range,
            ascending,
        })
    }
}

impl OperatorImpl for IndexScan {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.row_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        Vec::new()
    }

    fn supports_jump(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        let mut out = format!("IndexScan({}", self.index.name);
        if let Some(lo) = &self.range.lo {
            out.push_str(&format!(
                " {} {}",
                if lo.inclusive { ">=" } else { ">" },
                render_exprs(&lo.values)
            ));
        }
        if let Some(hi) = &self.range.hi {
            out.push_str(&format!(
                " {} {}",
                if hi.inclusive { "<=" } else { "<" },
                render_exprs(&hi.values)
            ));
        }
        if self.ascending.iter().any(|asc| !asc) {
            let dirs: Vec<_> = self
                .ascending
                .iter()
                .map(|&a| if a { "ASC" } else { "DESC" })
                .collect();
            out.push_str(&format!(" {}", dirs.join(" ")));
        }
        out.push(')');
        out
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = IndexScanCursor {
            store: ctx.store().clone(),
            index: self.index.id,
            range: self.range.clone(),
            ascending: self.ascending.clone(),
            bindings: bindings.clone(),
            storage: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

fn render_exprs(values: &[Expression]) -> String {
    let parts: Vec<_> = values.iter().map(Expression::to_string).collect();
    format!("({})", parts.join(", "))
}

struct IndexScanCursor {
    store: Arc<dyn StoreAdapter>,
    index: crate::core::IndexId,
    range: IndexScanRange,
    ascending: Vec<bool>,
    bindings: QueryBindings,
    storage: Option<Box<dyn IndexCursor>>,
}

impl CursorImpl for IndexScanCursor {
    const NAME: &'static str = "IndexScan";

    fn open(&mut self) -> Result<()> {
        let range = self.range.resolve(&self.bindings)?;
        let mut storage = self.store.index_cursor(self.index, range, &self.ascending)?;
        storage.open()?;
        self.storage = Some(storage);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        match self.storage.as_mut() {
            Some(storage) => storage.next(),
            None => Ok(None),
        }
    }

    fn jump(&mut self, row: &Row, columns: &ColumnSelector) -> Result<()> {
        let storage = self
            .storage
            .as_mut()
            .ok_or_else(|| Error::internal("index scan jumped before open"))?;
        storage.jump(columns.select(row))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut storage) = self.storage.take() {
            storage.close();
        }
        Ok(())
    }

    fn keeps_open_for_jump(&self) -> bool {
        true
    }
}

// ============================================================================
// ValuesScan
// ============================================================================

/// Fixed list of rows
#[derive(Debug)]
pub struct ValuesScan {
    row_type: Arc<RowType>,
    rows: Arc<[Row]>,
}

impl ValuesScan {
    pub fn new(row_type: &Arc<RowType>, rows: Vec<Row>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| !r.is_type(row_type)) {
            return Err(Error::invalid_plan(format!(
                "values scan of {} given a {} row",
                row_type,
                bad.row_type()
            )));
        }
        Ok(Self {
            row_type: row_type.clone(),
            rows: rows.into(),
        })
    }
}

impl OperatorImpl for ValuesScan {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.row_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        Vec::new()
    }

    fn describe(&self) -> String {
        format!("ValuesScan({}, {} rows)", self.row_type, self.rows.len())
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        _bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = ValuesScanCursor {
            rows: self.rows.clone(),
            position: 0,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct ValuesScanCursor {
    rows: Arc<[Row]>,
    position: usize,
}

impl CursorImpl for ValuesScanCursor {
    const NAME: &'static str = "ValuesScan";

    fn open(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<()> {
        self.position = self.rows.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, HKeySegment, Value};
    use crate::executor::operators::test_support::{rows_of, Fixture};

    #[test]
    fn test_full_group_scan() {
        let fx = Fixture::new();
        let scan = Operator::GroupScan(GroupScan::new(&fx.schema, fx.group, GroupScanMode::Full).unwrap());
        let rows = fx.render(&scan);
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[0], "customer[1, alice] {1:(1)}");
        assert_eq!(rows[1], "orders[10, 1, 5] {1:(1),2:(10)}");
        assert_eq!(rows[6], "address[1000, 1, paris] {1:(1),4:(1000)}");
        assert_eq!(rows[13], "item[400, 4, 40, 5] {1:(4),2:(40),3:(400)}");
        assert_eq!(scan.to_string(), "GroupScan(coi full)\n");
    }

    #[test]
    fn test_positional_group_scan() {
        let fx = Fixture::new();
        let item_key = HKey::from_segments([
            HKeySegment::new(1, [Value::integer(1)]),
            HKeySegment::new(2, [Value::integer(10)]),
            HKeySegment::new(3, [Value::integer(101)]),
        ]);
        fx.bindings.set_hkey(0, item_key);

        let deep = GroupScan::new(
            &fx.schema,
            fx.group,
            GroupScanMode::Positional {
                binding: 0,
                depth: Some(2),
                deep: true,
            },
        )
        .unwrap();
        let rows = fx.render(&Operator::GroupScan(deep));
        assert_eq!(
            rows,
            vec![
                "orders[10, 1, 5] {1:(1),2:(10)}",
                "item[100, 1, 10, 2] {1:(1),2:(10),3:(100)}",
                "item[101, 1, 10, 3] {1:(1),2:(10),3:(101)}",
            ]
        );

        let shallow = GroupScan::new(
            &fx.schema,
            fx.group,
            GroupScanMode::Positional {
                binding: 0,
                depth: Some(1),
                deep: false,
            },
        )
        .unwrap();
        assert_eq!(
            fx.render(&Operator::GroupScan(shallow)),
            vec!["customer[1, alice] {1:(1)}"]
        );

        // customer 4 does not exist: a shallow scan finds nothing
        fx.bindings.set_hkey(
            1,
            HKey::from_segments([HKeySegment::new(1, [Value::integer(4)])]),
        );
        let missing = GroupScan::new(
            &fx.schema,
            fx.group,
            GroupScanMode::Positional {
                binding: 1,
                depth: None,
                deep: false,
            },
        )
        .unwrap();
        assert!(fx.run(&Operator::GroupScan(missing)).is_empty());
    }

    #[test]
    fn test_group_scan_rejects_zero_depth() {
        let fx = Fixture::new();
        let err = GroupScan::new(
            &fx.schema,
            fx.group,
            GroupScanMode::Positional {
                binding: 0,
                depth: Some(0),
                deep: true,
            },
        )
        .unwrap_err();
        assert!(err.is_plan_error());
    }

    #[test]
    fn test_index_scan_range_and_direction() {
        let fx = Fixture::new();
        let range = IndexScanRange::between(
            Some(IndexScanBound::inclusive(vec![Expression::literal(5i64)])),
            Some(IndexScanBound::exclusive(vec![Expression::literal(9i64)])),
        );
        let scan = IndexScan::new(&fx.schema, fx.orders_odate, range, vec![false]).unwrap();
        let odates: Vec<(i64, i64)> = fx
            .run(&Operator::IndexScan(scan))
            .iter()
            .map(|r| (r[0].as_int64().unwrap(), r[2].as_int64().unwrap()))
            .collect();
        assert_eq!(odates, vec![(7, 11), (5, 10), (5, 20)]);
    }

    #[test]
    fn test_nested_index_scan_reads_binding() {
        let fx = Fixture::new();
        let scan = IndexScan::new(
            &fx.schema,
            fx.customer_name,
            IndexScanRange::exact(vec![Expression::bound_value(3)]),
            vec![],
        )
        .unwrap();
        let op = Operator::IndexScan(scan);
        fx.bindings.set_value(3, Value::text("bob"));
        let rows = fx.run(&op);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_string(), "customer.customer_name[bob, 2] {1:(2)}");

        let unbound = IndexScan::new(
            &fx.schema,
            fx.customer_name,
            IndexScanRange::exact(vec![Expression::bound_value(9)]),
            vec![],
        )
        .unwrap();
        assert_eq!(
            fx.try_run(&Operator::IndexScan(unbound)).unwrap_err(),
            Error::BindingNotSet(9)
        );
    }

    #[test]
    fn test_index_scan_jump() {
        let fx = Fixture::new();
        let scan = IndexScan::new(&fx.schema, fx.item_qty, IndexScanRange::all(), vec![]).unwrap();
        let mut cursor = Operator::IndexScan(scan).cursor(&fx.ctx, &fx.bindings).unwrap();
        cursor.open().unwrap();
        assert_eq!(cursor.next().unwrap().unwrap()[0], Value::integer(1));

        let key_type = RowType::derived("key", vec![DataType::Integer]);
        let key = Row::new(&key_type, vec![Value::integer(4)]).unwrap();
        cursor.jump(&key, &ColumnSelector::leading(1)).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap()[0], Value::integer(4));
        assert_eq!(cursor.next().unwrap().unwrap()[0], Value::integer(5));
        assert!(cursor.next().unwrap().is_none());

        // an exhausted index scan can still be repositioned
        let back = Row::new(&key_type, vec![Value::integer(3)]).unwrap();
        cursor.jump(&back, &ColumnSelector::leading(1)).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap()[0], Value::integer(3));
        cursor.destroy().unwrap();
    }

    #[test]
    fn test_values_scan() {
        let fx = Fixture::new();
        let rt = RowType::derived("v", vec![DataType::Integer]);
        let rows = rows_of(&rt, vec![vec![Value::integer(1)], vec![Value::integer(2)]]);
        let op = Operator::ValuesScan(ValuesScan::new(&rt, rows.clone()).unwrap());
        assert_eq!(fx.run(&op), rows);
        // reusable across executions
        assert_eq!(fx.run(&op), rows);

        let other = RowType::derived("w", vec![DataType::Integer]);
        let wrong = rows_of(&other, vec![vec![Value::integer(1)]]);
        assert!(ValuesScan::new(&rt, wrong).is_err());
    }
}
