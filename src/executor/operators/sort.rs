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

//! Sort operators
//!
//! Both variants materialize the rows of the sort type when the cursor
//! opens and emit them in order; rows of other types are dropped.
//! `Tree` sorts everything. `InsertionLimited` keeps a bounded sorted
//! buffer of the first `limit` rows and falls back to a full sort when the
//! limit exceeds `ExecConfig::max_insertion_sort_limit`.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::api::options::SortOption;
use crate::core::{Error, Result, Row, RowType, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};
use crate::executor::ordering::SortOrdering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortAlgorithm {
    /// Unbounded stable sort
    Tree,
    /// Keep only the first `limit` rows in sort order
    InsertionLimited { limit: usize },
}

#[derive(Debug)]
pub struct Sort {
    input: Arc<Operator>,
    sort_type: Arc<RowType>,
    ordering: SortOrdering,
    option: SortOption,
    algorithm: SortAlgorithm,
}

impl Sort {
    pub fn new(
        input: Arc<Operator>,
        sort_type: &Arc<RowType>,
        ordering: SortOrdering,
        option: SortOption,
        algorithm: SortAlgorithm,
    ) -> Result<Self> {
        if ordering.is_empty() {
            return Err(Error::invalid_plan("sort without ordering"));
        }
        for item in ordering.items() {
            item.expression.result_type(Some(&**sort_type))?;
        }
        Ok(Self {
            input,
            sort_type: sort_type.clone(),
            ordering,
            option,
            algorithm,
        })
    }
}

impl OperatorImpl for Sort {
    fn row_type(&self) -> Option<Arc<RowType>> {
        Some(self.sort_type.clone())
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        let mut out = match self.algorithm {
            SortAlgorithm::Tree => "Sort_Tree(".to_string(),
            SortAlgorithm::InsertionLimited { limit } => {
                format!("Sort_InsertionLimited(limit {}, ", limit)
            }
        };
        out.push_str(&format!("{}: {}", self.sort_type, self.ordering));
        if self.option == SortOption::SuppressDuplicates {
            out.push_str(", SUPPRESS_DUPLICATES");
        }
        out.push(')');
        out
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = SortCursor {
            input: self.input.cursor(ctx, bindings)?,
            bindings: bindings.clone(),
            sort_type: self.sort_type.clone(),
            ordering: self.ordering.clone(),
            suppress: self.option == SortOption::SuppressDuplicates,
            algorithm: self.algorithm,
            max_insertion_limit: ctx.config().max_insertion_sort_limit,
            sorted: VecDeque::new(),
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

type Keyed = (Vec<Value>, Row);

struct SortCursor {
    input: Box<dyn Cursor>,
    bindings: QueryBindings,
    sort_type: Arc<RowType>,
    ordering: SortOrdering,
    suppress: bool,
    algorithm: SortAlgorithm,
    max_insertion_limit: usize,
    sorted: VecDeque<Row>,
}

impl SortCursor {
    fn compare(&self, a: &Keyed, b: &Keyed) -> Ordering {
        self.ordering.compare_keys(&a.0, &b.0)
    }

    fn sort_all(&mut self, limit: Option<usize>) -> Result<Vec<Keyed>> {
        let mut rows = Vec::new();
        while let Some(row) = self.input.next()? {
            if row.is_type(&self.sort_type) {
                rows.push((self.ordering.evaluate(&row, &self.bindings)?, row));
            }
        }
        rows.sort_by(|a, b| self.compare(a, b));
        if self.suppress {
            rows.dedup_by(|later, earlier| self.compare(later, earlier) == Ordering::Equal);
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn sort_insertion(&mut self, limit: usize) -> Result<Vec<Keyed>> {
        let mut buffer: Vec<Keyed> = Vec::with_capacity(limit + 1);
        while let Some(row) = self.input.next()? {
            if limit == 0 || !row.is_type(&self.sort_type) {
                continue;
            }
            let keyed = (self.ordering.evaluate(&row, &self.bindings)?, row);
            // after any equal rows, so the sort is stable
            let position =
                buffer.partition_point(|e| self.compare(e, &keyed) != Ordering::Greater);
            if position >= limit {
                continue;
            }
            if self.suppress
                && position > 0
                && self.compare(&buffer[position - 1], &keyed) == Ordering::Equal
            {
                continue;
            }
            buffer.insert(position, keyed);
            buffer.truncate(limit);
        }
        Ok(buffer)
    }
}

impl CursorImpl for SortCursor {
    const NAME: &'static str = "Sort";

    fn open(&mut self) -> Result<()> {
        self.sorted.clear();
        self.input.open()?;
        let rows = match self.algorithm {
            SortAlgorithm::Tree => self.sort_all(None)?,
            SortAlgorithm::InsertionLimited { limit } if limit > self.max_insertion_limit => {
                tracing::debug!(
                    limit,
                    max = self.max_insertion_limit,
                    "insertion sort limit too large, sorting fully"
                );
                self.sort_all(Some(limit))?
            }
            SortAlgorithm::InsertionLimited { limit } => self.sort_insertion(limit)?,
        };
        self.sorted = rows.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        Ok(self.sorted.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.sorted.clear();
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
    use crate::core::DataType;
    use crate::executor::config::ExecConfig;
    use crate::executor::expression::Expression;
    use crate::executor::ordering::Collator;
    use crate::executor::operators::scan::{GroupScan, GroupScanMode, ValuesScan};
    use crate::executor::operators::test_support::{rows_of, Fixture};

    fn scan(fx: &Fixture) -> Arc<Operator> {
        Arc::new(Operator::GroupScan(
            GroupScan::new(&fx.schema, fx.group, GroupScanMode::Full).unwrap(),
        ))
    }

    fn sort(
        fx: &Fixture,
        table: crate::core::TableId,
        ordering: SortOrdering,
        option: SortOption,
        algorithm: SortAlgorithm,
    ) -> Vec<i64> {
        let op = Operator::Sort(
            Sort::new(scan(fx), &fx.table_type(table), ordering, option, algorithm).unwrap(),
        );
        fx.run(&op).iter().map(|r| r[0].as_int64().unwrap()).collect()
    }

    #[test]
    fn test_tree_sort_drops_other_types() {
        let fx = Fixture::new();
        let by_name_desc = SortOrdering::new().append(Expression::field(1), false);
        assert_eq!(
            sort(
                &fx,
                fx.customer,
                by_name_desc,
                SortOption::PreserveDuplicates,
                SortAlgorithm::Tree
            ),
            vec![3, 2, 1]
        );
    }

    #[test]
    fn test_insertion_limited() {
        let fx = Fixture::new();
        let by_qty = SortOrdering::new().append(Expression::field(3), true);
        let limited = SortAlgorithm::InsertionLimited { limit: 2 };
        assert_eq!(
            sort(&fx, fx.item, by_qty.clone(), SortOption::PreserveDuplicates, limited),
            vec![110, 100]
        );
        let none = SortAlgorithm::InsertionLimited { limit: 0 };
        assert!(sort(&fx, fx.item, by_qty, SortOption::PreserveDuplicates, none).is_empty());
    }

    #[test]
    fn test_suppress_duplicates_keeps_first() {
        let fx = Fixture::new();
        let by_date = SortOrdering::new().append(Expression::field(2), true);
        for algorithm in [SortAlgorithm::Tree, SortAlgorithm::InsertionLimited { limit: 10 }] {
            assert_eq!(
                sort(
                    &fx,
                    fx.orders,
                    by_date.clone(),
                    SortOption::SuppressDuplicates,
                    algorithm
                ),
                vec![10, 11, 40]
            );
        }
        assert_eq!(
            sort(
                &fx,
                fx.orders,
                by_date,
                SortOption::PreserveDuplicates,
                SortAlgorithm::Tree
            ),
            vec![10, 20, 11, 40]
        );
    }

    #[test]
    fn test_large_limit_falls_back_to_full_sort() {
        let fx = Fixture::with_config(ExecConfig::default().with_max_insertion_sort_limit(1));
        let by_qty_desc = SortOrdering::new().append(Expression::field(3), false);
        assert_eq!(
            sort(
                &fx,
                fx.item,
                by_qty_desc,
                SortOption::PreserveDuplicates,
                SortAlgorithm::InsertionLimited { limit: 3 }
            ),
            vec![400, 200, 101]
        );
    }

    #[test]
    fn test_collated_sort_is_stable() {
        let fx = Fixture::new();
        let rt = RowType::derived("w", vec![DataType::Text]);
        let rows = rows_of(
            &rt,
            ["b", "A", "a", "B"].iter().map(|s| vec![Value::text(*s)]).collect(),
        );
        let input = Arc::new(Operator::ValuesScan(ValuesScan::new(&rt, rows).unwrap()));
        let ordering =
            SortOrdering::new().append_collated(Expression::field(0), true, Collator::CaseInsensitive);
        let op = Operator::Sort(
            Sort::new(
                input,
                &rt,
                ordering,
                SortOption::PreserveDuplicates,
                SortAlgorithm::InsertionLimited { limit: 10 },
            )
            .unwrap(),
        );
        assert_eq!(fx.render(&op), vec!["w[A]", "w[a]", "w[b]", "w[B]"]);
    }

    #[test]
    fn test_sort_validation_and_explain() {
        let fx = Fixture::new();
        let customer = fx.table_type(fx.customer);
        assert!(Sort::new(
            scan(&fx),
            &customer,
            SortOrdering::new(),
            SortOption::PreserveDuplicates,
            SortAlgorithm::Tree
        )
        .unwrap_err()
        .is_plan_error());
        assert!(Sort::new(
            scan(&fx),
            &customer,
            SortOrdering::new().append(Expression::field(5), true),
            SortOption::PreserveDuplicates,
            SortAlgorithm::Tree
        )
        .is_err());

        let op = Sort::new(
            scan(&fx),
            &customer,
            SortOrdering::new().append(Expression::field(1), false),
            SortOption::SuppressDuplicates,
            SortAlgorithm::InsertionLimited { limit: 5 },
        )
        .unwrap();
        assert_eq!(
            op.describe(),
            "Sort_InsertionLimited(limit 5, customer: $1 DESC, SUPPRESS_DUPLICATES)"
        );
    }
}
