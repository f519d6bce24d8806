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

//! Distinct_Partial: drops rows equal to the previous row of the same type

use std::sync::Arc;

use crate::core::{Result, Row, RowType};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

/// Removes consecutive duplicates among rows of `distinct_type`
///
/// Only adjacent duplicates are detected, so full de-duplication needs an
/// input sorted on every field.
#[derive(Debug)]
pub struct Distinct {
    input: Arc<Operator>,
    distinct_type: Arc<RowType>,
}

impl Distinct {
    pub fn new(input: Arc<Operator>, distinct_type: &Arc<RowType>) -> Result<Self> {
        Ok(Self {
            input,
            distinct_type: distinct_type.clone(),
        })
    }
}

impl OperatorImpl for Distinct {
    fn row_type(&self) -> Option<Arc<RowType>> {
        self.input.row_type()
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!("Distinct_Partial({})", self.distinct_type)
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = DistinctCursor {
            input: self.input.cursor(ctx, bindings)?,
            distinct_type: self.distinct_type.clone(),
            previous: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct DistinctCursor {
    input: Box<dyn Cursor>,
    distinct_type: Arc<RowType>,
    previous: Option<Row>,
}

impl CursorImpl for DistinctCursor {
    const NAME: &'static str = "Distinct_Partial";

    fn open(&mut self) -> Result<()> {
        self.previous = None;
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.input.next()? {
            if !row.is_type(&self.distinct_type) {
                return Ok(Some(row));
            }
            if self
                .previous
                .as_ref()
                .is_some_and(|p| p.values() == row.values())
            {
                continue;
            }
            self.previous = Some(row.clone());
            return Ok(Some(row));
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.previous = None;
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
    use crate::core::{DataType, Value};
    use crate::executor::operators::scan::ValuesScan;
    use crate::executor::operators::test_support::{rows_of, Fixture};

    #[test]
    fn test_consecutive_duplicates_removed() {
        let fx = Fixture::new();
        let rt = RowType::derived("p", vec![DataType::Integer, DataType::Text]);
        let i = Value::integer;
        let t = Value::text;
        let rows = rows_of(
            &rt,
            vec![
                vec![i(1), t("a")],
                vec![i(1), t("a")],
                vec![i(1), t("b")],
                vec![i(2), t("b")],
                vec![i(2), t("b")],
                vec![i(1), t("a")],
            ],
        );
        let input = Arc::new(Operator::ValuesScan(ValuesScan::new(&rt, rows).unwrap()));
        let op = Operator::Distinct(Distinct::new(input, &rt).unwrap());
        assert_eq!(
            fx.render(&op),
            vec!["p[1, a]", "p[1, b]", "p[2, b]", "p[1, a]"]
        );
    }

    #[test]
    fn test_integer_and_float_are_equal() {
        let fx = Fixture::new();
        let rt = RowType::derived("n", vec![DataType::Float]);
        let rows = rows_of(
            &rt,
            vec![vec![Value::integer(3)], vec![Value::float(3.0)], vec![Value::float(3.5)]],
        );
        let input = Arc::new(Operator::ValuesScan(ValuesScan::new(&rt, rows).unwrap()));
        let op = Operator::Distinct(Distinct::new(input, &rt).unwrap());
        assert_eq!(fx.run(&op).len(), 2);
    }
}
