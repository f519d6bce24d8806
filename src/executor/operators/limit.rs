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

//! Limit: skip and limit counts over the rows of the input

use std::fmt;
use std::sync::Arc;

use crate::core::{Error, Result, Row, RowType};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

/// A row count fixed in the plan or read from a binding at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitCount {
    Constant(u64),
    Binding(usize),
    Unlimited,
}

impl LimitCount {
    /// Resolve to a count, `None` meaning unlimited
    fn resolve(&self, bindings: &QueryBindings) -> Result<Option<u64>> {
        match *self {
            LimitCount::Constant(n) => Ok(Some(n)),
            LimitCount::Unlimited => Ok(None),
            LimitCount::Binding(position) => {
                let value = bindings.get_value(position)?;
                if value.is_null() {
                    return Ok(None);
                }
                match value.as_int64() {
                    Some(n) if n >= 0 => Ok(Some(n as u64)),
                    _ => Err(Error::invalid_argument(format!(
                        "row count must be a non-negative integer, got {}",
                        value
                    ))),
                }
            }
        }
    }
}

impl fmt::Display for LimitCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitCount::Constant(n) => write!(f, "{}", n),
            LimitCount::Binding(position) => write!(f, "bound[{}]", position),
            LimitCount::Unlimited => write!(f, "ALL"),
        }
    }
}

#[derive(Debug)]
pub struct Limit {
    input: Arc<Operator>,
    skip: LimitCount,
    limit: LimitCount,
}

impl Limit {
    pub fn new(input: Arc<Operator>, skip: LimitCount, limit: LimitCount) -> Result<Self> {
        if skip == LimitCount::Unlimited {
            return Err(Error::invalid_plan("skip count cannot be unlimited"));
        }
        Ok(Self { input, skip, limit })
    }
}

impl OperatorImpl for Limit {
    fn row_type(&self) -> Option<Arc<RowType>> {
        self.input.row_type()
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!("Limit(skip {}, limit {})", self.skip, self.limit)
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = LimitCursor {
            input: self.input.cursor(ctx, bindings)?,
            bindings: bindings.clone(),
            skip: self.skip,
            limit: self.limit,
            to_skip: 0,
            remaining: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct LimitCursor {
    input: Box<dyn Cursor>,
    bindings: QueryBindings,
    skip: LimitCount,
    limit: LimitCount,
    to_skip: u64,
    /// Rows still to emit, `None` for unlimited
    remaining: Option<u64>,
}

impl CursorImpl for LimitCursor {
    const NAME: &'static str = "Limit";

    fn open(&mut self) -> Result<()> {
        self.to_skip = self.skip.resolve(&self.bindings)?.unwrap_or(0);
        self.remaining = self.limit.resolve(&self.bindings)?;
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        while let Some(row) = self.input.next()? {
            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(Some(row));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use crate::executor::operators::scan::ValuesScan;
    use crate::executor::operators::test_support::{rows_of, Fixture};

    fn numbers(n: i64) -> Arc<Operator> {
        let rt = RowType::derived("n", vec![DataType::Integer]);
        let rows = rows_of(&rt, (1..=n).map(|i| vec![Value::integer(i)]).collect());
        Arc::new(Operator::ValuesScan(ValuesScan::new(&rt, rows).unwrap()))
    }

    fn run(fx: &Fixture, skip: LimitCount, limit: LimitCount) -> Vec<i64> {
        let op = Operator::Limit(Limit::new(numbers(6), skip, limit).unwrap());
        fx.run(&op).iter().map(|r| r[0].as_int64().unwrap()).collect()
    }

    #[test]
    fn test_constant_skip_and_limit() {
        let fx = Fixture::new();
        assert_eq!(run(&fx, LimitCount::Constant(0), LimitCount::Constant(2)), vec![1, 2]);
        assert_eq!(run(&fx, LimitCount::Constant(4), LimitCount::Unlimited), vec![5, 6]);
        assert_eq!(run(&fx, LimitCount::Constant(2), LimitCount::Constant(3)), vec![3, 4, 5]);
        assert!(run(&fx, LimitCount::Constant(0), LimitCount::Constant(0)).is_empty());
        assert!(run(&fx, LimitCount::Constant(10), LimitCount::Constant(1)).is_empty());
    }

    #[test]
    fn test_bound_counts() {
        let fx = Fixture::new();
        fx.bindings.set_value(0, Value::integer(1));
        fx.bindings.set_value(1, Value::integer(2));
        assert_eq!(run(&fx, LimitCount::Binding(0), LimitCount::Binding(1)), vec![2, 3]);

        fx.bindings.set_value(1, Value::integer(-1));
        let op = Operator::Limit(
            Limit::new(numbers(3), LimitCount::Constant(0), LimitCount::Binding(1)).unwrap(),
        );
        assert!(matches!(fx.try_run(&op), Err(Error::InvalidArgument(_))));

        let unset = Operator::Limit(
            Limit::new(numbers(3), LimitCount::Binding(5), LimitCount::Unlimited).unwrap(),
        );
        assert!(fx.try_run(&unset).unwrap_err().is_binding_error());
    }

    #[test]
    fn test_limit_stops_pulling_input() {
        let fx = Fixture::with_config(crate::executor::config::ExecConfig::instrumented());
        let op = Operator::Limit(
            Limit::new(numbers(100), LimitCount::Constant(0), LimitCount::Constant(3)).unwrap(),
        );
        assert_eq!(fx.run(&op).len(), 3);
        assert_eq!(fx.ctx.stats().unwrap().operator("ValuesScan").rows, 3);
        assert!(Limit::new(numbers(1), LimitCount::Unlimited, LimitCount::Unlimited).is_err());
        assert_eq!(op.describe(), "Limit(skip 0, limit 3)");
    }
}
