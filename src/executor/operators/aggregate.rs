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

//! Aggregate_Partial: streaming aggregation over runs of equal group keys
//!
//! The first `inputs_index` fields of each input row form the group key and
//! every remaining field feeds one aggregator. The input must already be
//! ordered (or at least clustered) on the group key; each run of equal keys
//! becomes one output row.

use std::fmt;
use std::sync::Arc;

use crate::core::{DataType, Error, Result, Row, RowType, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::operator::{Operator, OperatorImpl};

/// Aggregate function applied to one input field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    /// Non-NULL values
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregatorKind {
    fn result_type(&self, input: DataType) -> Result<DataType> {
        match self {
            AggregatorKind::Count => Ok(DataType::Integer),
            AggregatorKind::Min | AggregatorKind::Max => Ok(input),
            AggregatorKind::Sum | AggregatorKind::Avg
                if !input.is_numeric() && input != DataType::Null =>
            {
                Err(Error::invalid_plan(format!("{} over {}", self, input)))
            }
            AggregatorKind::Sum => Ok(input),
            AggregatorKind::Avg => Ok(DataType::Float),
        }
    }
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorKind::Count => write!(f, "COUNT"),
            AggregatorKind::Sum => write!(f, "SUM"),
            AggregatorKind::Min => write!(f, "MIN"),
            AggregatorKind::Max => write!(f, "MAX"),
            AggregatorKind::Avg => write!(f, "AVG"),
        }
    }
}

/// Running state of one aggregator
#[derive(Debug, Clone)]
struct Accumulator {
    kind: AggregatorKind,
    result_type: DataType,
    count: i64,
    /// SUM/MIN/MAX so far, `None` until a non-NULL value arrives
    value: Option<Value>,
    /// AVG running sum
    float_sum: f64,
}

impl Accumulator {
    fn new(kind: AggregatorKind, result_type: DataType) -> Self {
        Self {
            kind,
            result_type,
            count: 0,
            value: None,
            float_sum: 0.0,
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.value = None;
        self.float_sum = 0.0;
    }

    fn add(&mut self, input: &Value) -> Result<()> {
        if input.is_null() {
            return Ok(());
        }
        self.count += 1;
        match self.kind {
            AggregatorKind::Count => {}
            AggregatorKind::Sum => {
                self.value = Some(match self.value.take() {
                    Some(sum) => sum.checked_add(input)?,
                    None => input.clone(),
                });
            }
            AggregatorKind::Min => match &self.value {
                Some(min) if min <= input => {}
                _ => self.value = Some(input.clone()),
            },
            AggregatorKind::Max => match &self.value {
                Some(max) if max >= input => {}
                _ => self.value = Some(input.clone()),
            },
            AggregatorKind::Avg => {
                self.float_sum += input.as_float64().ok_or_else(|| {
                    Error::Type(format!("AVG of non-numeric value {}", input))
                })?;
            }
        }
        Ok(())
    }

    fn result(&self) -> Value {
        match self.kind {
            AggregatorKind::Count => Value::integer(self.count),
            AggregatorKind::Avg if self.count > 0 => {
                Value::float(self.float_sum / self.count as f64)
            }
            AggregatorKind::Avg => Value::null(DataType::Float),
            _ => self
                .value
                .clone()
                .unwrap_or(Value::null(self.result_type)),
        }
    }
}

#[derive(Debug)]
pub struct Aggregate {
    input: Arc<Operator>,
    input_type: Arc<RowType>,
    inputs_index: usize,
    aggregators: Vec<AggregatorKind>,
    output_type: Arc<RowType>,
}

impl Aggregate {
    pub fn new(
        input: Arc<Operator>,
        input_type: &Arc<RowType>,
        inputs_index: usize,
        aggregators: Vec<AggregatorKind>,
    ) -> Result<Self> {
        let fields = input_type.fields();
        if inputs_index > fields.len() || fields.len() - inputs_index != aggregators.len() {
            return Err(Error::invalid_plan(format!(
                "{} has {} fields: {} group-by fields leave room for {} aggregators, not {}",
                input_type,
                fields.len(),
                inputs_index,
                fields.len().saturating_sub(inputs_index),
                aggregators.len()
            )));
        }
        let mut output = fields[..inputs_index].to_vec();
        for (kind, &field) in aggregators.iter().zip(&fields[inputs_index..]) {
            output.push(kind.result_type(field)?);
        }
        Ok(Self {
            input,
            input_type: input_type.clone(),
            inputs_index,
            aggregators,
            output_type: RowType::derived("aggregate", output),
        })
    }
}

impl OperatorImpl for Aggregate {
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
        let aggs: Vec<String> = self.aggregators.iter().map(|a| a.to_string()).collect();
        format!(
            "Aggregate_Partial({}, group by {}: {})",
            self.input_type,
            self.inputs_index,
            aggs.join(", ")
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let accumulators = self
            .aggregators
            .iter()
            .zip(&self.output_type.fields()[self.inputs_index..])
            .map(|(&kind, &result_type)| Accumulator::new(kind, result_type))
            .collect();
        let cursor = AggregateCursor {
            input: self.input.cursor(ctx, bindings)?,
            input_type: self.input_type.clone(),
            output_type: self.output_type.clone(),
            inputs_index: self.inputs_index,
            accumulators,
            group: None,
            emitted: false,
            input_done: false,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct AggregateCursor {
    input: Box<dyn Cursor>,
    input_type: Arc<RowType>,
    output_type: Arc<RowType>,
    inputs_index: usize,
    accumulators: Vec<Accumulator>,
    /// Key of the run being accumulated
    group: Option<Vec<Value>>,
    /// At least one aggregate row was produced
    emitted: bool,
    input_done: bool,
}

impl AggregateCursor {
    fn accumulate(&mut self, row: &Row) -> Result<()> {
        for (acc, value) in self
            .accumulators
            .iter_mut()
            .zip(&row.values()[self.inputs_index..])
        {
            acc.add(value)?;
        }
        Ok(())
    }

    /// Output row for the current run, resetting the accumulators
    fn finish(&mut self, key: Vec<Value>) -> Row {
        let mut values = key;
        values.extend(self.accumulators.iter().map(Accumulator::result));
        for acc in &mut self.accumulators {
            acc.reset();
        }
        self.emitted = true;
        Row::from_parts(self.output_type.clone(), values.into(), None)
    }
}

impl CursorImpl for AggregateCursor {
    const NAME: &'static str = "Aggregate_Partial";

    fn open(&mut self) -> Result<()> {
        self.group = None;
        self.emitted = false;
        self.input_done = false;
        for acc in &mut self.accumulators {
            acc.reset();
        }
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if self.input_done {
            return Ok(None);
        }
        while let Some(row) = self.input.next()? {
            if !row.is_type(&self.input_type) {
                return Ok(Some(row));
            }
            let key = &row.values()[..self.inputs_index];
            match self.group.take() {
                Some(group) if group.as_slice() == key => {
                    self.group = Some(group);
                    self.accumulate(&row)?;
                }
                Some(group) => {
                    let finished = self.finish(group);
                    self.group = Some(key.to_vec());
                    self.accumulate(&row)?;
                    return Ok(Some(finished));
                }
                None => {
                    self.group = Some(key.to_vec());
                    self.accumulate(&row)?;
                }
            }
        }
        self.input_done = true;
        match self.group.take() {
            Some(group) => Ok(Some(self.finish(group))),
            // identity row for a global aggregate over no rows
            None if self.inputs_index == 0 && !self.emitted => Ok(Some(self.finish(Vec::new()))),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.group = None;
        self.input.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.input.destroy()
    }
}
