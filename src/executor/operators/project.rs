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

//! Project: computes output fields for rows of one input type
//!
//! The cursor reuses its previous output buffer when the consumer has let
//! go of that row. Ownership decides: [`Row::recycle_values`] only hands out
//! the buffer while the cursor holds the last reference, so a row anybody
//! else still holds is never overwritten.

use std::sync::Arc;

use crate::core::{Result, Row, RowType, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::expression::Expression;
use crate::executor::operator::{Operator, OperatorImpl};

#[derive(Debug)]
pub struct Project {
    input: Arc<Operator>,
    input_type: Arc<RowType>,
    expressions: Vec<Expression>,
    output_type: Arc<RowType>,
}

impl Project {
    pub fn new(
        input: Arc<Operator>,
        input_type: &Arc<RowType>,
        expressions: Vec<Expression>,
    ) -> Result<Self> {
        let fields = expressions
            .iter()
            .map(|e| e.result_type(Some(&**input_type)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            input,
            input_type: input_type.clone(),
            output_type: RowType::projected(input_type, fields),
            expressions,
        })
    }
}

impl OperatorImpl for Project {
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
        let exprs: Vec<String> = self.expressions.iter().map(|e| e.to_string()).collect();
        format!("Project({}: {})", self.input_type, exprs.join(", "))
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = ProjectCursor {
            input: self.input.cursor(ctx, bindings)?,
            input_type: self.input_type.clone(),
            expressions: self.expressions.clone(),
            output_type: self.output_type.clone(),
            bindings: bindings.clone(),
            last: None,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct ProjectCursor {
    input: Box<dyn Cursor>,
    input_type: Arc<RowType>,
    expressions: Vec<Expression>,
    output_type: Arc<RowType>,
    bindings: QueryBindings,
    /// Most recent output row, a candidate for buffer reuse
    last: Option<Row>,
}

impl ProjectCursor {
    fn project(&mut self, row: &Row) -> Result<Row> {
        if let Some(mut previous) = self.last.take() {
            if let Some(buffer) = previous.recycle_values() {
                for (slot, expression) in buffer.iter_mut().zip(&self.expressions) {
                    *slot = expression.eval(Some(row), &self.bindings)?;
                }
                previous.set_hkey_arc(row.hkey_arc().cloned());
                self.last = Some(previous.clone());
                return Ok(previous);
            }
        }
        let values = self
            .expressions
            .iter()
            .map(|e| e.eval(Some(row), &self.bindings))
            .collect::<Result<Vec<Value>>>()?;
        let projected = Row::from_parts(
            self.output_type.clone(),
            values.into(),
            row.hkey_arc().cloned(),
        );
        self.last = Some(projected.clone());
        Ok(projected)
    }
}

impl CursorImpl for ProjectCursor {
    const NAME: &'static str = "Project";

    fn open(&mut self) -> Result<()> {
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        match self.input.next()? {
            Some(row) if row.is_type(&self.input_type) => self.project(&row).map(Some),
            other => Ok(other),
        }
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
