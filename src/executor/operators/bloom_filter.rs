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

//! Bloom-filter semi-join
//!
//! `Using_BloomFilter` drains a filter input when it opens, hashes a
//! projection of each row into a [`BloomFilter`], binds the filter and then
//! streams its main input. Somewhere below, `Select_BloomFilter` probes the
//! bound filter with the same projection of its own rows:
//!
//! 1. A negative probe drops the row without touching storage
//! 2. A positive probe binds the row and runs the exact `on_positive` plan
//! 3. The row is emitted iff that plan produces at least one row
//!
//! Keys are hashed with [`hash_keys`](crate::common::hash_keys) after
//! collation, so both sides must use the same expressions and collators.

use std::sync::Arc;

use crate::common::BloomFilter;
use crate::core::{Error, Result, Row, RowType, Value};
use crate::executor::bindings::QueryBindings;
use crate::executor::context::QueryContext;
use crate::executor::cursor::{Cursor, CursorImpl, ManagedCursor};
use crate::executor::expression::Expression;
use crate::executor::operator::{Operator, OperatorImpl};
use crate::executor::ordering::Collator;

/// Key tuple of `row`, collated
fn filter_key(
    row: &Row,
    fields: &[Expression],
    collators: &[Option<Collator>],
    bindings: &QueryBindings,
) -> Result<Vec<Value>> {
    fields
        .iter()
        .zip(collators)
        .map(|(field, collator)| {
            let value = field.eval(Some(row), bindings)?;
            Ok(match collator {
                Some(c) => c.normalize(value),
                None => value,
            })
        })
        .collect()
}

fn check_collators(fields: &[Expression], collators: &[Option<Collator>]) -> Result<()> {
    if fields.is_empty() {
        return Err(Error::invalid_plan("bloom filter over no fields"));
    }
    if fields.len() != collators.len() {
        return Err(Error::invalid_plan(format!(
            "bloom filter has {} fields but {} collators",
            fields.len(),
            collators.len()
        )));
    }
    Ok(())
}

fn render_fields(fields: &[Expression]) -> String {
    let rendered: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    rendered.join(", ")
}

// ============================================================================
// Using_BloomFilter
// ============================================================================

#[derive(Debug)]
pub struct UsingBloomFilter {
    filter_input: Arc<Operator>,
    filter_type: Arc<RowType>,
    estimated_count: usize,
    binding: usize,
    fields: Vec<Expression>,
    collators: Vec<Option<Collator>>,
    input: Arc<Operator>,
}

impl UsingBloomFilter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        filter_input: Arc<Operator>,
        filter_type: &Arc<RowType>,
        estimated_count: usize,
        binding: usize,
        fields: Vec<Expression>,
        collators: Vec<Option<Collator>>,
        input: Arc<Operator>,
    ) -> Result<Self> {
        check_collators(&fields, &collators)?;
        for field in &fields {
            field.result_type(Some(&**filter_type))?;
        }
        Ok(Self {
            filter_input,
            filter_type: filter_type.clone(),
            estimated_count,
            binding,
            fields,
            collators,
            input,
        })
    }
}

impl OperatorImpl for UsingBloomFilter {
    fn row_type(&self) -> Option<Arc<RowType>> {
        self.input.row_type()
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.filter_input, &self.input]
    }

    fn describe(&self) -> String {
        format!(
            "Using_BloomFilter({}: {} -> bound[{}], ~{} rows)",
            self.filter_type,
            render_fields(&self.fields),
            self.binding,
            self.estimated_count
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = UsingBloomFilterCursor {
            filter_input: self.filter_input.cursor(ctx, bindings)?,
            input: self.input.cursor(ctx, bindings)?,
            filter_type: self.filter_type.clone(),
            estimated_count: self.estimated_count,
            false_positive_rate: ctx.config().bloom_false_positive_rate,
            binding: self.binding,
            fields: self.fields.clone(),
            collators: self.collators.clone(),
            bindings: bindings.clone(),
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct UsingBloomFilterCursor {
    filter_input: Box<dyn Cursor>,
    input: Box<dyn Cursor>,
    filter_type: Arc<RowType>,
    estimated_count: usize,
    false_positive_rate: f64,
    binding: usize,
    fields: Vec<Expression>,
    collators: Vec<Option<Collator>>,
    bindings: QueryBindings,
}

impl UsingBloomFilterCursor {
    fn build_filter(&mut self) -> Result<BloomFilter> {
        let mut filter = BloomFilter::new(self.estimated_count, self.false_positive_rate);
        self.filter_input.open()?;
        while let Some(row) = self.filter_input.next()? {
            if row.is_type(&self.filter_type) {
                let key = filter_key(&row, &self.fields, &self.collators, &self.bindings)?;
                filter.insert_keys(&key);
            }
        }
        tracing::debug!(
            keys = filter.len(),
            bytes = filter.memory_bytes(),
            "bloom filter built"
        );
        Ok(filter)
    }
}

impl CursorImpl for UsingBloomFilterCursor {
    const NAME: &'static str = "Using_BloomFilter";

    fn open(&mut self) -> Result<()> {
        let filter = self.build_filter()?;
        self.bindings
            .set_bloom_filter(self.binding, Arc::new(filter));
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        self.input.next()
    }

    fn close(&mut self) -> Result<()> {
        self.filter_input.close()?;
        self.input.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.filter_input.destroy()?;
        self.input.destroy()
    }
}

// ============================================================================
// Select_BloomFilter
// ============================================================================

#[derive(Debug)]
pub struct SelectBloomFilter {
    input: Arc<Operator>,
    on_positive: Arc<Operator>,
    fields: Vec<Expression>,
    collators: Vec<Option<Collator>>,
    filter_binding: usize,
    row_binding: usize,
}

impl SelectBloomFilter {
    pub fn new(
        input: Arc<Operator>,
        on_positive: Arc<Operator>,
        fields: Vec<Expression>,
        collators: Vec<Option<Collator>>,
        filter_binding: usize,
        row_binding: usize,
    ) -> Result<Self> {
        check_collators(&fields, &collators)?;
        if filter_binding == row_binding {
            return Err(Error::invalid_plan(
                "bloom filter and probe row share a binding",
            ));
        }
        Ok(Self {
            input,
            on_positive,
            fields,
            collators,
            filter_binding,
            row_binding,
        })
    }
}

impl OperatorImpl for SelectBloomFilter {
    fn row_type(&self) -> Option<Arc<RowType>> {
        self.input.row_type()
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        vec![&self.input, &self.on_positive]
    }

    fn describe(&self) -> String {
        format!(
            "Select_BloomFilter({} in bound[{}], row -> bound[{}])",
            render_fields(&self.fields),
            self.filter_binding,
            self.row_binding
        )
    }

    fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        let cursor = SelectBloomFilterCursor {
            input: self.input.cursor(ctx, bindings)?,
            on_positive: self.on_positive.cursor(ctx, bindings)?,
            fields: self.fields.clone(),
            collators: self.collators.clone(),
            filter_binding: self.filter_binding,
            row_binding: self.row_binding,
            bindings: bindings.clone(),
            filter: None,
            rows_checked: 0,
            rows_passed: 0,
        };
        Ok(ManagedCursor::boxed(cursor, ctx))
    }
}

struct SelectBloomFilterCursor {
    input: Box<dyn Cursor>,
    on_positive: Box<dyn Cursor>,
    fields: Vec<Expression>,
    collators: Vec<Option<Collator>>,
    filter_binding: usize,
    row_binding: usize,
    bindings: QueryBindings,
    filter: Option<Arc<BloomFilter>>,
    rows_checked: u64,
    rows_passed: u64,
}

impl SelectBloomFilterCursor {
    /// Run the exact check for a row that passed the filter
    fn confirm(&mut self, row: &Row) -> Result<bool> {
        self.bindings.set_row(self.row_binding, row.clone());
        self.on_positive.open()?;
        let found = self.on_positive.next()?.is_some();
        self.on_positive.close()?;
        Ok(found)
    }
}

impl CursorImpl for SelectBloomFilterCursor {
    const NAME: &'static str = "Select_BloomFilter";

    fn open(&mut self) -> Result<()> {
        self.filter = Some(self.bindings.get_bloom_filter(self.filter_binding)?);
        self.rows_checked = 0;
        self.rows_passed = 0;
        self.input.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let Some(filter) = self.filter.clone() else {
            return Err(Error::internal("bloom filter probed before open"));
        };
        while let Some(row) = self.input.next()? {
            self.rows_checked += 1;
            let key = filter_key(&row, &self.fields, &self.collators, &self.bindings)?;
            // NULL keys skip the filter and go straight to the exact check
            let has_null = key.iter().any(Value::is_null);
            if !has_null && !filter.might_contain_keys(&key) {
                continue;
            }
            if self.confirm(&row)? {
                self.rows_passed += 1;
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        if self.rows_checked > 0 {
            tracing::debug!(
                checked = self.rows_checked,
                passed = self.rows_passed,
                selectivity = self.rows_passed as f64 / self.rows_checked as f64,
                "bloom filter probe finished"
            );
        }
        self.rows_checked = 0;
        self.rows_passed = 0;
        self.filter = None;
        self.on_positive.close()?;
        self.input.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        self.on_positive.destroy()?;
        self.input.destroy()
    }
}
