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

//! Plan operators
//!
//! An [`Operator`] is an immutable, shareable plan node. It declares its
//! output row type, its inputs and the row types it creates, and it
//! produces a fresh [`Cursor`] for each execution. Operators never hold
//! per-execution state, so one plan can run any number of times, also
//! concurrently with different contexts.
//!
//! ```text
//! ┌──────────────┐
//! │ Consumer     │ ← pulls rows via Cursor::next()
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ Flatten      │ ← combines parent/child rows of one stream
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ GroupScan    │ ← hkey-ordered rows from storage
//! └──────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use crate::core::{Result, RowType};

use super::bindings::QueryBindings;
use super::context::QueryContext;
use super::cursor::Cursor;
use super::operators::{
    Aggregate, AncestorLookup, BranchLookup, Distinct, Filter, Flatten, GroupScan, HKeyUnion,
    IndexScan, Intersect, Limit, MapNestedLoops, ProductNestedLoops, Project, Select,
    SelectBloomFilter, Sort, Union, UnionAll, UsingBloomFilter, ValuesScan,
};

/// Behavior shared by every operator kind
pub(crate) trait OperatorImpl {
    /// Output row type, when the operator emits a single type
    fn row_type(&self) -> Option<Arc<RowType>>;

    /// Input operators, outer first
    fn children(&self) -> Vec<&Arc<Operator>>;

    /// Row type this operator creates, if any
    fn derived_type(&self) -> Option<&Arc<RowType>> {
        None
    }

    /// True if cursors of this operator implement `jump`
    fn supports_jump(&self) -> bool {
        false
    }

    /// One-line description for explain output
    fn describe(&self) -> String;

    fn cursor(&self, ctx: &Arc<QueryContext>, bindings: &QueryBindings)
        -> Result<Box<dyn Cursor>>;
}

/// A node of a physical plan
#[derive(Debug)]
pub enum Operator {
    GroupScan(GroupScan),
    IndexScan(IndexScan),
    ValuesScan(ValuesScan),
    AncestorLookup(AncestorLookup),
    BranchLookup(BranchLookup),
    Flatten(Flatten),
    Select(Select),
    Filter(Filter),
    Project(Project),
    MapNestedLoops(MapNestedLoops),
    ProductNestedLoops(ProductNestedLoops),
    Intersect(Intersect),
    Union(Union),
    HKeyUnion(HKeyUnion),
    UnionAll(UnionAll),
    Limit(Limit),
    Distinct(Distinct),
    Sort(Sort),
    Aggregate(Aggregate),
    UsingBloomFilter(UsingBloomFilter),
    SelectBloomFilter(SelectBloomFilter),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Operator::GroupScan($op) => $body,
            Operator::IndexScan($op) => $body,
            Operator::ValuesScan($op) => $body,
            Operator::AncestorLookup($op) => $body,
            Operator::BranchLookup($op) => $body,
            Operator::Flatten($op) => $body,
            Operator::Select($op) => $body,
            Operator::Filter($op) => $body,
            Operator::Project($op) => $body,
            Operator::MapNestedLoops($op) => $body,
            Operator::ProductNestedLoops($op) => $body,
            Operator::Intersect($op) => $body,
            Operator::Union($op) => $body,
            Operator::HKeyUnion($op) => $body,
            Operator::UnionAll($op) => $body,
            Operator::Limit($op) => $body,
            Operator::Distinct($op) => $body,
            Operator::Sort($op) => $body,
            Operator::Aggregate($op) => $body,
            Operator::UsingBloomFilter($op) => $body,
            Operator::SelectBloomFilter($op) => $body,
        }
    };
}

impl Operator {
    /// Operator kind name
    pub fn name(&self) -> &'static str {
        match self {
            Operator::GroupScan(_) => "GroupScan",
            Operator::IndexScan(_) => "IndexScan",
            Operator::ValuesScan(_) => "ValuesScan",
            Operator::AncestorLookup(_) => "AncestorLookup",
            Operator::BranchLookup(_) => "BranchLookup",
            Operator::Flatten(_) => "Flatten",
            Operator::Select(_) => "Select_HKeyOrdered",
            Operator::Filter(_) => "Filter_Default",
            Operator::Project(_) => "Project",
            Operator::MapNestedLoops(_) => "Map_NestedLoops",
            Operator::ProductNestedLoops(_) => "Product_NestedLoops",
            Operator::Intersect(_) => "Intersect_Ordered",
            Operator::Union(_) => "Union_Ordered",
            Operator::HKeyUnion(_) => "HKeyUnion_Ordered",
            Operator::UnionAll(_) => "UnionAll",
            Operator::Limit(_) => "Limit",
            Operator::Distinct(_) => "Distinct_Partial",
            Operator::Sort(_) => "Sort",
            Operator::Aggregate(_) => "Aggregate_Partial",
            Operator::UsingBloomFilter(_) => "Using_BloomFilter",
            Operator::SelectBloomFilter(_) => "Select_BloomFilter",
        }
    }

    /// Output row type, or `None` if the operator emits several types
    pub fn row_type(&self) -> Option<Arc<RowType>> {
        dispatch!(self, op => op.row_type())
    }

    /// Input operators, outer first
    pub fn children(&self) -> Vec<&Arc<Operator>> {
        dispatch!(self, op => op.children())
    }

    /// Add every row type created by this plan (this node and its inputs)
    /// to `types`, without duplicates
    pub fn derived_types(&self, types: &mut Vec<Arc<RowType>>) {
        for child in self.children() {
            child.derived_types(types);
        }
        if let Some(own) = dispatch!(self, op => op.derived_type()) {
            if !types.iter().any(|t| RowType::same(t, own)) {
                types.push(own.clone());
            }
        }
    }

    /// True if cursors of this operator support `jump`
    pub fn supports_jump(&self) -> bool {
        dispatch!(self, op => op.supports_jump())
    }

    /// Create an idle cursor for one execution
    pub fn cursor(
        &self,
        ctx: &Arc<QueryContext>,
        bindings: &QueryBindings,
    ) -> Result<Box<dyn Cursor>> {
        dispatch!(self, op => op.cursor(ctx, bindings))
    }

    /// One-line description of this node
    pub fn describe(&self) -> String {
        dispatch!(self, op => op.describe())
    }

    fn explain(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.describe(), indent = depth * 2)?;
        for child in self.children() {
            child.explain(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented plan tree, one node per line
impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.explain(f, 0)
    }
}
