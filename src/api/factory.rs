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

//! Operator factories
//!
//! Names follow the operator kinds they build: `<kind>_<variant>`.

use std::sync::Arc;

use crate::core::{GroupId, IndexId, Result, Row, RowType, Schema};
use crate::executor::expression::Expression;
use crate::executor::operator::Operator;
use crate::executor::operators::{
    Aggregate, AggregatorKind, AncestorLookup, BranchLookup, Distinct, Filter, Flatten,
    GroupScan, GroupScanMode, HKeyUnion, IndexScan, IndexScanRange, Intersect, Limit,
    LimitCount, MapNestedLoops, ProductNestedLoops, Project, Select, SelectBloomFilter, Sort,
    SortAlgorithm, Union, UnionAll, UsingBloomFilter, ValuesScan,
};
use crate::executor::ordering::{Collator, SortOrdering};

use super::options::{FlattenOptions, IntersectOptions, JoinType, LookupOption, SortOption};

// ============================================================================
// Scans
// ============================================================================

/// Every row of `group` in hkey order
pub fn group_scan_default(schema: &Schema, group: GroupId) -> Result<Arc<Operator>> {
    let scan = GroupScan::new(schema, group, GroupScanMode::Full)?;
    Ok(Arc::new(Operator::GroupScan(scan)))
}

/// Rows of `group` reachable from the hkey bound at `binding`
pub fn group_scan_positional(
    schema: &Schema,
    group: GroupId,
    binding: usize,
    depth: Option<usize>,
    deep: bool,
) -> Result<Arc<Operator>> {
    let mode = GroupScanMode::Positional {
        binding,
        depth,
        deep,
    };
    Ok(Arc::new(Operator::GroupScan(GroupScan::new(schema, group, mode)?)))
}

/// Index rows in `range`; `ascending` orders the leading index fields
pub fn index_scan_default(
    schema: &Schema,
    index: IndexId,
    range: IndexScanRange,
    ascending: Vec<bool>,
) -> Result<Arc<Operator>> {
    let scan = IndexScan::new(schema, index, range, ascending)?;
    Ok(Arc::new(Operator::IndexScan(scan)))
}

pub fn values_scan_default(row_type: &Arc<RowType>, rows: Vec<Row>) -> Result<Arc<Operator>> {
    Ok(Arc::new(Operator::ValuesScan(ValuesScan::new(row_type, rows)?)))
}

// ============================================================================
// Hierarchy
// ============================================================================

pub fn ancestor_lookup_default(
    input: Arc<Operator>,
    source_type: &Arc<RowType>,
    ancestors: Vec<Arc<RowType>>,
    option: LookupOption,
) -> Result<Arc<Operator>> {
    let lookup = AncestorLookup::new(input, source_type, ancestors, option)?;
    Ok(Arc::new(Operator::AncestorLookup(lookup)))
}

/// Ancestor lookup driven by the row or hkey bound at `binding`
pub fn ancestor_lookup_nested(
    binding: usize,
    source_type: &Arc<RowType>,
    ancestors: Vec<Arc<RowType>>,
    option: LookupOption,
) -> Result<Arc<Operator>> {
    let lookup = AncestorLookup::nested(binding, source_type, ancestors, option)?;
    Ok(Arc::new(Operator::AncestorLookup(lookup)))
}

pub fn branch_lookup_default(
    input: Arc<Operator>,
    source_type: &Arc<RowType>,
    output_type: &Arc<RowType>,
    option: LookupOption,
) -> Result<Arc<Operator>> {
    let lookup = BranchLookup::new(input, source_type, output_type, option)?;
    Ok(Arc::new(Operator::BranchLookup(lookup)))
}

pub fn branch_lookup_nested(
    binding: usize,
    source_type: &Arc<RowType>,
    output_type: &Arc<RowType>,
    option: LookupOption,
) -> Result<Arc<Operator>> {
    let lookup = BranchLookup::nested(binding, source_type, output_type, option)?;
    Ok(Arc::new(Operator::BranchLookup(lookup)))
}

pub fn flatten_hkey_ordered(
    input: Arc<Operator>,
    parent_type: &Arc<RowType>,
    child_type: &Arc<RowType>,
    join: JoinType,
    options: FlattenOptions,
) -> Result<Arc<Operator>> {
    let flatten = Flatten::new(input, parent_type, child_type, join, options)?;
    Ok(Arc::new(Operator::Flatten(flatten)))
}

// ============================================================================
// Filtering and shaping
// ============================================================================

pub fn select_hkey_ordered(
    input: Arc<Operator>,
    predicate_type: &Arc<RowType>,
    predicate: Expression,
) -> Result<Arc<Operator>> {
    let select = Select::new(input, predicate_type, predicate)?;
    Ok(Arc::new(Operator::Select(select)))
}

/// Keep only rows of the listed types
pub fn filter_default(
    input: Arc<Operator>,
    keep_types: Vec<Arc<RowType>>,
) -> Result<Arc<Operator>> {
    Ok(Arc::new(Operator::Filter(Filter::new(input, keep_types)?)))
}

pub fn project_default(
    input: Arc<Operator>,
    input_type: &Arc<RowType>,
    expressions: Vec<Expression>,
) -> Result<Arc<Operator>> {
    let project = Project::new(input, input_type, expressions)?;
    Ok(Arc::new(Operator::Project(project)))
}

/// First `limit` rows
pub fn limit_default(input: Arc<Operator>, limit: u64) -> Result<Arc<Operator>> {
    limit_skip(input, LimitCount::Constant(0), LimitCount::Constant(limit))
}

/// Rows after the first `skip`, at most `limit` of them
pub fn limit_skip(
    input: Arc<Operator>,
    skip: LimitCount,
    limit: LimitCount,
) -> Result<Arc<Operator>> {
    Ok(Arc::new(Operator::Limit(Limit::new(input, skip, limit)?)))
}

pub fn distinct_partial(
    input: Arc<Operator>,
    distinct_type: &Arc<RowType>,
) -> Result<Arc<Operator>> {
    Ok(Arc::new(Operator::Distinct(Distinct::new(input, distinct_type)?)))
}

/// Sort keeping at most `limit` rows
pub fn sort_insertion_limited(
    input: Arc<Operator>,
    sort_type: &Arc<RowType>,
    ordering: SortOrdering,
    option: SortOption,
    limit: usize,
) -> Result<Arc<Operator>> {
    let algorithm = SortAlgorithm::InsertionLimited { limit };
    let sort = Sort::new(input, sort_type, ordering, option, algorithm)?;
    Ok(Arc::new(Operator::Sort(sort)))
}

pub fn sort_tree(
    input: Arc<Operator>,
    sort_type: &Arc<RowType>,
    ordering: SortOrdering,
    option: SortOption,
) -> Result<Arc<Operator>> {
    let sort = Sort::new(input, sort_type, ordering, option, SortAlgorithm::Tree)?;
    Ok(Arc::new(Operator::Sort(sort)))
}

/// Empty ordering to append sort keys to
pub fn ordering() -> SortOrdering {
    SortOrdering::new()
}

/// Aggregate the fields after the first `inputs_index` grouping fields
pub fn aggregate_partial(
    input: Arc<Operator>,
    input_type: &Arc<RowType>,
    inputs_index: usize,
    aggregators: Vec<AggregatorKind>,
) -> Result<Arc<Operator>> {
    let aggregate = Aggregate::new(input, input_type, inputs_index, aggregators)?;
    Ok(Arc::new(Operator::Aggregate(aggregate)))
}

// ============================================================================
// Combination
// ============================================================================

/// Run `inner` once per outer row, with the row bound at `binding`
pub fn map_nested_loops(
    outer: Arc<Operator>,
    inner: Arc<Operator>,
    binding: usize,
) -> Result<Arc<Operator>> {
    let map = MapNestedLoops::new(outer, inner, binding)?;
    Ok(Arc::new(Operator::MapNestedLoops(map)))
}

pub fn product_nested_loops(
    outer: Arc<Operator>,
    inner: Arc<Operator>,
    outer_type: &Arc<RowType>,
    inner_type: &Arc<RowType>,
    binding: usize,
) -> Result<Arc<Operator>> {
    let product = ProductNestedLoops::new(outer, inner, outer_type, inner_type, binding)?;
    Ok(Arc::new(Operator::ProductNestedLoops(product)))
}

#[allow(clippy::too_many_arguments)]
pub fn intersect_ordered(
    left: Arc<Operator>,
    right: Arc<Operator>,
    left_type: &Arc<RowType>,
    right_type: &Arc<RowType>,
    left_fixed: usize,
    right_fixed: usize,
    ascending: Vec<bool>,
    join: JoinType,
    options: IntersectOptions,
) -> Result<Arc<Operator>> {
    let intersect = Intersect::new(
        left,
        right,
        left_type,
        right_type,
        left_fixed,
        right_fixed,
        ascending,
        join,
        options,
    )?;
    Ok(Arc::new(Operator::Intersect(intersect)))
}

#[allow(clippy::too_many_arguments)]
pub fn union_ordered(
    left: Arc<Operator>,
    right: Arc<Operator>,
    left_type: &Arc<RowType>,
    right_type: &Arc<RowType>,
    left_fixed: usize,
    right_fixed: usize,
    ascending: Vec<bool>,
    output_equal: bool,
) -> Result<Arc<Operator>> {
    let union = Union::new(
        left,
        right,
        left_type,
        right_type,
        left_fixed,
        right_fixed,
        ascending,
        output_equal,
    )?;
    Ok(Arc::new(Operator::Union(union)))
}

/// Distinct hkeys of `output_hkey_type` covering the rows of both inputs
pub fn hkey_union_ordered(
    left: Arc<Operator>,
    right: Arc<Operator>,
    left_type: &Arc<RowType>,
    right_type: &Arc<RowType>,
    output_hkey_type: &Arc<RowType>,
) -> Result<Arc<Operator>> {
    let union = HKeyUnion::new(left, right, left_type, right_type, output_hkey_type)?;
    Ok(Arc::new(Operator::HKeyUnion(union)))
}

pub fn union_all(inputs: Vec<(Arc<Operator>, Arc<RowType>)>) -> Result<Arc<Operator>> {
    Ok(Arc::new(Operator::UnionAll(UnionAll::new(inputs)?)))
}

/// Build a bloom filter over `filter_input` into `binding`, then stream
/// `input`
#[allow(clippy::too_many_arguments)]
pub fn using_bloom_filter(
    filter_input: Arc<Operator>,
    filter_type: &Arc<RowType>,
    estimated_count: usize,
    binding: usize,
    fields: Vec<Expression>,
    collators: Vec<Option<Collator>>,
    input: Arc<Operator>,
) -> Result<Arc<Operator>> {
    let using = UsingBloomFilter::new(
        filter_input,
        filter_type,
        estimated_count,
        binding,
        fields,
        collators,
        input,
    )?;
    Ok(Arc::new(Operator::UsingBloomFilter(using)))
}

pub fn select_bloom_filter(
    input: Arc<Operator>,
    on_positive: Arc<Operator>,
    fields: Vec<Expression>,
    collators: Vec<Option<Collator>>,
    filter_binding: usize,
    row_binding: usize,
) -> Result<Arc<Operator>> {
    let select = SelectBloomFilter::new(
        input,
        on_positive,
        fields,
        collators,
        filter_binding,
        row_binding,
    )?;
    Ok(Arc::new(Operator::SelectBloomFilter(select)))
}
