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

//! Physical operators
//!
//! # Available Operators
//!
//! ## Sources
//!
//! - [`GroupScan`] - hkey-ordered traversal of a group, whole or positioned
//! - [`IndexScan`] - ranged, ordered index traversal; supports `jump`
//! - [`ValuesScan`] - fixed list of rows
//!
//! ## Lookups and hierarchy
//!
//! - [`AncestorLookup`] - point lookups of ancestor rows
//! - [`BranchLookup`] - subtree fetch of a sibling branch
//! - [`Flatten`] - parent/child combination with inner, outer and keep options
//!
//! ## Filtering and shaping
//!
//! - [`Select`], [`Filter`], [`Project`], [`Limit`], [`Distinct`], [`Sort`]
//! - [`Aggregate`] - streaming aggregation over runs of equal keys
//!
//! ## Combination
//!
//! - [`MapNestedLoops`], [`ProductNestedLoops`]
//! - [`Intersect`] - ordered merge with optional skip-scan
//! - [`Union`], [`HKeyUnion`], [`UnionAll`]
//! - [`UsingBloomFilter`] / [`SelectBloomFilter`] - bloom-filter semi-join

pub mod aggregate;
pub mod bloom_filter;
pub mod distinct;
pub mod flatten;
pub mod intersect;
pub mod limit;
pub mod lookup;
pub mod nested_loops;
pub mod project;
pub mod scan;
pub mod select;
pub mod sort;
pub mod union;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{Aggregate, AggregatorKind};
pub use bloom_filter::{SelectBloomFilter, UsingBloomFilter};
pub use distinct::Distinct;
pub use flatten::Flatten;
pub use intersect::Intersect;
pub use limit::{Limit, LimitCount};
pub use lookup::{AncestorLookup, BranchLookup};
pub use nested_loops::{MapNestedLoops, ProductNestedLoops};
pub use project::Project;
pub use scan::{GroupScan, GroupScanMode, IndexScan, IndexScanBound, IndexScanRange, ValuesScan};
pub use select::{Filter, Select};
pub use sort::{Sort, SortAlgorithm};
pub use union::{HKeyUnion, Union, UnionAll};
