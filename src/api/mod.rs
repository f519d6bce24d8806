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

//! Plan construction API
//!
//! Plans are assembled bottom-up with the factories in [`factory`], one per
//! operator kind. Every factory validates its arguments and returns a
//! shared [`Operator`](crate::executor::Operator); nothing runs until a
//! cursor is created from the finished tree.
//!
//! # Quick Start
//!
//! ```ignore
//! use hkexec::api::*;
//! use hkexec::{Expression, QueryBindings, QueryContext, RowStream};
//!
//! // customer rows named 'alice', with their orders attached
//! let scan = group_scan_default(&schema, group)?;
//! let select = select_hkey_ordered(
//!     scan,
//!     &customer_type,
//!     Expression::equals(Expression::field(1), Expression::literal("alice")),
//! )?;
//! let plan = flatten_hkey_ordered(
//!     select,
//!     &customer_type,
//!     &orders_type,
//!     JoinType::Left,
//!     FlattenOptions::new(),
//! )?;
//!
//! let ctx = Arc::new(QueryContext::new(store));
//! let rows = RowStream::open(plan.cursor(&ctx, &QueryBindings::new())?)?;
//! for row in rows {
//!     println!("{}", row?);
//! }
//! ```
//!
//! # Nested plans
//!
//! Inner sides of [`map_nested_loops`] and [`select_bloom_filter`] read the
//! outer row from a binding slot. The `*_nested` lookups and
//! [`IndexScanRange`](crate::executor::operators::IndexScanRange) bounds
//! built from [`Expression::bound_field`](crate::executor::Expression) are
//! the usual consumers.

pub mod factory;
pub mod options;

pub use factory::*;
pub use options::{
    FlattenOptions, IntersectOptions, IntersectOutput, JoinType, LookupOption, ScanMode,
    SortOption,
};
