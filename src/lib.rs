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

//! # hkexec - operator/cursor execution for hkey-clustered table groups
//!
//! Tables of a group are stored interleaved: every child row follows its
//! parent, ordered by a hierarchical key ([`HKey`]). hkexec is the execution
//! core that runs physical plans over such a layout: immutable
//! [`Operator`] trees that produce pull-based [`Cursor`]s per execution.
//!
//! ## Key Features
//!
//! - **Hierarchy-aware operators** - group scans, ancestor and branch lookups,
//!   hkey-ordered flatten and select
//! - **Ordered set operators** - intersect (with skip-scan), union and hkey union
//!   over any mix of ascending and descending fields
//! - **Nested loops through bindings** - inner plans read outer rows from
//!   positional binding slots
//! - **Bloom-filter semi-joins** - negatives are dropped without storage access
//! - **Checked cursor lifecycle** - cancellation, timeouts and statistics in one
//!   wrapper shared by all operators
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use hkexec::api::{flatten_hkey_ordered, group_scan_default, FlattenOptions, JoinType};
//! use hkexec::{
//!     Column, DataType, MemoryStore, QueryBindings, QueryContext, RowStream, SchemaBuilder,
//!     Value,
//! };
//!
//! fn main() -> hkexec::Result<()> {
//!     let mut b = SchemaBuilder::new();
//!     let customer = b.add_root_table(
//!         "coi",
//!         "customer",
//!         vec![Column::new("cid", DataType::Integer), Column::new("name", DataType::Text)],
//!         &["cid"],
//!     )?;
//!     let orders = b.add_child_table(
//!         customer,
//!         "orders",
//!         vec![Column::new("oid", DataType::Integer), Column::new("cid", DataType::Integer)],
//!         &["cid"],
//!         &["oid"],
//!     )?;
//!     let schema = b.build();
//!
//!     let store = Arc::new(MemoryStore::new(schema.clone()));
//!     store.insert(customer, vec![Value::integer(1), Value::text("alice")])?;
//!     store.insert(orders, vec![Value::integer(10), Value::integer(1)])?;
//!
//!     let customer_type = schema.table_row_type(customer)?;
//!     let orders_type = schema.table_row_type(orders)?;
//!     let plan = flatten_hkey_ordered(
//!         group_scan_default(&schema, schema.table(customer)?.group)?,
//!         &customer_type,
//!         &orders_type,
//!         JoinType::Inner,
//!         FlattenOptions::new(),
//!     )?;
//!
//!     let ctx = Arc::new(QueryContext::new(store));
//!     let rows = RowStream::open(plan.cursor(&ctx, &QueryBindings::new())?)?.collect_rows()?;
//!     assert_eq!(
//!         rows[0].to_string(),
//!         "flatten(customer, orders)[1, alice, 10, 1] {1:(1),2:(10)}"
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`api`] - plan factories and option types
//! - [`core`] - values, hkeys, rows, row types, schema and errors
//! - [`executor`] - operators, cursors, bindings and the query context
//! - [`storage`] - storage adapter traits and [`MemoryStore`]
//! - [`common`] - bloom filter

pub mod api;
pub mod common;
pub mod core;
pub mod executor;
pub mod storage;

pub use core::{
    Column, DataType, Error, GroupId, HKey, HKeySegment, IndexId, Result, Row, RowType,
    RowTypeKind, Schema, SchemaBuilder, TableId, Value,
};

pub use executor::{
    Binding, CancellationHandle, Collator, Cursor, CursorState, ExecConfig, ExecStats,
    Expression, Operator, QueryBindings, QueryContext, RowStream, SortOrdering,
};

pub use storage::{MemoryStore, StoreAdapter};
