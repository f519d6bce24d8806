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

//! Operator/cursor execution engine
//!
//! # Architecture
//!
//! A plan is a tree of immutable [`Operator`]s. Executing it asks the root
//! for a [`Cursor`], which recursively creates cursors of the inputs and
//! pulls rows through them:
//!
//! ```text
//! StoreAdapter (group / index cursors)
//!   ↓
//! GroupScan / IndexScan
//!   ↓
//! AncestorLookup, Flatten, Select, ...
//!   ↓
//! Project / Sort / Limit
//!   ↓
//! Consumer (RowStream)
//! ```
//!
//! # Components
//!
//! - [`QueryContext`] - store, configuration, cancellation and statistics
//! - [`QueryBindings`] - positional slots shared by nested plans
//! - [`Expression`] - scalar expressions over a row and the bindings
//! - [`SortOrdering`] - sort keys with direction and collation

pub mod bindings;
pub mod config;
pub mod context;
pub mod cursor;
pub mod expression;
pub mod operator;
pub mod operators;
pub mod ordering;
pub mod stats;

pub use bindings::{Binding, QueryBindings};
pub use config::ExecConfig;
pub use context::{CancellationHandle, QueryContext, QueryContextBuilder};
pub use cursor::{ColumnSelector, Cursor, CursorState, RowStream};
pub use expression::{ArithOp, Expression};
pub use operator::Operator;
pub use ordering::{Collator, OrderingItem, SortOrdering};
pub use stats::{ExecStats, OperatorStats};
