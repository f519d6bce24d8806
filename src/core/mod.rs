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

//! Core types and definitions for hkexec
//!
//! - [`DataType`] / [`ComparisonOp`] - field types and comparison operators
//! - [`Value`] - runtime values with a total storage order
//! - [`HKey`] - hierarchical keys ordering rows within a group
//! - [`Schema`] - groups, tables and indexes
//! - [`RowType`] - shape and provenance of rows
//! - [`Row`] - shared row handles
//! - [`Error`] - the crate error type

pub mod error;
pub mod hkey;
pub mod row;
pub mod row_type;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use hkey::{HKey, HKeySegment};
pub use row::Row;
pub use row_type::{RowType, RowTypeKind};
pub use schema::{Column, GroupDef, GroupId, IndexDef, IndexId, Schema, SchemaBuilder, TableDef, TableId};
pub use types::{ComparisonOp, DataType};
pub use value::Value;

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Rows of a table carry hkeys that follow the group order
    #[test]
    fn test_table_rows_in_group_order() {
        let mut b = SchemaBuilder::new();
        let parent = b
            .add_root_table("g", "parent", vec![Column::new("id", DataType::Integer)], &["id"])
            .unwrap();
        let child = b
            .add_child_table(
                parent,
                "child",
                vec![
                    Column::new("id", DataType::Integer),
                    Column::new("pid", DataType::Integer),
                ],
                &["pid"],
                &["id"],
            )
            .unwrap();
        let schema = b.build();
        let pt = schema.table_row_type(parent).unwrap();
        let ct = schema.table_row_type(child).unwrap();
        let pdef = schema.table(parent).unwrap();
        let cdef = schema.table(child).unwrap();

        let p1 = vec![Value::integer(1)];
        let c1 = vec![Value::integer(5), Value::integer(1)];
        let p2 = vec![Value::integer(2)];

        let mut rows = vec![
            Row::with_hkey(&pt, p2.clone(), pdef.hkey_for(&p2).unwrap()).unwrap(),
            Row::with_hkey(&ct, c1.clone(), cdef.hkey_for(&c1).unwrap()).unwrap(),
            Row::with_hkey(&pt, p1.clone(), pdef.hkey_for(&p1).unwrap()).unwrap(),
        ];
        rows.sort_by(|a, b| a.hkey().cmp(&b.hkey()));
        let order: Vec<String> = rows.iter().map(|r| r.row_type().to_string()).collect();
        assert_eq!(order, vec!["parent", "child", "parent"]);
        assert!(rows[0].hkey().unwrap().is_ancestor_of(rows[1].hkey().unwrap()));
    }
}
