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

//! Row types
//!
//! A [`RowType`] is shared as `Arc<RowType>`. Every row type gets a unique id
//! at creation; two row types are the same type only if they have the same
//! id, so operators test type membership with [`RowType::same`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::error::{Error, Result};
use super::schema::{IndexDef, TableDef};
use super::types::DataType;

static NEXT_ROW_TYPE_ID: AtomicU32 = AtomicU32::new(1);

fn next_id() -> u32 {
    NEXT_ROW_TYPE_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a row type describes
#[derive(Debug, Clone)]
pub enum RowTypeKind {
    /// Rows of a group table
    Table(Arc<TableDef>),
    /// Rows of a secondary index
    Index {
        index: Arc<IndexDef>,
        table: Arc<TableDef>,
    },
    /// Rows holding just the hkey values of a table
    HKey(Arc<TableDef>),
    /// Parent fields followed by child fields
    Flattened {
        parent: Arc<RowType>,
        child: Arc<RowType>,
    },
    /// Left fields followed by the right fields below the shared branch
    Product {
        left: Arc<RowType>,
        right: Arc<RowType>,
        branch: Arc<TableDef>,
        right_skip: usize,
    },
    /// Computed fields over an input type, keeping the input's hkey
    Projected { input: Arc<RowType> },
    /// Rows with no group position (literals, aggregates)
    Derived { name: String },
}

/// Shape of a row: field types plus where the row comes from
#[derive(Debug)]
pub struct RowType {
    id: u32,
    kind: RowTypeKind,
    fields: Vec<DataType>,
}

impl RowType {
    pub(crate) fn for_table(table: Arc<TableDef>) -> Arc<RowType> {
        let fields = table.columns.iter().map(|c| c.data_type).collect();
        Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::Table(table),
            fields,
        })
    }

    pub(crate) fn for_hkey(table: Arc<TableDef>) -> Arc<RowType> {
        let fields = table.hkey_types();
        Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::HKey(table),
            fields,
        })
    }

    pub(crate) fn for_index(index: Arc<IndexDef>, table: Arc<TableDef>) -> Arc<RowType> {
        let mut fields: Vec<DataType> = index
            .key_columns
            .iter()
            .map(|&c| table.columns[c].data_type)
            .collect();
        fields.extend(table.hkey_types());
        Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::Index { index, table },
            fields,
        })
    }

    /// Type of flattened parent/child rows
    ///
    /// The parent must be a proper ancestor of the child.
    pub fn flattened(parent: &Arc<RowType>, child: &Arc<RowType>) -> Result<Arc<RowType>> {
        let (p, c) = match (parent.table(), child.table()) {
            (Some(p), Some(c)) => (p, c),
            _ => {
                return Err(Error::invalid_plan(format!(
                    "cannot flatten {} and {}: both need a table",
                    parent, child
                )))
            }
        };
        if !p.is_ancestor_of(c) {
            return Err(Error::invalid_plan(format!(
                "cannot flatten {} and {}: not an ancestor",
                parent, child
            )));
        }
        let mut fields = parent.fields.clone();
        fields.extend_from_slice(&child.fields);
        Ok(Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::Flattened {
                parent: parent.clone(),
                child: child.clone(),
            },
            fields,
        }))
    }

    /// Type of product rows combining two branches under `branch`
    ///
    /// Both sides must contain `branch`. The right side's leading fields that
    /// belong to `branch` or its ancestors are dropped.
    pub fn product(
        left: &Arc<RowType>,
        right: &Arc<RowType>,
        branch: &Arc<TableDef>,
    ) -> Result<Arc<RowType>> {
        let covers = |rt: &RowType| rt.component_tables().iter().any(|t| t.id == branch.id);
        if !covers(&**left) || !covers(&**right) {
            return Err(Error::invalid_plan(format!(
                "product of {} and {} must share branch {}",
                left, right, branch.name
            )));
        }
        let mut right_skip = 0;
        for table in right.component_tables() {
            if table.contains(branch) {
                right_skip += table.column_count();
            } else {
                break;
            }
        }
        let mut fields = left.fields.clone();
        fields.extend_from_slice(&right.fields[right_skip..]);
        Ok(Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::Product {
                left: left.clone(),
                right: right.clone(),
                branch: branch.clone(),
                right_skip,
            },
            fields,
        }))
    }

    /// Type of projected rows over `input`
    pub fn projected(input: &Arc<RowType>, fields: Vec<DataType>) -> Arc<RowType> {
        Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::Projected {
                input: input.clone(),
            },
            fields,
        })
    }

    /// Free-standing row type with no group position
    pub fn derived(name: impl Into<String>, fields: Vec<DataType>) -> Arc<RowType> {
        Arc::new(RowType {
            id: next_id(),
            kind: RowTypeKind::Derived { name: name.into() },
            fields,
        })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> &RowTypeKind {
        &self.kind
    }

    pub fn fields(&self) -> &[DataType] {
        &self.fields
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, index: usize) -> Result<DataType> {
        self.fields
            .get(index)
            .copied()
            .ok_or(Error::FieldOutOfBounds {
                index,
                len: self.fields.len(),
            })
    }

    /// Identity test
    #[inline]
    pub fn same(a: &RowType, b: &RowType) -> bool {
        a.id == b.id
    }

    /// The table whose hkey rows of this type carry, if any
    ///
    /// Flattened rows take the child's table; projected rows keep their
    /// input's. Index, product and derived rows are not positioned in the
    /// group stream.
    pub fn table(&self) -> Option<&Arc<TableDef>> {
        match &self.kind {
            RowTypeKind::Table(t) | RowTypeKind::HKey(t) => Some(t),
            RowTypeKind::Flattened { child, .. } => child.table(),
            RowTypeKind::Projected { input } => input.table(),
            RowTypeKind::Index { .. } | RowTypeKind::Product { .. } | RowTypeKind::Derived { .. } => {
                None
            }
        }
    }

    /// Table whose hkey is attached to rows of this type, including index
    /// rows (which carry the indexed row's hkey)
    pub fn hkey_table(&self) -> Option<&Arc<TableDef>> {
        match &self.kind {
            RowTypeKind::Index { table, .. } => Some(table),
            _ => self.table(),
        }
    }

    /// Tables whose fields make up this type, in field order
    pub fn component_tables(&self) -> Vec<Arc<TableDef>> {
        match &self.kind {
            RowTypeKind::Table(t) => vec![t.clone()],
            RowTypeKind::Flattened { parent, child } => {
                let mut tables = parent.component_tables();
                tables.extend(child.component_tables());
                tables
            }
            RowTypeKind::Product { left, right, branch, .. } => {
                let mut tables = left.component_tables();
                tables.extend(
                    right
                        .component_tables()
                        .into_iter()
                        .skip_while(|t| t.contains(branch)),
                );
                tables
            }
            _ => Vec::new(),
        }
    }

    /// True if rows of this type sit strictly above rows of `other` in the
    /// hierarchy
    pub fn is_ancestor_of(&self, other: &RowType) -> bool {
        match (self.table(), other.hkey_table()) {
            (Some(a), Some(b)) => a.is_ancestor_of(b),
            _ => false,
        }
    }

    /// Number of right-side fields dropped by a product type
    pub fn product_right_skip(&self) -> Option<usize> {
        match &self.kind {
            RowTypeKind::Product { right_skip, .. } => Some(*right_skip),
            _ => None,
        }
    }
}

impl PartialEq for RowType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RowType {}

impl std::hash::Hash for RowType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RowTypeKind::Table(t) => write!(f, "{}", t.name),
            RowTypeKind::Index { index, table } => write!(f, "{}.{}", table.name, index.name),
            RowTypeKind::HKey(t) => write!(f, "hkey({})", t.name),
            RowTypeKind::Flattened { parent, child } => write!(f, "flatten({}, {})", parent, child),
            RowTypeKind::Product { left, right, .. } => write!(f, "product({}, {})", left, right),
            RowTypeKind::Projected { input } => write!(f, "project({})", input),
            RowTypeKind::Derived { name } => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, SchemaBuilder};

    fn schema() -> Arc<crate::core::schema::Schema> {
        let mut b = SchemaBuilder::new();
        let c = b
            .add_root_table(
                "coi",
                "customer",
                vec![Column::new("cid", DataType::Integer), Column::new("name", DataType::Text)],
                &["cid"],
            )
            .unwrap();
        let o = b
            .add_child_table(
                c,
                "orders",
                vec![Column::new("oid", DataType::Integer), Column::new("cid", DataType::Integer)],
                &["cid"],
                &["oid"],
            )
            .unwrap();
        b.add_child_table(
            c,
            "address",
            vec![
                Column::new("aid", DataType::Integer),
                Column::new("cid", DataType::Integer),
                Column::new("city", DataType::Text),
            ],
            &["cid"],
            &["aid"],
        )
        .unwrap();
        b.add_index(o, "orders_cid", &["cid"]).unwrap();
        b.build()
    }

    #[test]
    fn test_identity() {
        let s = schema();
        let a = s.table_row_type(0).unwrap();
        let b = s.table_row_type(0).unwrap();
        let c = s.table_row_type(1).unwrap();
        assert!(RowType::same(&a, &b));
        assert!(!RowType::same(&a, &c));
        let d1 = RowType::derived("x", vec![DataType::Integer]);
        let d2 = RowType::derived("x", vec![DataType::Integer]);
        assert_ne!(d1, d2);
    }

    #[test]
    fn test_index_type_fields() {
        let s = schema();
        let idx = s.index_row_type(0).unwrap();
        assert_eq!(idx.field_count(), 3);
        assert_eq!(idx.hkey_table().unwrap().name, "orders");
        assert!(idx.table().is_none());
        assert_eq!(idx.to_string(), "orders.orders_cid");
    }

    #[test]
    fn test_flattened_and_product() {
        let s = schema();
        let customer = s.table_row_type(0).unwrap();
        let orders = s.table_row_type(1).unwrap();
        let address = s.table_row_type(2).unwrap();

        let co = RowType::flattened(&customer, &orders).unwrap();
        assert_eq!(co.field_count(), 4);
        assert_eq!(co.table().unwrap().name, "orders");
        assert!(RowType::flattened(&orders, &customer).is_err());
        assert!(RowType::flattened(&orders, &address).is_err());

        let ca = RowType::flattened(&customer, &address).unwrap();
        let branch = s.table(0).unwrap();
        let product = RowType::product(&co, &ca, branch).unwrap();
        assert_eq!(product.product_right_skip(), Some(2));
        assert_eq!(product.field_count(), 4 + 3);
        let names: Vec<_> = product
            .component_tables()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["customer", "orders", "address"]);

        assert!(customer.is_ancestor_of(&orders));
        assert!(customer.is_ancestor_of(&co));
        assert!(!orders.is_ancestor_of(&address));
    }
}
