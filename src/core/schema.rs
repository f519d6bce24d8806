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

//! Group, table and index definitions
//!
//! Tables are clustered into groups. Every table except a group root has a
//! parent in the same group, and every table's hkey is its parent's hkey
//! plus one segment holding the table's own primary key.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::error::{Error, Result};
use super::hkey::{HKey, HKeySegment};
use super::row_type::RowType;
use super::types::DataType;
use super::value::Value;

pub type GroupId = usize;
pub type TableId = usize;
pub type IndexId = usize;

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    /// Create a non-nullable column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    /// Create a nullable column
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }
}

/// A table in a group
#[derive(Debug, Clone)]
pub struct TableDef {
    pub id: TableId,
    pub name: String,
    pub group: GroupId,
    /// Position of the table in its group, starting at 1 for the root
    pub ordinal: u32,
    pub parent: Option<TableId>,
    /// Table ids from the group root down to this table (inclusive)
    pub ancestry: Vec<TableId>,
    /// Ordinals parallel to `ancestry`
    pub ancestry_ordinals: Vec<u32>,
    pub columns: Vec<Column>,
    /// For each hkey level, the positions of this table's columns that
    /// supply that level's key values
    pub hkey_columns: Vec<Vec<usize>>,
}

impl TableDef {
    /// Depth in the group; the root has depth 1
    #[inline]
    pub fn depth(&self) -> usize {
        self.ancestry.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Positions of the primary key columns
    pub fn primary_key(&self) -> &[usize] {
        self.hkey_columns.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if this table is a proper ancestor of `other`
    pub fn is_ancestor_of(&self, other: &TableDef) -> bool {
        self.group == other.group
            && self.depth() < other.depth()
            && other.ancestry[self.depth() - 1] == self.id
    }

    /// True if `other` is this table or one of its descendants
    pub fn contains(&self, other: &TableDef) -> bool {
        self.id == other.id || self.is_ancestor_of(other)
    }

    /// Compute the hkey of a row of this table
    pub fn hkey_for(&self, values: &[Value]) -> Result<HKey> {
        let mut hkey = HKey::new();
        for (level, columns) in self.hkey_columns.iter().enumerate() {
            let mut keys = Vec::with_capacity(columns.len());
            for &c in columns {
                let value = values.get(c).ok_or(Error::FieldOutOfBounds {
                    index: c,
                    len: values.len(),
                })?;
                keys.push(value.clone());
            }
            hkey.push(HKeySegment::new(self.ancestry_ordinals[level], keys));
        }
        Ok(hkey)
    }

    /// Number of key values in an hkey of this table
    pub fn hkey_value_count(&self) -> usize {
        self.hkey_columns.iter().map(Vec::len).sum()
    }

    /// Types of the key values of an hkey of this table, root level first
    pub fn hkey_types(&self) -> Vec<DataType> {
        self.hkey_columns
            .iter()
            .flatten()
            .map(|&c| self.columns[c].data_type)
            .collect()
    }
}

impl fmt::Display for TableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A secondary index over one table
///
/// Index rows hold the key columns followed by the table's hkey values and
/// carry the indexed row's hkey.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub id: IndexId,
    pub name: String,
    pub table: TableId,
    pub key_columns: Vec<usize>,
}

impl IndexDef {
    pub fn key_count(&self) -> usize {
        self.key_columns.len()
    }
}

/// A group of hierarchically clustered tables
#[derive(Debug, Clone)]
pub struct GroupDef {
    pub id: GroupId,
    pub name: String,
    pub root: TableId,
    pub tables: Vec<TableId>,
}

/// Registry of groups, tables, indexes and their row types
#[derive(Debug)]
pub struct Schema {
    groups: Vec<GroupDef>,
    tables: Vec<Arc<TableDef>>,
    indexes: Vec<Arc<IndexDef>>,
    table_types: Vec<Arc<RowType>>,
    index_types: Vec<Arc<RowType>>,
    hkey_types: Vec<Arc<RowType>>,
    names: FxHashMap<String, TableId>,
}

impl Schema {
    pub fn group(&self, id: GroupId) -> Result<&GroupDef> {
        self.groups
            .get(id)
            .ok_or_else(|| Error::schema(format!("unknown group {}", id)))
    }

    pub fn table(&self, id: TableId) -> Result<&Arc<TableDef>> {
        self.tables
            .get(id)
            .ok_or_else(|| Error::schema(format!("unknown table {}", id)))
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Arc<TableDef>> {
        self.names.get(name).and_then(|&id| self.tables.get(id))
    }

    pub fn index(&self, id: IndexId) -> Result<&Arc<IndexDef>> {
        self.indexes
            .get(id)
            .ok_or_else(|| Error::schema(format!("unknown index {}", id)))
    }

    pub fn index_by_name(&self, name: &str) -> Option<&Arc<IndexDef>> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn tables(&self) -> &[Arc<TableDef>] {
        &self.tables
    }

    pub fn indexes_on(&self, table: TableId) -> impl Iterator<Item = &Arc<IndexDef>> {
        self.indexes.iter().filter(move |i| i.table == table)
    }

    /// Row type of the rows of a table
    pub fn table_row_type(&self, id: TableId) -> Result<Arc<RowType>> {
        self.table_types
            .get(id)
            .cloned()
            .ok_or_else(|| Error::schema(format!("unknown table {}", id)))
    }

    /// Row type of the rows of an index
    pub fn index_row_type(&self, id: IndexId) -> Result<Arc<RowType>> {
        self.index_types
            .get(id)
            .cloned()
            .ok_or_else(|| Error::schema(format!("unknown index {}", id)))
    }

    /// Row type of hkey rows of a table (one field per hkey value)
    pub fn hkey_row_type(&self, id: TableId) -> Result<Arc<RowType>> {
        self.hkey_types
            .get(id)
            .cloned()
            .ok_or_else(|| Error::schema(format!("unknown table {}", id)))
    }

    /// Deepest table that is `a` or an ancestor of `a`, and also `b` or an
    /// ancestor of `b`
    pub fn common_ancestor(&self, a: TableId, b: TableId) -> Result<&Arc<TableDef>> {
        let ta = self.table(a)?;
        let tb = self.table(b)?;
        if ta.group != tb.group {
            return Err(Error::schema(format!(
                "{} and {} are in different groups",
                ta.name, tb.name
            )));
        }
        let shared = ta
            .ancestry
            .iter()
            .zip(tb.ancestry.iter())
            .take_while(|(x, y)| x == y)
            .count();
        // Same group means the roots match, so shared >= 1.
        self.table(ta.ancestry[shared.max(1) - 1])
    }
}

/// Builder for a [`Schema`]
///
/// Tables get ordinals in declaration order within their group, so declare
/// children in the order their rows should interleave.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    groups: Vec<GroupDef>,
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(columns: &[Column], names: &[&str], table: &str) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                columns
                    .iter()
                    .position(|c| c.name == *n)
                    .ok_or_else(|| Error::schema(format!("{} has no column {}", table, n)))
            })
            .collect()
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.tables.iter().any(|t| t.name == name) {
            return Err(Error::schema(format!("duplicate table {}", name)));
        }
        Ok(())
    }

    /// Declare a new group with its root table
    pub fn add_root_table(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_key: &[&str],
    ) -> Result<TableId> {
        let name = name.into();
        self.check_name(&name)?;
        let pk = Self::resolve(&columns, primary_key, &name)?;
        if pk.is_empty() {
            return Err(Error::schema(format!("{} needs a primary key", name)));
        }
        let id = self.tables.len();
        let group_id = self.groups.len();
        self.groups.push(GroupDef {
            id: group_id,
            name: group.into(),
            root: id,
            tables: vec![id],
        });
        self.tables.push(TableDef {
            id,
            name,
            group: group_id,
            ordinal: 1,
            parent: None,
            ancestry: vec![id],
            ancestry_ordinals: vec![1],
            columns,
            hkey_columns: vec![pk],
        });
        Ok(id)
    }

    /// Declare a child table
    ///
    /// `parent_key` names this table's columns holding the parent's full
    /// hkey values (root level first); `primary_key` names its own key.
    pub fn add_child_table(
        &mut self,
        parent: TableId,
        name: impl Into<String>,
        columns: Vec<Column>,
        parent_key: &[&str],
        primary_key: &[&str],
    ) -> Result<TableId> {
        let name = name.into();
        self.check_name(&name)?;
        let parent_def = self
            .tables
            .get(parent)
            .ok_or_else(|| Error::schema(format!("unknown parent table {}", parent)))?;
        let parent_cols = Self::resolve(&columns, parent_key, &name)?;
        if parent_cols.len() != parent_def.hkey_value_count() {
            return Err(Error::schema(format!(
                "{} references {} with {} columns, its hkey has {}",
                name,
                parent_def.name,
                parent_cols.len(),
                parent_def.hkey_value_count()
            )));
        }
        let pk = Self::resolve(&columns, primary_key, &name)?;
        if pk.is_empty() {
            return Err(Error::schema(format!("{} needs a primary key", name)));
        }

        let mut hkey_columns = Vec::with_capacity(parent_def.depth() + 1);
        let mut offset = 0;
        for level in &parent_def.hkey_columns {
            hkey_columns.push(parent_cols[offset..offset + level.len()].to_vec());
            offset += level.len();
        }
        hkey_columns.push(pk);

        let id = self.tables.len();
        let group_id = parent_def.group;
        let group = &mut self.groups[group_id];
        group.tables.push(id);
        let ordinal = group.tables.len() as u32;

        let mut ancestry = parent_def.ancestry.clone();
        ancestry.push(id);
        let mut ancestry_ordinals = parent_def.ancestry_ordinals.clone();
        ancestry_ordinals.push(ordinal);

        self.tables.push(TableDef {
            id,
            name,
            group: group_id,
            ordinal,
            parent: Some(parent),
            ancestry,
            ancestry_ordinals,
            columns,
            hkey_columns,
        });
        Ok(id)
    }

    /// Declare a secondary index on a table
    pub fn add_index(
        &mut self,
        table: TableId,
        name: impl Into<String>,
        key: &[&str],
    ) -> Result<IndexId> {
        let name = name.into();
        let def = self
            .tables
            .get(table)
            .ok_or_else(|| Error::schema(format!("unknown table {}", table)))?;
        if key.is_empty() {
            return Err(Error::schema(format!("index {} has no key columns", name)));
        }
        let key_columns = Self::resolve(&def.columns, key, &def.name)?;
        let id = self.indexes.len();
        self.indexes.push(IndexDef {
            id,
            name,
            table,
            key_columns,
        });
        Ok(id)
    }

    /// Freeze the definitions and create their row types
    pub fn build(self) -> Arc<Schema> {
        let tables: Vec<Arc<TableDef>> = self.tables.into_iter().map(Arc::new).collect();
        let indexes: Vec<Arc<IndexDef>> = self.indexes.into_iter().map(Arc::new).collect();
        let table_types = tables.iter().map(|t| RowType::for_table(t.clone())).collect();
        let hkey_types = tables.iter().map(|t| RowType::for_hkey(t.clone())).collect();
        let index_types = indexes
            .iter()
            .map(|i| RowType::for_index(i.clone(), tables[i.table].clone()))
            .collect();
        let names = tables.iter().map(|t| (t.name.clone(), t.id)).collect();
        Arc::new(Schema {
            groups: self.groups,
            tables,
            indexes,
            table_types,
            index_types,
            hkey_types,
            names,
        })
    }
}
