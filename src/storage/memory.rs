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

//! In-memory storage adapter
//!
//! Each group is a `BTreeMap<HKey, Row>`; each index is a vector of index
//! rows kept sorted by their fields. Both live behind `Arc` so cursors work
//! on a snapshot: inserts after a cursor was created copy the structure
//! instead of disturbing the cursor.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::traits::{
    compare_prefix, GroupCursor, GroupScanStart, IndexCursor, IndexKeyRange, StoreAdapter,
};
use crate::core::{Error, GroupId, HKey, IndexId, Result, Row, Schema, TableId, Value};

type GroupRows = Arc<BTreeMap<HKey, Row>>;
type IndexRows = Arc<Vec<Row>>;

/// In-memory implementation of [`StoreAdapter`]
pub struct MemoryStore {
    schema: Arc<Schema>,
    groups: RwLock<FxHashMap<GroupId, GroupRows>>,
    indexes: RwLock<FxHashMap<IndexId, IndexRows>>,
    seekable: bool,
}

impl MemoryStore {
    /// Create an empty store for a schema
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            groups: RwLock::new(FxHashMap::default()),
            indexes: RwLock::new(FxHashMap::default()),
            seekable: true,
        }
    }

    /// Report index jumps as linear scans, forcing sequential merges
    pub fn without_seek(mut self) -> Self {
        self.seekable = false;
        self
    }

    /// Insert a row into a table, maintaining the table's indexes
    pub fn insert(&self, table: TableId, values: Vec<Value>) -> Result<Row> {
        let def = self.schema.table(table)?.clone();
        let row_type = self.schema.table_row_type(table)?;
        let hkey = def.hkey_for(&values)?;
        let row = Row::with_hkey(&row_type, values, hkey.clone())?;

        {
            let mut groups = self.groups.write();
            let rows = Arc::make_mut(groups.entry(def.group).or_default());
            if rows.contains_key(&hkey) {
                return Err(Error::storage(format!(
                    "duplicate hkey {} in {}",
                    hkey, def.name
                )));
            }
            rows.insert(hkey.clone(), row.clone());
        }

        let mut indexes = self.indexes.write();
        for index in self.schema.indexes_on(table) {
            let index_type = self.schema.index_row_type(index.id)?;
            let mut fields: Vec<Value> = index
                .key_columns
                .iter()
                .map(|&c| row.values()[c].clone())
                .collect();
            fields.extend(hkey.key_values().cloned());
            let index_row = Row::with_hkey(&index_type, fields, hkey.clone())?;

            let rows = Arc::make_mut(indexes.entry(index.id).or_default());
            let at = rows.partition_point(|r| r.values() <= index_row.values());
            rows.insert(at, index_row);
        }
        Ok(row)
    }

    /// Insert a row into a table looked up by name
    pub fn insert_into(&self, table: &str, values: Vec<Value>) -> Result<Row> {
        let id = self
            .schema
            .table_by_name(table)
            .ok_or_else(|| Error::schema(format!("unknown table {}", table)))?
            .id;
        self.insert(id, values)
    }

    /// Number of rows stored in a group
    pub fn group_len(&self, group: GroupId) -> usize {
        self.groups.read().get(&group).map_or(0, |g| g.len())
    }

    fn group_snapshot(&self, group: GroupId) -> GroupRows {
        self.groups.read().get(&group).cloned().unwrap_or_default()
    }

    fn index_snapshot(&self, index: IndexId) -> IndexRows {
        self.indexes.read().get(&index).cloned().unwrap_or_default()
    }
}

impl StoreAdapter for MemoryStore {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn group_cursor(&self, group: GroupId) -> Result<Box<dyn GroupCursor>> {
        self.schema.group(group)?;
        Ok(Box::new(MemoryGroupCursor {
            rows: self.group_snapshot(group),
            state: GroupScanState::Closed,
        }))
    }

    fn index_cursor(
        &self,
        index: IndexId,
        range: IndexKeyRange,
        ascending: &[bool],
    ) -> Result<Box<dyn IndexCursor>> {
        self.schema.index(index)?;
        let snapshot = self.index_snapshot(index);
        let start = snapshot.partition_point(|r| !range_admits_lo(&range, r.values()));
        let end = snapshot.partition_point(|r| range_admits_hi(&range, r.values()));
        let end = end.max(start);

        let rows = if ascending.iter().all(|&a| a) {
            MemoryIndexRows {
                rows: snapshot,
                start,
                end,
            }
        } else {
            let mut slice: Vec<Row> = snapshot[start..end].to_vec();
            slice.sort_by(|a, b| compare_prefix(a.values(), b.values(), ascending));
            let len = slice.len();
            MemoryIndexRows {
                rows: Arc::new(slice),
                start: 0,
                end: len,
            }
        };

        Ok(Box::new(MemoryIndexCursor {
            position: None,
            ascending: ascending.to_vec(),
            rows,
            seekable: self.seekable,
        }))
    }

    fn supports_seek(&self) -> bool {
        self.seekable
    }
}

fn range_admits_lo(range: &IndexKeyRange, fields: &[Value]) -> bool {
    match &range.lo {
        None => true,
        Some(lo) => match compare_prefix(fields, &lo.values, &[]) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => lo.inclusive,
            std::cmp::Ordering::Less => false,
        },
    }
}

fn range_admits_hi(range: &IndexKeyRange, fields: &[Value]) -> bool {
    match &range.hi {
        None => true,
        Some(hi) => match compare_prefix(fields, &hi.values, &[]) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => hi.inclusive,
            std::cmp::Ordering::Greater => false,
        },
    }
}

enum GroupScanState {
    Closed,
    /// Next row is the first one after `after` (or the first at/after
    /// `from` when nothing was returned yet) that still has `prefix`
    Scanning {
        from: Option<HKey>,
        after: Option<HKey>,
        prefix: Option<HKey>,
    },
    Single(Option<HKey>),
}

struct MemoryGroupCursor {
    rows: GroupRows,
    state: GroupScanState,
}

impl GroupCursor for MemoryGroupCursor {
    fn open(&mut self, start: GroupScanStart) -> Result<()> {
        self.state = match start {
            GroupScanStart::Full => GroupScanState::Scanning {
                from: None,
                after: None,
                prefix: None,
            },
            GroupScanStart::At { hkey, deep: true } => GroupScanState::Scanning {
                from: Some(hkey.clone()),
                after: None,
                prefix: Some(hkey),
            },
            GroupScanStart::At { hkey, deep: false } => GroupScanState::Single(Some(hkey)),
        };
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        match &mut self.state {
            GroupScanState::Closed => Ok(None),
            GroupScanState::Single(key) => {
                let Some(key) = key.take() else {
                    return Ok(None);
                };
                Ok(self
                    .rows
                    .range((Bound::Included(key), Bound::Unbounded))
                    .next()
                    .map(|(_, row)| row.clone()))
            }
            GroupScanState::Scanning {
                from,
                after,
                prefix,
            } => {
                let lower = match (after.as_ref(), from.as_ref()) {
                    (Some(a), _) => Bound::Excluded(a.clone()),
                    (None, Some(f)) => Bound::Included(f.clone()),
                    (None, None) => Bound::Unbounded,
                };
                let found = self
                    .rows
                    .range((lower, Bound::Unbounded))
                    .next()
                    .map(|(k, row)| (k.clone(), row.clone()));
                match found {
                    Some((key, row)) if prefix.as_ref().map_or(true, |p| p.is_prefix_of(&key)) => {
                        *after = Some(key);
                        Ok(Some(row))
                    }
                    _ => {
                        self.state = GroupScanState::Closed;
                        Ok(None)
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        self.state = GroupScanState::Closed;
    }
}

/// Rows `start..end` of a sorted snapshot, in scan order
struct MemoryIndexRows {
    rows: IndexRows,
    start: usize,
    end: usize,
}

impl MemoryIndexRows {
    fn slice(&self) -> &[Row] {
        &self.rows[self.start..self.end]
    }
}

struct MemoryIndexCursor {
    rows: MemoryIndexRows,
    ascending: Vec<bool>,
    /// Offset into the range of the next row; `None` while closed
    position: Option<usize>,
    seekable: bool,
}

impl IndexCursor for MemoryIndexCursor {
    fn open(&mut self) -> Result<()> {
        self.position = Some(0);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let Some(pos) = self.position else {
            return Ok(None);
        };
        match self.rows.slice().get(pos) {
            Some(row) => {
                self.position = Some(pos + 1);
                Ok(Some(row.clone()))
            }
            None => {
                self.position = None;
                Ok(None)
            }
        }
    }

    fn jump(&mut self, key: &[Value]) -> Result<()> {
        let slice = self.rows.slice();
        let before = |r: &Row| {
            compare_prefix(r.values(), key, &self.ascending) == std::cmp::Ordering::Less
        };
        let target = if self.seekable {
            slice.partition_point(before)
        } else {
            slice.iter().take_while(|&r| before(r)).count()
        };
        self.position = Some(target);
        Ok(())
    }

    fn close(&mut self) {
        self.position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, SchemaBuilder};
    use crate::storage::traits::IndexBound;

    fn store() -> MemoryStore {
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
                vec![
                    Column::new("oid", DataType::Integer),
                    Column::new("cid", DataType::Integer),
                    Column::new("amount", DataType::Integer),
                ],
                &["cid"],
                &["oid"],
            )
            .unwrap();
        b.add_index(o, "orders_amount", &["amount"]).unwrap();
        let store = MemoryStore::new(b.build());
        for (cid, name) in [(1, "a"), (2, "b")] {
            store
                .insert_into("customer", vec![Value::integer(cid), Value::text(name)])
                .unwrap();
        }
        for (oid, cid, amount) in [(10, 1, 5), (11, 1, 7), (20, 2, 5), (21, 2, 9)] {
            store
                .insert_into(
                    "orders",
                    vec![Value::integer(oid), Value::integer(cid), Value::integer(amount)],
                )
                .unwrap();
        }
        store
    }

    fn drain_group(cursor: &mut dyn GroupCursor) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            out.push(row.values()[0].as_int64().unwrap());
        }
        out
    }

    #[test]
    fn test_full_group_scan_in_hkey_order() {
        let store = store();
        let mut cursor = store.group_cursor(0).unwrap();
        cursor.open(GroupScanStart::Full).unwrap();
        assert_eq!(drain_group(cursor.as_mut()), vec![1, 10, 11, 2, 20, 21]);
        assert!(cursor.next().unwrap().is_none());
    }

    #[test]
    fn test_deep_and_shallow_positioning() {
        let store = store();
        let schema = store.schema().clone();
        let customer = schema.table(0).unwrap();
        let hkey = customer.hkey_for(&[Value::integer(2)]).unwrap();

        let mut cursor = store.group_cursor(0).unwrap();
        cursor
            .open(GroupScanStart::At {
                hkey: hkey.clone(),
                deep: true,
            })
            .unwrap();
        assert_eq!(drain_group(cursor.as_mut()), vec![2, 20, 21]);

        cursor.open(GroupScanStart::At { hkey, deep: false }).unwrap();
        assert_eq!(drain_group(cursor.as_mut()), vec![2]);
    }

    #[test]
    fn test_duplicate_hkey_rejected() {
        let store = store();
        let err = store
            .insert_into("customer", vec![Value::integer(1), Value::text("dup")])
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.group_len(0), 6);
    }

    #[test]
    fn test_index_range_and_jump() {
        let store = store();
        let range = IndexKeyRange::between(Some(IndexBound::inclusive(vec![Value::integer(6)])), None);
        let mut cursor = store.index_cursor(0, range, &[true]).unwrap();
        cursor.open().unwrap();
        let first = cursor.next().unwrap().unwrap();
        assert_eq!(first.values()[0], Value::integer(7));
        assert_eq!(first.hkey().unwrap().depth(), 2);

        let mut cursor = store.index_cursor(0, IndexKeyRange::all(), &[true]).unwrap();
        cursor.open().unwrap();
        cursor.jump(&[Value::integer(6)]).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().values()[0], Value::integer(7));
        cursor.jump(&[Value::integer(5)]).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().values()[0], Value::integer(5));
    }

    #[test]
    fn test_descending_index_scan() {
        let store = store();
        let mut cursor = store.index_cursor(0, IndexKeyRange::all(), &[false]).unwrap();
        cursor.open().unwrap();
        let mut amounts = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            amounts.push(row.values()[0].as_int64().unwrap());
        }
        assert_eq!(amounts, vec![9, 7, 5, 5]);

        cursor.open().unwrap();
        cursor.jump(&[Value::integer(6)]).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().values()[0], Value::integer(5));
    }
}
