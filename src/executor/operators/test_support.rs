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

//! Shared fixture for operator unit tests
//!
//! Group `coi`: customer(cid, name) > orders(oid, cid, odate) >
//! item(iid, cid, oid, qty), plus address(aid, cid, city) under customer.
//! Order 40 and its item belong to a customer that does not exist.

use std::sync::Arc;

use crate::core::{
    Column, DataType, GroupId, IndexId, Row, RowType, Schema, SchemaBuilder, TableId, Value,
};
use crate::executor::bindings::QueryBindings;
use crate::executor::config::ExecConfig;
use crate::executor::context::QueryContext;
use crate::executor::cursor::RowStream;
use crate::executor::operator::Operator;
use crate::storage::{MemoryStore, StoreAdapter};

pub(crate) struct Fixture {
    pub schema: Arc<Schema>,
    pub store: Arc<MemoryStore>,
    pub ctx: Arc<QueryContext>,
    pub bindings: QueryBindings,
    pub group: GroupId,
    pub customer: TableId,
    pub orders: TableId,
    pub item: TableId,
    pub address: TableId,
    pub customer_name: IndexId,
    pub orders_odate: IndexId,
    pub item_qty: IndexId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ExecConfig::default())
    }

    pub fn with_config(config: ExecConfig) -> Self {
        Self::build(config, false)
    }

    /// Fixture whose store cannot seek index cursors
    pub fn without_seek() -> Self {
        Self::build(ExecConfig::default(), true)
    }

    fn build(config: ExecConfig, no_seek: bool) -> Self {
        let mut b = SchemaBuilder::new();
        let customer = b
            .add_root_table(
                "coi",
                "customer",
                vec![
                    Column::new("cid", DataType::Integer),
                    Column::new("name", DataType::Text),
                ],
                &["cid"],
            )
            .unwrap();
        let orders = b
            .add_child_table(
                customer,
                "orders",
                vec![
                    Column::new("oid", DataType::Integer),
                    Column::new("cid", DataType::Integer),
                    Column::new("odate", DataType::Integer),
                ],
                &["cid"],
                &["oid"],
            )
            .unwrap();
        let item = b
            .add_child_table(
                orders,
                "item",
                vec![
                    Column::new("iid", DataType::Integer),
                    Column::new("cid", DataType::Integer),
                    Column::new("oid", DataType::Integer),
                    Column::new("qty", DataType::Integer),
                ],
                &["cid", "oid"],
                &["iid"],
            )
            .unwrap();
        let address = b
            .add_child_table(
                customer,
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
        let customer_name = b.add_index(customer, "customer_name", &["name"]).unwrap();
        let orders_odate = b.add_index(orders, "orders_odate", &["odate"]).unwrap();
        let item_qty = b.add_index(item, "item_qty", &["qty"]).unwrap();
        let schema = b.build();

        let mut store = MemoryStore::new(schema.clone());
        if no_seek {
            store = store.without_seek();
        }
        let i = Value::integer;
        let t = Value::text;
        for (cid, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            store.insert(customer, vec![i(cid), t(name)]).unwrap();
        }
        for (oid, cid, odate) in [(10, 1, 5), (11, 1, 7), (20, 2, 5), (40, 4, 9)] {
            store.insert(orders, vec![i(oid), i(cid), i(odate)]).unwrap();
        }
        for (iid, cid, oid, qty) in [
            (100, 1, 10, 2),
            (101, 1, 10, 3),
            (110, 1, 11, 1),
            (200, 2, 20, 4),
            (400, 4, 40, 5),
        ] {
            store.insert(item, vec![i(iid), i(cid), i(oid), i(qty)]).unwrap();
        }
        for (aid, cid, city) in [(1000, 1, "paris"), (3000, 3, "rome")] {
            store.insert(address, vec![i(aid), i(cid), t(city)]).unwrap();
        }

        let store = Arc::new(store);
        let adapter: Arc<dyn StoreAdapter> = store.clone();
        let ctx = Arc::new(QueryContext::builder(adapter).config(config).build());
        Self {
            group: schema.table(customer).unwrap().group,
            schema,
            store,
            ctx,
            bindings: QueryBindings::new(),
            customer,
            orders,
            item,
            address,
            customer_name,
            orders_odate,
            item_qty,
        }
    }

    pub fn table_type(&self, table: TableId) -> Arc<RowType> {
        self.schema.table_row_type(table).unwrap()
    }

    pub fn index_type(&self, index: IndexId) -> Arc<RowType> {
        self.schema.index_row_type(index).unwrap()
    }

    /// Open, drain and destroy a cursor over `op`
    pub fn run(&self, op: &Operator) -> Vec<Row> {
        self.try_run(op).unwrap()
    }

    pub fn try_run(&self, op: &Operator) -> crate::core::Result<Vec<Row>> {
        RowStream::open(op.cursor(&self.ctx, &self.bindings)?)?.collect_rows()
    }

    /// `run` rendered with `Row`'s display form
    pub fn render(&self, op: &Operator) -> Vec<String> {
        self.run(op).iter().map(Row::to_string).collect()
    }
}

/// Rows of a derived type, one per value list
pub(crate) fn rows_of(row_type: &Arc<RowType>, rows: Vec<Vec<Value>>) -> Vec<Row> {
    rows.into_iter()
        .map(|values| Row::new(row_type, values).unwrap())
        .collect()
}
