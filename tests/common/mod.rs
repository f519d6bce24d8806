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

//! Shared fixture for integration tests
//!
//! Group `coi`: customer(cid, name) > orders(oid, cid, odate) >
//! item(iid, cid, oid, qty), and address(aid, cid, city) under customer.
//! Order 40 and its item 400 belong to customer 4, which does not exist.

#![allow(dead_code)]

use std::sync::Arc;

use hkexec::executor::ExecConfig;
use hkexec::{
    Column, DataType, GroupId, IndexId, MemoryStore, Operator, QueryBindings, QueryContext, Row,
    RowStream, RowType, Schema, SchemaBuilder, TableId, Value,
};

pub struct World {
    pub schema: Arc<Schema>,
    pub store: Arc<MemoryStore>,
    pub group: GroupId,
    pub customer: TableId,
    pub orders: TableId,
    pub item: TableId,
    pub address: TableId,
    pub customer_name: IndexId,
    pub orders_odate: IndexId,
    pub item_qty: IndexId,
}

impl World {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Same data in a store whose index cursors cannot seek
    pub fn without_seek() -> Self {
        Self::build(false)
    }

    fn build(seekable: bool) -> Self {
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
            .expect("customer");
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
            .expect("orders");
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
            .expect("item");
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
            .expect("address");
        let customer_name = b.add_index(customer, "customer_name", &["name"]).unwrap();
        let orders_odate = b.add_index(orders, "orders_odate", &["odate"]).unwrap();
        let item_qty = b.add_index(item, "item_qty", &["qty"]).unwrap();
        let schema = b.build();

        let mut store = MemoryStore::new(schema.clone());
        if !seekable {
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

        Self {
            group: schema.table(customer).unwrap().group,
            schema,
            store: Arc::new(store),
            customer,
            orders,
            item,
            address,
            customer_name,
            orders_odate,
            item_qty,
        }
    }

    pub fn context(&self) -> Arc<QueryContext> {
        self.context_with(ExecConfig::default())
    }

    pub fn context_with(&self, config: ExecConfig) -> Arc<QueryContext> {
        Arc::new(QueryContext::builder(self.store.clone()).config(config).build())
    }

    pub fn table_type(&self, table: TableId) -> Arc<RowType> {
        self.schema.table_row_type(table).unwrap()
    }

    pub fn index_type(&self, index: IndexId) -> Arc<RowType> {
        self.schema.index_row_type(index).unwrap()
    }
}

/// Execute `plan` to completion
pub fn run(
    plan: &Operator,
    ctx: &Arc<QueryContext>,
    bindings: &QueryBindings,
) -> hkexec::Result<Vec<Row>> {
    RowStream::open(plan.cursor(ctx, bindings)?)?.collect_rows()
}

/// Execute `plan` with fresh bindings and render each row
pub fn render(plan: &Operator, ctx: &Arc<QueryContext>) -> Vec<String> {
    run(plan, ctx, &QueryBindings::new())
        .expect("plan failed")
        .iter()
        .map(Row::to_string)
        .collect()
}

/// Rows of a derived type
pub fn rows_of(row_type: &Arc<RowType>, rows: Vec<Vec<Value>>) -> Vec<Row> {
    rows.into_iter()
        .map(|values| Row::new(row_type, values).unwrap())
        .collect()
}
