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

//! Nested Execution Tests
//!
//! Plans whose inner side reads the outer row from a binding: nested loops,
//! nested index ranges and the bloom-filter semi-join

mod common;

use common::{render, rows_of, World};
use hkexec::api::*;
use hkexec::executor::operators::IndexScanRange;
use hkexec::executor::ExecConfig;
use hkexec::{DataType, Expression, Operator, QueryBindings, RowType, Value};
use std::sync::Arc;

#[test]
fn test_index_range_bound_to_outer_row() {
    let world = World::new();
    let wanted = RowType::derived("q", vec![DataType::Integer]);
    let outer = values_scan_default(
        &wanted,
        rows_of(
            &wanted,
            vec![vec![Value::integer(4)], vec![Value::integer(9)], vec![Value::integer(2)]],
        ),
    )
    .unwrap();
    let inner = index_scan_default(
        &world.schema,
        world.item_qty,
        IndexScanRange::exact(vec![Expression::bound_field(0, 0)]),
        vec![],
    )
    .unwrap();
    let plan = map_nested_loops(outer, inner, 0).unwrap();

    assert_eq!(
        render(&plan, &world.context()),
        vec![
            "item.item_qty[4, 2, 20, 200] {1:(2),2:(20),3:(200)}",
            "item.item_qty[2, 1, 10, 100] {1:(1),2:(10),3:(100)}",
        ]
    );
}

#[test]
fn test_product_of_orders_and_addresses() {
    let world = World::new();
    let customer = world.table_type(world.customer);
    let scan = group_scan_default(&world.schema, world.group).unwrap();
    let outer = flatten_hkey_ordered(
        scan,
        &customer,
        &world.table_type(world.orders),
        JoinType::Inner,
        FlattenOptions::new(),
    )
    .unwrap();
    let outer_type = outer.row_type().unwrap();

    let inner_scan = group_scan_positional(&world.schema, world.group, 0, Some(1), true).unwrap();
    let inner = flatten_hkey_ordered(
        inner_scan,
        &customer,
        &world.table_type(world.address),
        JoinType::Inner,
        FlattenOptions::new(),
    )
    .unwrap();
    let inner_type = inner.row_type().unwrap();

    let plan = product_nested_loops(outer, inner, &outer_type, &inner_type, 0).unwrap();
    let rows = common::run(&plan, &world.context(), &QueryBindings::new()).unwrap();
    let products: Vec<String> = rows
        .iter()
        .filter(|r| r.row_type().to_string().starts_with("product"))
        .map(|r| r.to_string())
        .collect();

    // only alice has both orders and an address
    assert_eq!(
        products,
        vec![
            "product(flatten(customer, orders), flatten(customer, address))[1, alice, 10, 1, 5, 1000, 1, paris]",
            "product(flatten(customer, orders), flatten(customer, address))[1, alice, 11, 1, 7, 1000, 1, paris]",
        ]
    );
}

/// Orders whose customer exists, pre-filtered by the customer ids
fn orders_of_known_customers(world: &World, customers: IndexScanRange) -> Arc<Operator> {
    let names = index_scan_default(&world.schema, world.customer_name, customers, vec![]).unwrap();
    let orders =
        index_scan_default(&world.schema, world.orders_odate, IndexScanRange::all(), vec![])
            .unwrap();
    let exact = ancestor_lookup_nested(
        1,
        &world.index_type(world.orders_odate),
        vec![world.table_type(world.customer)],
        LookupOption::DiscardInput,
    )
    .unwrap();
    let probe =
        select_bloom_filter(orders, exact, vec![Expression::field(1)], vec![None], 0, 1).unwrap();
    using_bloom_filter(
        names,
        &world.index_type(world.customer_name),
        3,
        0,
        vec![Expression::field(1)],
        vec![None],
        probe,
    )
    .unwrap()
}

#[test]
fn test_bloom_semi_join() {
    let world = World::new();
    let plan = orders_of_known_customers(&world, IndexScanRange::all());
    assert_eq!(
        render(&plan, &world.context()),
        vec![
            "orders.orders_odate[5, 1, 10] {1:(1),2:(10)}",
            "orders.orders_odate[5, 2, 20] {1:(2),2:(20)}",
            "orders.orders_odate[7, 1, 11] {1:(1),2:(11)}",
        ]
    );
}

#[test]
fn test_bloom_semi_join_with_loose_filter() {
    // a filter that answers "maybe" very often must not change the result
    let world = World::new();
    let ctx = world.context_with(ExecConfig::default().with_bloom_false_positive_rate(0.5));
    let plan = orders_of_known_customers(&world, IndexScanRange::all());
    let rows = common::run(&plan, &ctx, &QueryBindings::new()).unwrap();
    let oids: Vec<i64> = rows.iter().map(|r| r[2].as_int64().unwrap()).collect();
    assert_eq!(oids, vec![10, 20, 11]);
}

#[test]
fn test_empty_filter_skips_exact_lookups() {
    let world = World::new();
    let ctx = world.context_with(ExecConfig::instrumented());
    let nobody = IndexScanRange::exact(vec![Expression::literal("zed")]);
    let plan = orders_of_known_customers(&world, nobody);

    let rows = common::run(&plan, &ctx, &QueryBindings::new()).unwrap();
    assert!(rows.is_empty());
    let stats = ctx.stats().unwrap();
    assert_eq!(stats.operator("AncestorLookup").opens, 0);
    assert_eq!(stats.operator("Select_BloomFilter").opens, 1);
}

#[test]
fn test_explain_nested_plan() {
    let world = World::new();
    let plan = orders_of_known_customers(&world, IndexScanRange::all());
    let explain = plan.to_string();
    let lines: Vec<&str> = explain.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("Using_BloomFilter("));
    assert!(lines[1].starts_with("  IndexScan("));
    assert!(lines[2].starts_with("  Select_BloomFilter("));
    assert!(lines[3].starts_with("    IndexScan("));
    assert!(lines[4].starts_with("    AncestorLookup_Nested(bound[1]: "));
}
