//! End-to-end scenarios from the table/shard lifecycle and range fanout
//! design: create a table, encode rows into its shards, fan a range read
//! out across them, and delete it again — all against the in-memory
//! testkit doubles.

use shardkv_core::codec::{encode_key, encode_value};
use shardkv_core::descriptor::{Comparator, DataModel, Fields, TableDescriptor, TableType};
use shardkv_core::fanout::{read_range_on_shards, RangeContinuation};
use shardkv_core::ports::{OrderedBackend, Placement};
use shardkv_core::testkit::{InMemoryBackend, InMemoryCatalogStore};
use shardkv_core::validator::{verify_create_table_args, OptionValue};
use shardkv_core::{catalog, lifecycle};
use shardkv_common::FieldValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn create_table_args(name: &str, shards: u64) -> Vec<(String, OptionValue)> {
    vec![
        ("name".to_string(), OptionValue::Str(name.to_string())),
        ("key".to_string(), OptionValue::StrList(vec!["x".into()])),
        (
            "columns".to_string(),
            OptionValue::StrList(vec!["x".into(), "y".into(), "z".into()]),
        ),
        ("shards".to_string(), OptionValue::UInt(shards)),
        ("distributed".to_string(), OptionValue::Bool(false)),
    ]
}

#[tokio::test]
async fn s1_create_table_with_three_shards() {
    let backend = InMemoryBackend::new();
    let store = InMemoryCatalogStore::new();

    let descriptor = verify_create_table_args(&create_table_args("t1", 3), |_| false, 1).unwrap();
    assert_eq!(descriptor.columns, vec!["y".to_string(), "z".to_string()]);

    let created = lifecycle::create_table_local(None, &backend, None, &store, descriptor)
        .await
        .unwrap();

    assert_eq!(created.shards.len(), 3);
    let ids: Vec<_> = created.shards.iter().map(|s| s.shard_id.clone()).collect();
    assert_eq!(ids, vec!["t1_shard0", "t1_shard1", "t1_shard2"]);

    let fetched = catalog::get_table(&store, "t1").await.unwrap();
    assert_eq!(fetched.name, "t1");
}

fn table_for_fanout() -> TableDescriptor {
    TableDescriptor {
        name: "range_t".into(),
        key: vec!["x".into()],
        columns: vec!["y".into()],
        indexes: vec![],
        num_shards: 2,
        shards: vec![],
        distributed: false,
        replication_factor: 1,
        table_type: TableType::Ordered,
        data_model: DataModel::Binary,
        comparator: Comparator::Ascending,
        wrapper: None,
        time_series: false,
    }
}

fn row_key(n: i64) -> Vec<u8> {
    let fields: Fields = vec![("x".into(), FieldValue::Int(n))];
    encode_key(&["x".to_string()], &fields).unwrap()
}

fn row_value(n: i64) -> Vec<u8> {
    let fields: Fields = vec![("y".into(), FieldValue::Int(n * 10))];
    encode_value(DataModel::Binary, &[], &fields).unwrap()
}

#[tokio::test]
async fn s5_fanout_over_two_shards_returns_everything_when_chunk_is_large_enough() {
    let backend = Arc::new(InMemoryBackend::new());
    let table = table_for_fanout();

    backend.open("range_t_shard0", table.comparator, true, true).await.unwrap();
    backend.open("range_t_shard1", table.comparator, true, true).await.unwrap();
    backend.put("range_t_shard0", row_key(1), row_value(1));
    backend.put("range_t_shard0", row_key(3), row_value(3));
    backend.put("range_t_shard0", row_key(5), row_value(5));
    backend.put("range_t_shard1", row_key(2), row_value(2));
    backend.put("range_t_shard1", row_key(4), row_value(4));
    backend.put("range_t_shard1", row_key(6), row_value(6));

    let shards = vec![
        shardkv_core::descriptor::ShardDescriptor::from_table(&table, "range_t_shard0".into()),
        shardkv_core::descriptor::ShardDescriptor::from_table(&table, "range_t_shard1".into()),
    ];
    let placements: Vec<Placement> = vec![];
    let cancel = CancellationToken::new();

    let result = read_range_on_shards(
        backend.clone(),
        None,
        None,
        &table,
        &shards,
        &placements,
        row_key(i64::MIN),
        row_key(i64::MAX),
        100,
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(result.rows.len(), 6);
    assert_eq!(result.cont, RangeContinuation::Complete);
    let values: Vec<i64> = result
        .rows
        .iter()
        .map(|r| match r.key[0].1 {
            FieldValue::Int(n) => n,
            _ => panic!("expected int key"),
        })
        .collect();
    assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn s4_fanout_truncates_at_the_continuation_frontier() {
    let backend = Arc::new(InMemoryBackend::new());
    let table = table_for_fanout();

    backend.open("range_t_shard0", table.comparator, true, true).await.unwrap();
    backend.open("range_t_shard1", table.comparator, true, true).await.unwrap();
    for n in [1, 3, 5] {
        backend.put("range_t_shard0", row_key(n), row_value(n));
    }
    for n in [2, 4, 6] {
        backend.put("range_t_shard1", row_key(n), row_value(n));
    }

    let shards = vec![
        shardkv_core::descriptor::ShardDescriptor::from_table(&table, "range_t_shard0".into()),
        shardkv_core::descriptor::ShardDescriptor::from_table(&table, "range_t_shard1".into()),
    ];
    let placements: Vec<Placement> = vec![];
    let cancel = CancellationToken::new();

    // A chunk of 2 forces each shard to stop partway through, leaving a
    // continuation key behind.
    let result = read_range_on_shards(
        backend.clone(),
        None,
        None,
        &table,
        &shards,
        &placements,
        row_key(i64::MIN),
        row_key(i64::MAX),
        2,
        &cancel,
    )
    .await
    .unwrap();

    assert!(matches!(result.cont, RangeContinuation::Key(_)));
    for row in &result.rows {
        if let RangeContinuation::Key(cont_key) = &result.cont {
            assert!(row.key[0].1 < cont_key[0].1);
        }
    }
}

#[tokio::test]
async fn s6_delete_table_removes_everything() {
    let backend = InMemoryBackend::new();
    let store = InMemoryCatalogStore::new();

    let descriptor = verify_create_table_args(&create_table_args("t_del", 2), |_| false, 1).unwrap();
    let created = lifecycle::create_table_local(None, &backend, None, &store, descriptor)
        .await
        .unwrap();

    lifecycle::delete_table_local(&backend, None, &store, "t_del", "n1", "dc1")
        .await
        .unwrap();

    assert!(catalog::get_table(&store, "t_del").await.is_err());
    for placed in &created.shards {
        assert!(catalog::get_shard(&store, &placed.shard_id).await.is_err());
        assert!(backend.was_deleted(&placed.shard_id));
    }
}
