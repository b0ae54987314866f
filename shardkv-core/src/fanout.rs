//! # Range Fanout (C6)
//!
//! Purpose: Parallel-map a range request to shard workers (local or
//! distributed), merge their sorted results, cut at a continuation key, and
//! return a chunked response with a resumable continuation token (§4.6).
//! This is the component the rest of the crate exists to support: the other
//! five are table/shard bookkeeping, this one is the actual read path.

use std::cmp::Ordering;
use std::sync::Arc;

use shardkv_common::{ShardKvError, ShardKvResult};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::codec::{decode_key, decode_value};
use crate::descriptor::{Comparator, DataModel, Fields, ShardDescriptor, TableDescriptor};
use crate::ports::{
    Continuation, OrderedBackend, Placement, ShardRangeReply, ShardRangeRequest, TopologyClient,
    Wrapper,
};

/// A decoded `(key, value)` row, as returned to the caller after §4.5
/// decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: Fields,
    pub value: Fields,
}

/// The result of a bounded range fanout: the merged, decoded rows and
/// either `Complete` or a decoded continuation key to resume from.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeResult {
    pub rows: Vec<Row>,
    pub cont: RangeContinuation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeContinuation {
    Complete,
    Key(Fields),
}

fn dir_of(comparator: Comparator) -> u8 {
    comparator.dir()
}

/// Ascending/descending comparison of two backend-encoded keys, honoring
/// `dir` (1 = ascending, 0 = descending) (§4.6 step 1).
fn cmp_bytes(dir: u8, a: &[u8], b: &[u8]) -> Ordering {
    if dir == 1 {
        a.cmp(b)
    } else {
        b.cmp(a)
    }
}

/// Dispatches one per-shard request to the right collaborator: the ordered
/// backend directly for `Ordered` shards, the wrapper for `OrderedWrapped`
/// shards, locally. Distributed tables go through `map_shards_seq` instead
/// (§4.6 step 4, "select per-type callback").
async fn dispatch_local_one(
    backend: &Arc<dyn OrderedBackend>,
    wrapper: Option<&Arc<dyn Wrapper>>,
    shard: &ShardDescriptor,
    request: &ShardRangeRequest,
) -> ShardKvResult<ShardRangeReply> {
    match (&shard.wrapper, wrapper) {
        (Some(_), Some(wrapper)) => match request {
            ShardRangeRequest::Bounded {
                start,
                stop,
                chunk,
                dir,
            } => {
                wrapper
                    .read_range_binary(&shard.shard, start, stop, *chunk, *dir)
                    .await
            }
            ShardRangeRequest::Bounded2 { .. } => Err(ShardKvError::unsupported(
                "type_not_supported",
                "read_range_n on wrapped shard",
            )),
        },
        _ => match request {
            ShardRangeRequest::Bounded {
                start, stop, chunk, ..
            } => backend.read_range_binary(&shard.shard, start, stop, *chunk).await,
            ShardRangeRequest::Bounded2 { start, n } => {
                backend.read_range_n_binary(&shard.shard, start, *n).await
            }
        },
    }
}

/// Dispatches `request` to every shard in `shards`, locally in parallel via
/// a bounded `JoinSet` with cooperative cancellation (§5 "Parallel fanout",
/// §9 "implement as a bounded worker pool with structured task
/// cancellation").
async fn map_shards_local(
    backend: Arc<dyn OrderedBackend>,
    wrapper: Option<Arc<dyn Wrapper>>,
    shards: &[ShardDescriptor],
    request: ShardRangeRequest,
    cancel: &CancellationToken,
) -> ShardKvResult<Vec<ShardRangeReply>> {
    let mut replies = vec![None; shards.len()];
    let mut set: JoinSet<(usize, ShardKvResult<ShardRangeReply>)> = JoinSet::new();

    for (idx, shard) in shards.iter().enumerate() {
        let shard = shard.clone();
        let request = request.clone();
        let backend = Arc::clone(&backend);
        let wrapper = wrapper.clone();
        let cancel = cancel.clone();
        set.spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(ShardKvError::transient("cancelled")),
                result = dispatch_local_one(&backend, wrapper.as_ref(), &shard, &request) => result,
            };
            (idx, result)
        });
    }

    while let Some(joined) = set.join_next().await {
        let (idx, result) = joined.map_err(|e| ShardKvError::transient(e.to_string()))?;
        if let Err(e) = &result {
            if e.reason() == "cancelled" {
                set.abort_all();
            }
        }
        replies[idx] = Some(result?);
    }

    replies
        .into_iter()
        .map(|r| r.ok_or_else(|| ShardKvError::downstream("fanout", "missing_shard_reply")))
        .collect()
}

/// A stable k-way merge of already-sorted per-shard runs under `dir` (§4.6
/// "Merge semantics"). Duplicate keys across shards are a caller invariant;
/// if observed, the first one encountered wins.
pub fn merge_sorted_kvls(dir: u8, kvls: Vec<Vec<(Vec<u8>, Vec<u8>)>>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut cursors = vec![0usize; kvls.len()];
    let mut out = Vec::new();
    loop {
        let mut best: Option<(usize, &[u8])> = None;
        for (i, kvl) in kvls.iter().enumerate() {
            if let Some((k, _)) = kvl.get(cursors[i]) {
                best = match best {
                    None => Some((i, k.as_slice())),
                    Some((_, bk)) if cmp_bytes(dir, k, bk) == Ordering::Less => Some((i, k.as_slice())),
                    other => other,
                };
            }
        }
        match best {
            None => break,
            Some((i, _)) => {
                let (k, v) = kvls[i][cursors[i]].clone();
                if out.last().map(|(lk, _): &(Vec<u8>, Vec<u8>)| lk != &k).unwrap_or(true) {
                    out.push((k, v));
                }
                cursors[i] += 1;
            }
        }
    }
    out
}

fn decode_row(
    table: &TableDescriptor,
    key_bytes: &[u8],
    value_bytes: &[u8],
) -> ShardKvResult<Row> {
    let key = decode_key(&table.key, key_bytes)?;
    let value = decode_value(table.data_model, &table.columns, value_bytes)?;
    Ok(Row { key, value })
}

/// Bounded range fanout (§4.6 `read_range_on_shards`). `shards` is the
/// already-placed, already-filtered (for local tables) shard set to query.
#[instrument(skip(backend, wrapper, topology, table, shards), fields(table = %table.name, distributed = table.distributed))]
pub async fn read_range_on_shards(
    backend: Arc<dyn OrderedBackend>,
    wrapper: Option<Arc<dyn Wrapper>>,
    topology: Option<&dyn TopologyClient>,
    table: &TableDescriptor,
    shards: &[ShardDescriptor],
    placements: &[Placement],
    start: Vec<u8>,
    stop: Vec<u8>,
    chunk: usize,
    cancel: &CancellationToken,
) -> ShardKvResult<RangeResult> {
    let dir = dir_of(table.comparator);
    let request = ShardRangeRequest::Bounded {
        start,
        stop,
        chunk,
        dir,
    };

    let replies = if table.distributed {
        let topology = topology.ok_or_else(|| {
            ShardKvError::invalid_argument("invalid_option", "distributed", "no_topology_client")
        })?;
        topology.map_shards_seq(placements, request).await?
    } else {
        map_shards_local(backend, wrapper, shards, request, cancel).await?
    };

    merge_replies(dir, table, replies)
}

/// Bounded count fanout (§4.6 `read_range_n_on_shards`): every shard is
/// asked for up to `n` items; results are merged and the first `n` kept.
#[instrument(skip(backend, wrapper, topology, table, shards), fields(table = %table.name, n))]
pub async fn read_range_n_on_shards(
    backend: Arc<dyn OrderedBackend>,
    wrapper: Option<Arc<dyn Wrapper>>,
    topology: Option<&dyn TopologyClient>,
    table: &TableDescriptor,
    shards: &[ShardDescriptor],
    placements: &[Placement],
    start: Vec<u8>,
    n: usize,
    cancel: &CancellationToken,
) -> ShardKvResult<Vec<Row>> {
    let dir = dir_of(table.comparator);
    let request = ShardRangeRequest::Bounded2 { start, n };

    let replies = if table.distributed {
        let topology = topology.ok_or_else(|| {
            ShardKvError::invalid_argument("invalid_option", "distributed", "no_topology_client")
        })?;
        topology.map_shards_seq(placements, request).await?
    } else {
        map_shards_local(backend, wrapper, shards, request, cancel).await?
    };

    let kvls: Vec<_> = replies.into_iter().map(|r| r.items).collect();
    let merged = merge_sorted_kvls(dir, kvls);
    merged
        .into_iter()
        .take(n)
        .map(|(k, v)| decode_row(table, &k, &v))
        .collect()
}

/// Step 5-8 of §4.6: surface the first shard error, compute the safe
/// continuation frontier, truncate, and decode.
fn merge_replies(
    dir: u8,
    table: &TableDescriptor,
    replies: Vec<ShardRangeReply>,
) -> ShardKvResult<RangeResult> {
    // Step 5: surface the first error and abort (callers propagate `?`
    // before reaching here, so reaching this point means every reply is
    // `Ok`; this function only ever sees successes).
    let conts: Vec<&[u8]> = replies
        .iter()
        .filter_map(|r| match &r.cont {
            Continuation::Key(k) => Some(k.as_slice()),
            Continuation::Complete => None,
        })
        .collect();

    let kvls: Vec<_> = replies.iter().map(|r| r.items.clone()).collect();

    if conts.is_empty() {
        // Step 6: nothing is still in flight, merge everything and return.
        let merged = merge_sorted_kvls(dir, kvls);
        let rows = merged
            .into_iter()
            .map(|(k, v)| decode_row(table, &k, &v))
            .collect::<ShardKvResult<Vec<_>>>()?;
        return Ok(RangeResult {
            rows,
            cont: RangeContinuation::Complete,
        });
    }

    // Step 7: cont* is the earliest not-yet-consumed frontier across shards.
    let cont_star = conts
        .iter()
        .copied()
        .min_by(|a, b| cmp_bytes(dir, a, b))
        .ok_or_else(|| ShardKvError::downstream("fanout", "empty_continuation_set"))?
        .to_vec();

    let mut merge_input = kvls;
    merge_input.push(vec![(cont_star.clone(), Vec::new())]);
    let merged = merge_sorted_kvls(dir, merge_input);

    let cut = merged
        .iter()
        .position(|(k, _)| k == &cont_star)
        .unwrap_or(merged.len());
    let truncated = &merged[..cut];

    let rows = truncated
        .iter()
        .map(|(k, v)| decode_row(table, k, v))
        .collect::<ShardKvResult<Vec<_>>>()?;

    let decoded_cont = decode_key(&table.key, &cont_star)?;

    Ok(RangeResult {
        rows,
        cont: RangeContinuation::Key(decoded_cont),
    })
}

/// `approximate_size` (§4.6): sums per-shard backend size estimates.
/// Supported only for `Ordered`, matching "supported only for `ordered`,
/// else fails `type_not_supported`".
pub async fn approximate_size(
    backend: &dyn OrderedBackend,
    table: &TableDescriptor,
    shards: &[ShardDescriptor],
) -> ShardKvResult<u64> {
    use crate::descriptor::TableType;
    if table.table_type != TableType::Ordered {
        return Err(ShardKvError::unsupported(
            "type_not_supported",
            "approximate_size",
        ));
    }
    let mut total = 0u64;
    for shard in shards {
        total += backend.approximate_size(&shard.shard).await?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_of_two_sorted_runs_is_fully_sorted() {
        let a = vec![(vec![1u8], vec![]), (vec![3u8], vec![])];
        let b = vec![(vec![2u8], vec![]), (vec![4u8], vec![])];
        let merged = merge_sorted_kvls(1, vec![a, b]);
        let keys: Vec<u8> = merged.into_iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![1, 2, 3, 4]);
    }

    #[test]
    fn merge_drops_duplicate_keys_keeping_first() {
        let a = vec![(vec![1u8], vec![0xAA])];
        let b = vec![(vec![1u8], vec![0xBB])];
        let merged = merge_sorted_kvls(1, vec![a, b]);
        assert_eq!(merged, vec![(vec![1u8], vec![0xAA])]);
    }

    #[test]
    fn descending_merge_reverses_order() {
        let a = vec![(vec![3u8], vec![]), (vec![1u8], vec![])];
        let b = vec![(vec![4u8], vec![]), (vec![2u8], vec![])];
        let merged = merge_sorted_kvls(0, vec![a, b]);
        let keys: Vec<u8> = merged.into_iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![4, 3, 2, 1]);
    }

    fn table_fixture() -> TableDescriptor {
        use crate::descriptor::{DataModel, TableType};
        TableDescriptor {
            name: "t1".into(),
            key: vec!["x".into()],
            columns: vec![],
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

    fn int_key_bytes(n: i64) -> Vec<u8> {
        let mut out = Vec::new();
        shardkv_common::field::encode_component(&shardkv_common::FieldValue::Int(n), &mut out);
        out
    }

    #[test]
    fn s4_truncates_at_the_minimum_continuation() {
        let table = table_fixture();
        let reply_a = ShardRangeReply {
            items: vec![
                (int_key_bytes(1), vec![]),
                (int_key_bytes(3), vec![]),
            ],
            cont: Continuation::Key(int_key_bytes(5)),
        };
        let reply_b = ShardRangeReply {
            items: vec![
                (int_key_bytes(2), vec![]),
                (int_key_bytes(4), vec![]),
            ],
            cont: Continuation::Key(int_key_bytes(6)),
        };
        let result = merge_replies(1, &table, vec![reply_a, reply_b]).unwrap();
        let values: Vec<i64> = result
            .rows
            .iter()
            .map(|r| match &r.key[0].1 {
                shardkv_common::FieldValue::Int(n) => *n,
                _ => panic!("expected int"),
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
        match result.cont {
            RangeContinuation::Key(fields) => {
                assert_eq!(fields[0].1, shardkv_common::FieldValue::Int(5));
            }
            RangeContinuation::Complete => panic!("expected a continuation"),
        }
    }

    #[test]
    fn s5_returns_complete_when_every_shard_is_done() {
        let table = table_fixture();
        let reply_a = ShardRangeReply {
            items: vec![
                (int_key_bytes(1), vec![]),
                (int_key_bytes(3), vec![]),
                (int_key_bytes(5), vec![]),
            ],
            cont: Continuation::Complete,
        };
        let reply_b = ShardRangeReply {
            items: vec![
                (int_key_bytes(2), vec![]),
                (int_key_bytes(4), vec![]),
                (int_key_bytes(6), vec![]),
            ],
            cont: Continuation::Complete,
        };
        let result = merge_replies(1, &table, vec![reply_a, reply_b]).unwrap();
        assert_eq!(result.rows.len(), 6);
        assert_eq!(result.cont, RangeContinuation::Complete);
    }
}
