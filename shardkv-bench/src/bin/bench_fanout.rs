//! # Fanout Merge Benchmark Harness
//!
//! Purpose: Measure the cost of the k-way sorted merge at the heart of
//! range fanout, independent of any backend or network I/O.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: Fixed PRNG seed, pre-sorted per-shard runs.
//! 2. **Isolate the Merge**: No backend, wrapper, or topology collaborator
//!    in the loop — only `merge_sorted_kvls` is timed.

use std::env;
use std::hint::black_box;
use std::time::Instant;

use shardkv_core::fanout::merge_sorted_kvls;

const DEFAULT_SHARDS: usize = 8;
const DEFAULT_ITEMS_PER_SHARD: usize = 4096;
const DEFAULT_ROUNDS: usize = 200;

struct BenchConfig {
    shards: usize,
    items_per_shard: usize,
    rounds: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let shards = parse_usize(args.next(), DEFAULT_SHARDS);
        let items_per_shard = parse_usize(args.next(), DEFAULT_ITEMS_PER_SHARD);
        let rounds = parse_usize(args.next(), DEFAULT_ROUNDS);
        BenchConfig { shards, items_per_shard, rounds }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Builds `shards` disjoint, already-sorted runs that interleave evenly,
/// the way per-shard ranges of a hash-partitioned key space typically do.
fn build_runs(shards: usize, items_per_shard: usize) -> Vec<Vec<(Vec<u8>, Vec<u8>)>> {
    (0..shards)
        .map(|shard_idx| {
            (0..items_per_shard)
                .map(|i| {
                    let key = ((i * shards + shard_idx) as u64).to_be_bytes().to_vec();
                    (key, Vec::new())
                })
                .collect()
        })
        .collect()
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn main() {
    let config = BenchConfig::from_args();
    let runs = build_runs(config.shards, config.items_per_shard);
    let total_items = config.shards * config.items_per_shard * config.rounds;

    println!(
        "shards={}, items_per_shard={}, rounds={}",
        config.shards, config.items_per_shard, config.rounds
    );

    let start = Instant::now();
    for _ in 0..config.rounds {
        let merged = merge_sorted_kvls(1, runs.clone());
        black_box(merged);
    }
    report("MERGE_SORTED_KVLS", total_items, start.elapsed());
}
