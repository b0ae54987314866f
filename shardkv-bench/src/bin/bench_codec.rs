//! # Codec Benchmark Harness
//!
//! Purpose: Provide a dependency-free, repeatable benchmark driver for the
//! key/value codec so baseline encode/decode throughput can be compared
//! over time.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: Use a fixed PRNG seed for stable comparisons.
//! 2. **Allocation Control**: Pre-build field values to keep setup costs off the hot path.
//! 3. **Zero-Cost Dispatch**: Call the codec functions directly to avoid dynamic dispatch.

use std::env;
use std::hint::black_box;
use std::time::Instant;

use shardkv_common::FieldValue;
use shardkv_core::codec::{decode_key, encode_key};
use shardkv_core::descriptor::Fields;

const DEFAULT_KEY_COUNT: usize = 1 << 16;
const DEFAULT_OP_COUNT: usize = 1_000_000;

struct BenchConfig {
    key_count: usize,
    op_count: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let key_count = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        BenchConfig { key_count, op_count }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Tiny deterministic PRNG used to avoid external dependencies.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_keys(count: usize, seed: u64) -> Vec<Fields> {
    let mut rng = XorShift64::new(seed);
    (0..count)
        .map(|_| {
            vec![
                ("a".to_string(), FieldValue::Int(rng.next_u64() as i64)),
                ("b".to_string(), FieldValue::Text(format!("{:x}", rng.next_u64()))),
            ]
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
    let key_def = vec!["a".to_string(), "b".to_string()];
    let key_count = config.key_count.max(1);
    let key_mask = key_count.next_power_of_two() - 1;

    let fields = build_keys(key_count, 0xA5A5_A5A5_A5A5_A5A5);
    let encoded: Vec<Vec<u8>> = fields
        .iter()
        .map(|f| encode_key(&key_def, f).expect("encode"))
        .collect();

    println!(
        "keys: count={}, ops={}",
        key_count, config.op_count
    );

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(key_mask) % key_count;
        let bytes = encode_key(&key_def, &fields[idx]).expect("encode");
        black_box(bytes);
    }
    report("ENCODE_KEY", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(key_mask) % key_count;
        let decoded = decode_key(&key_def, &encoded[idx]).expect("decode");
        black_box(decoded);
    }
    report("DECODE_KEY", config.op_count, start.elapsed());
}
