//! Stream reader throughput.
//!
//! Measures envelope decoding for one large chunk and for small chunks
//! that split records at arbitrary points.
//!
//! Run with: cargo bench --bench stream_reader
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;

use pubnub_socket::StreamReader;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const ENVELOPE_COUNTS: &[usize] = &[100, 1_000];
const CHUNK_SIZES: &[usize] = &[64, 1_460, 16_384];
const MESSAGES_PER_ENVELOPE: usize = 4;

// ============================================================================
// Fixtures
// ============================================================================

/// A body of `count` envelopes, each carrying base64 payloads.
fn body(count: usize) -> Vec<u8> {
    let payload = "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyAhIiMkJSYnKCkqKywtLi8w";
    let mut out = Vec::new();
    for i in 0..count {
        let messages = vec![payload; MESSAGES_PER_ENVELOPE];
        let record = json!([messages, format!("{}", 17_000_000_000_000_000u64 + i as u64)]);
        out.extend_from_slice(record.to_string().as_bytes());
        out.push(b'\n');
    }
    out
}

// ============================================================================
// Benchmark: Single Chunk
// ============================================================================

fn bench_single_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_single_chunk");

    for &count in ENVELOPE_COUNTS {
        let bytes = body(count);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &bytes, |b, bytes| {
            b.iter(|| {
                let mut reader = StreamReader::new();
                black_box(reader.feed(bytes))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Split Chunks
// ============================================================================

fn bench_split_chunks(c: &mut Criterion) {
    let bytes = body(1_000);

    let mut group = c.benchmark_group("reader_split_chunks");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    for &size in CHUNK_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut reader = StreamReader::new();
                let mut decoded = 0;
                for chunk in bytes.chunks(size) {
                    decoded += reader.feed(chunk).len();
                }
                assert_eq!(decoded, 1_000);
                black_box(decoded)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_chunk, bench_split_chunks);
criterion_main!(benches);
