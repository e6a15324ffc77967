//! Benchmarks for the control message codec.
//!
//! Run with: cargo bench --bench codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pathctl::{
    process_inbound, DataDiscard, HandlerError, MessageHandler, PathConfirm, PathId, PathLatency,
    RoutingMessage, Value,
};

struct NullHandler;

impl MessageHandler for NullHandler {
    fn handle_path_latency(&self, _: &PathLatency, _: &PathId) -> Result<(), HandlerError> {
        Ok(())
    }

    fn handle_path_confirm(&self, _: &PathConfirm, _: &PathId) -> Result<(), HandlerError> {
        Ok(())
    }

    fn handle_data_discard(&self, _: &DataDiscard, _: &PathId) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn samples() -> Vec<(&'static str, RoutingMessage)> {
    vec![
        (
            "latency",
            PathLatency {
                token: u64::MAX,
                latency_ms: 57,
            }
            .into(),
        ),
        ("confirm", PathConfirm::new(600_000, 12).into()),
        ("discard", DataDiscard::new(PathId::from_bytes([7u8; 16]), 99).into()),
    ]
}

// ===== Message Benchmarks =====

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_encode");
    for (name, msg) in samples() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| black_box(msg).encode())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_decode");
    for (name, msg) in samples() {
        let bytes = msg.encode();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| RoutingMessage::decode(black_box(bytes)))
        });
    }
    group.finish();
}

fn bench_process_inbound(c: &mut Criterion) {
    let path = PathId::from_bytes([1u8; 16]);
    let probe = RoutingMessage::from(PathLatency::probe(42)).encode();
    let mut truncated = probe.clone();
    truncated.pop();

    let mut group = c.benchmark_group("process_inbound");
    group.bench_function("valid", |b| {
        b.iter(|| process_inbound(&NullHandler, &path, black_box(&probe)))
    });
    group.bench_function("malformed", |b| {
        b.iter(|| process_inbound(&NullHandler, &path, black_box(&truncated)))
    });
    group.finish();
}

// ===== Value Benchmarks =====

fn bench_value_decode(c: &mut Criterion) {
    let bytes = RoutingMessage::from(DataDiscard::new(PathId::from_bytes([3u8; 16]), 5)).encode();
    c.bench_function("value_decode", |b| b.iter(|| Value::decode(black_box(&bytes))));
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_process_inbound,
    bench_value_decode
);
criterion_main!(benches);
