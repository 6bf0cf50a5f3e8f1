//! Criterion benchmarks for chatbox formatting and OSC encoding.
//!
//! Run with:
//! ```bash
//! cargo bench --package gluco-core --bench chatbox_bench
//! ```

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gluco_core::{
    encode_chatbox_input, format_reading, ChatboxFormat, GlucoseValue, Reading, Trend,
};

fn make_reading() -> Reading {
    let ts = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
    Reading::new(GlucoseValue::MgDl(142), Trend::RisingSlow, ts)
}

fn bench_format(c: &mut Criterion) {
    let reading = make_reading();
    let format = ChatboxFormat::default();
    c.bench_function("format_reading", |b| {
        b.iter(|| format_reading(black_box(&reading), black_box(&format)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let text = format_reading(&make_reading(), &ChatboxFormat::default());
    c.bench_function("encode_chatbox_input", |b| {
        b.iter(|| encode_chatbox_input(black_box(&text), true).unwrap())
    });
}

fn bench_format_and_encode(c: &mut Criterion) {
    let reading = make_reading();
    let format = ChatboxFormat::default();
    c.bench_function("format_and_encode", |b| {
        b.iter(|| {
            let text = format_reading(black_box(&reading), &format);
            encode_chatbox_input(&text, true).unwrap()
        })
    });
}

criterion_group!(benches, bench_format, bench_encode, bench_format_and_encode);
criterion_main!(benches);
