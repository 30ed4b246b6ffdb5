//! Performance benchmarks for ipenrich components.
//!
//! These benchmarks measure input parsing, row rendering and metadata
//! decoding so large input lists stay cheap to process outside the
//! network-bound stages.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use ipenrich::lookup::IpMetadata;
use ipenrich::pipeline::{Mode, OutputRow};
use ipenrich::tabular::{self, InputFormat};

const SAMPLE_BODY: &str = r#"{
  "ip": "93.184.216.34",
  "city": "Springfield",
  "region": "Illinois",
  "country": "US",
  "loc": "39.7817,-89.6501",
  "org": "AS15133 Edgecast Inc.",
  "postal": "62701",
  "timezone": "America/Chicago"
}"#;

fn generate_list(n: usize) -> String {
    let mut text = String::with_capacity(n * 24);
    for i in 0..n {
        if i % 3 == 0 {
            text.push_str(&format!("10.{}.{}.{}\n", i / 65536 % 256, i / 256 % 256, i % 256));
        } else {
            text.push_str(&format!("host{i}.example.com\n"));
        }
    }
    text
}

fn generate_csv(n: usize) -> String {
    let mut text = String::from("host,owner,notes\n");
    for i in 0..n {
        text.push_str(&format!("host{i}.example.com,team{},\"note, with comma\"\n", i % 7));
    }
    text
}

fn generate_rows(n: usize) -> Vec<OutputRow> {
    (0..n)
        .map(|i| {
            vec![
                format!("host{i}.example.com"),
                format!("192.0.2.{}", i % 256),
                "AS15133 Edgecast Inc.".to_string(),
                "Springfield".to_string(),
                "US".to_string(),
            ]
        })
        .collect()
}

/// Benchmark input parsing with different sizes and formats
fn bench_input_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("input_parsing");

    let list = generate_list(100);
    group.bench_function("list_100", |b| {
        b.iter(|| tabular::parse_items(black_box(&list), InputFormat::Auto))
    });

    let csv = generate_csv(100);
    group.bench_function("csv_100", |b| {
        b.iter(|| tabular::parse_items(black_box(&csv), InputFormat::Auto))
    });

    for &n in &[1_000usize, 10_000, 50_000] {
        let text = generate_list(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("list_scaling", n), &text, |b, text| {
            b.iter(|| tabular::parse_items(black_box(text), InputFormat::List))
        });
    }

    group.finish();
}

/// Benchmark CSV output rendering
fn bench_row_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_rendering");

    for &n in &[100usize, 1_000, 10_000] {
        let rows = generate_rows(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("full_mode", n), &rows, |b, rows| {
            b.iter(|| tabular::render_rows(Mode::Full.headers(), black_box(rows)))
        });
    }

    group.finish();
}

/// Benchmark decoding of metadata response bodies
fn bench_metadata_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_decoding");

    group.bench_function("full_body", |b| {
        b.iter(|| IpMetadata::from_json(black_box(SAMPLE_BODY.as_bytes())))
    });

    group.bench_function("bogon_body", |b| {
        let body = br#"{"ip":"10.0.0.1","bogon":true}"#;
        b.iter(|| IpMetadata::from_json(black_box(body)))
    });

    group.bench_function("empty_body", |b| {
        b.iter(|| IpMetadata::from_json(black_box(b"")))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_input_parsing,
    bench_row_rendering,
    bench_metadata_decoding
);
criterion_main!(benches);
