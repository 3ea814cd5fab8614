//! Codec Performance Benchmarks
//!
//! Measures the per-request work of capture and replay:
//! - Body classification (inline text, spooled binary, JSON)
//! - Header folding and unfolding
//! - JSON compaction
//! - Multipart recompose
//!
//! Run with: cargo bench --bench codec_performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reqrec::capture::BodyClassifier;
use reqrec::http::Headers;
use reqrec::record::{self, FoldedHeaders, Part, PartBody};
use reqrec::replay::compact_json;
use reqrec::replay::multipart::write_parts;
use std::io::{self, Cursor};
use std::time::Duration;

// ========== Body Classification ==========

fn bench_classify(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let classifier = BodyClassifier::new(dir.path());
    let mut group = c.benchmark_group("classify");

    for size in [1024usize, 32 * 1024, 60 * 1024] {
        let text: Vec<u8> = b"lorem ipsum dolor sit amet\n".iter().copied().cycle().take(size).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("inline_text", size), &text, |b, text| {
            b.iter(|| {
                let classified = classifier
                    .classify(&mut Cursor::new(black_box(text)), "text/plain", "bench-body.dat")
                    .unwrap();
                black_box(classified);
            });
        });
    }

    let binary: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 256) as u8).collect();
    group.throughput(Throughput::Bytes(binary.len() as u64));
    group.bench_function("spool_1mb", |b| {
        b.iter(|| {
            let classified = classifier
                .classify(&mut Cursor::new(black_box(&binary)), "application/octet-stream", "bench-body.dat")
                .unwrap();
            black_box(classified);
        });
    });

    let json = format!(
        "{{\"items\": [{}]}}",
        (0..2000).map(|i| format!("{{\"id\": {}, \"name\": \"item {}\"}}", i, i)).collect::<Vec<_>>().join(", ")
    );
    group.throughput(Throughput::Bytes(json.len() as u64));
    group.bench_function("json", |b| {
        b.iter(|| {
            let classified = classifier
                .classify(&mut Cursor::new(black_box(json.as_bytes())), "application/json", "")
                .unwrap();
            black_box(classified);
        });
    });

    group.finish();
}

// ========== Header Folding ==========

fn sample_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("Host", "example.com");
    headers.insert("User-Agent", "bench/1.0");
    headers.insert("Accept", "text/html");
    headers.insert("Accept", "application/json");
    headers.insert("Content-Type", "application/json");
    for i in 0..10 {
        headers.insert("X-Forwarded-For", format!("10.0.0.{}", i));
    }
    headers.insert("Cookie", "a=1; b=2; c=3");
    headers
}

fn bench_headers(c: &mut Criterion) {
    let mut group = c.benchmark_group("headers");
    let headers = sample_headers();
    let folded = record::fold(&headers);

    group.bench_function("fold", |b| {
        b.iter(|| black_box(record::fold(black_box(&headers))));
    });
    group.bench_function("unfold", |b| {
        b.iter(|| black_box(record::unfold(black_box(&folded))));
    });
    group.bench_function("serialize", |b| {
        b.iter(|| black_box(serde_json::to_string(black_box(&folded)).unwrap()));
    });

    group.finish();
}

// ========== JSON Compaction ==========

fn bench_compact_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact_json");

    for count in [10usize, 1000] {
        let value = serde_json::json!({
            "entries": (0..count)
                .map(|i| serde_json::json!({"id": i, "label": format!("entry \"{}\"", i), "tags": ["x", "y"]}))
                .collect::<Vec<_>>()
        });
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        group.throughput(Throughput::Bytes(pretty.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &pretty, |b, pretty| {
            b.iter(|| black_box(compact_json(black_box(pretty))));
        });
    }

    group.finish();
}

// ========== Multipart Recompose ==========

fn bench_multipart(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let payload: Vec<u8> = (0..2 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("upload.bin"), &payload).unwrap();

    let mut file_header = FoldedHeaders::new();
    file_header.set("Content-Disposition", "form-data; name=\"file\"; filename=\"upload.bin\"");
    file_header.set("Content-Type", "application/octet-stream");
    let mut text_header = FoldedHeaders::new();
    text_header.set("Content-Disposition", "form-data; name=\"note\"");

    let parts = vec![
        Part {
            header: text_header,
            body: PartBody::Text("ten bytes!".to_string()),
        },
        Part {
            header: file_header,
            body: PartBody::File("upload.bin".to_string()),
        },
    ];

    let mut group = c.benchmark_group("multipart");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("write_parts_2mb", |b| {
        b.iter(|| {
            write_parts(&mut io::sink(), black_box(&parts), "bench-boundary", dir.path()).unwrap();
        });
    });
    group.finish();
}

criterion_group!(classification, bench_classify);
criterion_group!(folding, bench_headers);
criterion_group!(json, bench_compact_json);

criterion_group! {
    name = multipart;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(20);
    targets = bench_multipart
}

criterion_main!(classification, folding, json, multipart);
