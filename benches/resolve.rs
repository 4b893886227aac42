//! Resolution performance benchmarks
//!
//! Measures the non-I/O parts of report generation: routing resolution,
//! routing table parsing and prompt assembly.
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use siteroute::config::{ApiKey, ConfigDefaults};
use siteroute::prompt::{PromptAssembler, SiteContext};
use siteroute::routing::{ConfigResolver, RoutingTable};
use std::hint::black_box;

fn routing_json(entries: usize) -> String {
    let mut table = serde_json::Map::new();
    for i in 0..entries {
        table.insert(
            i.to_string(),
            json!({"model": format!("model-{}", i % 7), "temperature": 0.5}),
        );
    }
    table.insert("*".to_string(), json!({"timeout": 20}));
    serde_json::Value::Object(table).to_string()
}

fn resolver(entries: usize) -> ConfigResolver {
    let defaults = ConfigDefaults {
        api_key: ApiKey::new("sk-bench"),
        ..ConfigDefaults::default()
    };
    let table = RoutingTable::from_json_str(&routing_json(entries), "bench")
        .expect("valid routing table");
    ConfigResolver::new(defaults, table).expect("valid resolver")
}

/// Resolution cost for hits, wildcard-only misses and growing tables
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for entries in [0usize, 10, 1_000] {
        let resolver = resolver(entries);
        group.bench_with_input(BenchmarkId::new("entity_hit", entries), &resolver, |b, r| {
            b.iter(|| r.resolve(black_box("5")));
        });
        group.bench_with_input(BenchmarkId::new("wildcard_only", entries), &resolver, |b, r| {
            b.iter(|| r.resolve(black_box("unknown-station")));
        });
    }

    group.finish();
}

/// Startup cost of parsing and validating a routing document
fn bench_table_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing_table_parse");

    for entries in [10usize, 1_000] {
        let json = routing_json(entries);
        group.bench_with_input(BenchmarkId::from_parameter(entries), &json, |b, json| {
            b.iter(|| RoutingTable::from_json_str(black_box(json), "bench"));
        });
    }

    group.finish();
}

fn bench_prompt_assembly(c: &mut Criterion) {
    let context: SiteContext = serde_json::from_value(json!({
        "station_id": "42",
        "attributes": {"상호": "Hanbit Oil", "주소": "Seoul", "위도": 37.5, "경도": 127.0},
        "recommendations": [
            {"type": "EV charging", "score": 0.9},
            {"type": "cafe", "score": 0.8},
            {"type": "parking", "score": 0.7},
            {"type": "logistics", "score": 0.6},
            {"type": "retail", "score": 0.5},
            {"type": "housing", "score": 0.4}
        ],
        "parcels": {"total_count": 30, "average_area": 250.0, "bucket_counts": {"소형": 30}}
    }))
    .expect("valid context");
    let assembler = PromptAssembler::new();

    c.bench_function("prompt_assemble", |b| {
        b.iter(|| assembler.assemble(black_box(&context)));
    });
}

criterion_group!(
    benches,
    bench_resolve,
    bench_table_parsing,
    bench_prompt_assembly
);
criterion_main!(benches);
