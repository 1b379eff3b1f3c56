//! # Consolidation Benchmarks
//!
//! Performance benchmarks for decoding and flattening metrics dumps.
//!
//! Run with: `cargo bench -p jobindex-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use jobindex_core::{Consolidator, MetricsDocument, NullSink, TupleValue};
use std::hint::black_box;

/// A dump with `queries` fragments, each holding one query of `series`
/// labeled series plus the duration metric in the first fragment.
fn create_dump(queries: usize, series: usize) -> String {
    let mut dump = String::from(
        r#"{"job:duration:total:seconds":{"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1620000000,"4213.25"]}]}}}"#,
    );
    for q in 0..queries {
        let rendered: Vec<String> = (0..series)
            .map(|s| {
                format!(
                    r#"{{"metric":{{"instance":"node-{s}","job":"node-exporter"}},"value":[1620000000,"{s}.{q}"]}}"#
                )
            })
            .collect();
        dump.push_str(&format!(
            r#"
{{"query:{q}":{{"status":"success","data":{{"resultType":"vector","result":[{}]}}}}}}"#,
            rendered.join(",")
        ));
    }
    dump
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_tuple_decode(c: &mut Criterion) {
    c.bench_function("tuple_decode", |b| {
        b.iter(|| black_box(TupleValue::parse(black_box(r#"[1620000000, "4213.25"]"#))));
    });
}

fn bench_document_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_decode");

    for queries in [10, 100, 500].iter() {
        let dump = create_dump(*queries, 20);
        group.bench_with_input(BenchmarkId::from_parameter(queries), &dump, |b, dump| {
            b.iter(|| black_box(MetricsDocument::decode(dump.as_bytes())));
        });
    }

    group.finish();
}

fn bench_consolidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidate");

    for series in [10, 100, 1000].iter() {
        let dump = create_dump(20, *series);
        let document = MetricsDocument::decode(dump.as_bytes()).expect("decode");
        group.bench_with_input(BenchmarkId::from_parameter(series), &document, |b, doc| {
            b.iter(|| black_box(Consolidator::new(&NullSink).consolidate(doc)));
        });
    }

    group.finish();
}

fn bench_to_json(c: &mut Criterion) {
    let dump = create_dump(50, 50);
    let document = MetricsDocument::decode(dump.as_bytes()).expect("decode");
    let metrics = Consolidator::new(&NullSink).consolidate(&document);

    c.bench_function("metric_set_to_json", |b| {
        b.iter(|| black_box(metrics.to_json()));
    });
}

criterion_group!(
    benches,
    bench_tuple_decode,
    bench_document_decode,
    bench_consolidate,
    bench_to_json,
);

criterion_main!(benches);
