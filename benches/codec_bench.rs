//! Codec benchmarks: table construction and hint encode/decode throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use sudotun::codec::{canonical_key, Table};

fn bench_table_construction(c: &mut Criterion) {
    c.bench_function("table_new", |b| {
        b.iter(|| Table::new(black_box("benchmark-key")).unwrap())
    });
}

fn bench_decode_lookup(c: &mut Criterion) {
    let table = Table::new("benchmark-key").unwrap();
    let tuples: Vec<[u8; 4]> = (0..=255u8).map(|v| table.tuples_for(v)[0]).collect();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(tuples.len() as u64));
    group.bench_function("decode_window", |b| {
        b.iter(|| {
            for tuple in &tuples {
                black_box(table.decode_window(black_box(tuple)));
            }
        })
    });
    group.bench_function("canonical_key", |b| {
        b.iter(|| {
            for tuple in &tuples {
                black_box(canonical_key(black_box(tuple)));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_table_construction, bench_decode_lookup);
criterion_main!(benches);
