// Benchmarks for the at-rest AEAD envelope and the query-DSL tokenizer —
// the two hot paths exercised on every request (encrypt/decrypt wraps every
// save, query_breakdown runs once per socket request).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use untold::crypto;
use untold::query::query_breakdown;

fn bench_encrypt_roundtrip(c: &mut Criterion) {
    let key = vec![7u8; crypto::KEY_LEN];
    let mut group = c.benchmark_group("encrypt_roundtrip");

    for size in [64usize, 1024, 16 * 1024] {
        let plaintext = vec![b'a'; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &plaintext, |b, plaintext| {
            b.iter(|| {
                let blob = crypto::encrypt(&key, black_box(plaintext)).unwrap();
                let decrypted = crypto::decrypt(&key, &blob).unwrap();
                black_box(decrypted);
            });
        });
    }

    group.finish();
}

fn bench_query_breakdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_breakdown");

    let queries = vec![
        ("pull", "PULL Name, Age FROM t"),
        ("push", "PUSH Username = bob, Password = pw TO Users"),
        ("put", "PUT name=z TO t WHERE id = 1 AND name % bob"),
        ("delete", "DELETE FROM t WHERE id = 1"),
    ];

    for (label, query) in queries {
        group.bench_function(label, |b| {
            b.iter(|| black_box(query_breakdown(black_box(query)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encrypt_roundtrip, bench_query_breakdown);
criterion_main!(benches);
