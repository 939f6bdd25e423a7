use criterion::{Criterion, black_box, criterion_group, criterion_main};
use probemap::HashedDictionary;
use rustc_hash::FxBuildHasher;
use std::collections::HashMap;
use std::time::Duration;

/// Generates scattered u64 keys with string values for benchmarking.
fn generate_data(size: usize) -> Vec<(u64, String)> {
    (0..size as u64)
        .map(|i| {
            let key = i.wrapping_mul(0x9e37_79b9_7f4a_7c15).rotate_left(17);
            (key, format!("value-{i}"))
        })
        .collect()
}

fn benchmark_dictionary_comparison(c: &mut Criterion) {
    for &size in &[10_000, 100_000, 1_000_000] {
        let mut group = c.benchmark_group(format!("size={size}"));
        if size >= 1_000_000 {
            // Reduce sample count for large benchmarks
            group.sample_size(10);
            group.measurement_time(Duration::from_secs(30));
        }

        let data = generate_data(size);

        // --- std::collections::HashMap ---
        group.bench_function("std::HashMap - insert", |b| {
            b.iter(|| {
                let mut map: HashMap<u64, String, FxBuildHasher> = HashMap::default();
                for (k, v) in data.iter() {
                    map.insert(black_box(*k), black_box(v.clone()));
                }
            })
        });

        let std_map: HashMap<u64, String, FxBuildHasher> = data.iter().cloned().collect();
        group.bench_function("std::HashMap - get", |b| {
            b.iter(|| {
                for (k, _) in data.iter() {
                    black_box(std_map.get(black_box(k)));
                }
            })
        });

        // --- HashedDictionary ---
        group.bench_function("HashedDictionary - insert", |b| {
            b.iter(|| {
                let mut map = HashedDictionary::new();
                for (k, v) in data.iter() {
                    map.add(black_box(*k), black_box(v.clone()));
                }
            })
        });

        let dict: HashedDictionary<u64, String> = data.iter().cloned().collect();
        group.bench_function("HashedDictionary - get", |b| {
            b.iter(|| {
                for (k, _) in data.iter() {
                    black_box(dict.get_value(black_box(k)));
                }
            })
        });

        // remove then re-add, exercising tombstone reuse
        group.bench_function("HashedDictionary - churn", |b| {
            b.iter_with_setup(
                || data.iter().cloned().collect::<HashedDictionary<u64, String>>(),
                |mut map| {
                    for (k, _) in data.iter() {
                        let v = map.remove(black_box(k)).unwrap();
                        map.add(*k, v);
                    }
                },
            );
        });

        group.finish();
    }
}

criterion_group!(benches, benchmark_dictionary_comparison);
criterion_main!(benches);
