use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use sentinel_core::regex_cache::{RegexCache, RegexCacheConfig};

fn cache_hit_benchmark(c: &mut Criterion) {
    let cache = RegexCache::new(RegexCacheConfig { max_size: 500 });
    cache.get(r"^prod-.*-\d+$").unwrap();

    c.bench_function("regex_cache hit", |b| {
        b.iter(|| cache.get(black_box(r"^prod-.*-\d+$")).unwrap())
    });
}

fn cache_miss_then_compile_benchmark(c: &mut Criterion) {
    c.bench_function("regex_cache cold compile", |b| {
        b.iter_with_large_drop(|| {
            let cache = RegexCache::new(RegexCacheConfig { max_size: 500 });
            cache.get(black_box(r"^(staging|prod)-[a-z0-9]+-\d{3}$")).unwrap()
        })
    });
}

fn whole_cache_clear_eviction_benchmark(c: &mut Criterion) {
    c.bench_function("regex_cache eviction clear", |b| {
        b.iter(|| {
            let cache = RegexCache::new(RegexCacheConfig { max_size: 4 });
            for i in 0..16 {
                let pattern = format!("^pattern-{i}-.*$");
                cache.get(black_box(&pattern)).unwrap();
            }
        })
    });
}

criterion_group!(benches, cache_hit_benchmark, cache_miss_then_compile_benchmark, whole_cache_clear_eviction_benchmark);
criterion_main!(benches);
