//! Benchmarks for pruning, the block cache and prefetch ranking.

use std::collections::HashSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use microblock_prefetch::cache::BlockCache;
use microblock_prefetch::catalog::Catalog;
use microblock_prefetch::config::SchedulerConfig;
use microblock_prefetch::prefetch::{PredictionMapping, PrefetchScheduler, TransitionModel};
use microblock_prefetch::prune::predicate::{CmpOp, Predicate};
use microblock_prefetch::prune::Pruner;
use microblock_prefetch::store::memory::MemoryStore;

fn bench_pruning(c: &mut Criterion) {
    // 10,000 blocks of 100 consecutive values each.
    let ranges: Vec<(i64, i64)> = (0..10_000).map(|i| (i * 100, i * 100 + 99)).collect();
    let store = MemoryStore::from_ranges("v", &ranges, 100);
    let catalog = Catalog::build("t", &store);
    let pruner = Pruner::default();

    let predicate = Predicate::between("v", 250_000, 260_000)
        .or(Predicate::in_list("v", [5, 500_050, 999_999]))
        .and(Predicate::cmp("v", CmpOp::NotEq, 7));

    c.bench_function("prune_10k_blocks", |b| {
        b.iter(|| {
            let candidates = pruner.prune(&catalog, "t", Some(black_box(&predicate)));
            black_box(candidates);
        })
    });

    c.bench_function("prune_sql_10k_blocks", |b| {
        b.iter(|| {
            let candidates = pruner.prune_sql(
                &catalog,
                "t",
                black_box("SELECT * FROM t WHERE v BETWEEN 250000 AND 260000"),
            );
            black_box(candidates);
        })
    });
}

fn bench_cache(c: &mut Criterion) {
    let cache = BlockCache::new(1_024).unwrap();
    for id in 0..1_024u64 {
        cache.put(id, Arc::new(vec![0u8; 64]));
    }

    c.bench_function("cache_get_hit", |b| {
        let mut id = 0u64;
        b.iter(|| {
            id = (id + 1) % 1_024;
            black_box(cache.get(black_box(id)));
        })
    });

    c.bench_function("cache_put_evict", |b| {
        let mut id = 1_024u64;
        b.iter(|| {
            id += 1;
            black_box(cache.put(id, Arc::new(vec![0u8; 64])));
        })
    });
}

fn bench_topk(c: &mut Criterion) {
    let sequence: Vec<u64> = (0..5_000).map(|i| (i * 7) % 2_000).collect();
    let mapping = PredictionMapping::from_block_sequence(&sequence);
    let vocab = mapping.vocab_size();
    let model = TransitionModel::fit(&mapping, &sequence);
    let scheduler =
        PrefetchScheduler::new(model, mapping, vocab, &SchedulerConfig::default()).unwrap();
    let context = &sequence[sequence.len() - 30..];
    let exclude: HashSet<u64> = (0..100).collect();

    c.bench_function("suggest_top10_vocab_2k", |b| {
        b.iter(|| {
            let suggestions =
                scheduler.suggest_topk_prefetch("bench", Some(black_box(context)), 10, Some(&exclude));
            black_box(suggestions);
        })
    });
}

criterion_group!(benches, bench_pruning, bench_cache, bench_topk);
criterion_main!(benches);
