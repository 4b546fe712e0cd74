use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use hashq::{HashId, ResultStore, Sequencer, Sha512Base64, StatsTracker, Transform};
use std::thread::scope;

const OPS: u64 = 4096;

fn bench_sequencer(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequencer");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("next_id", |b| {
        let sequencer = Sequencer::new();
        b.iter(|| {
            for _ in 0..OPS {
                let _ = black_box(sequencer.next_id());
            }
        });
    });

    for threads in [2, 4, 8] {
        group.bench_function(format!("next_id/contended/{threads}"), |b| {
            let sequencer = Sequencer::new();
            b.iter(|| {
                scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            for _ in 0..OPS / threads {
                                let _ = black_box(sequencer.next_id());
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(OPS));

    for shards in [1, 16] {
        group.bench_function(format!("put_get/{shards}_shards"), |b| {
            let store = ResultStore::with_shards(shards);
            let value = Sha512Base64.apply(b"angryMonkey").unwrap();
            b.iter(|| {
                scope(|s| {
                    for t in 0..4 {
                        let store = &store;
                        let value = &value;
                        s.spawn(move || {
                            for i in 0..OPS / 4 {
                                let id = HashId::new(t * OPS + i + 1).unwrap();
                                store.put(id, value.clone());
                                black_box(store.get(id));
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("record_completion", |b| {
        let tracker = StatsTracker::new();
        b.iter(|| {
            for i in 0..OPS {
                black_box(tracker.record_completion(i));
            }
        });
    });

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sha512_base64", |b| {
        b.iter(|| black_box(Sha512Base64.apply(black_box(b"angryMonkey"))));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_sequencer,
    bench_store,
    bench_stats,
    bench_transform
);
criterion_main!(benches);
