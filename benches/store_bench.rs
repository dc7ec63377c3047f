use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use keyed_collection::{KeyRegistry, OrderedStore, Token, Value};
use std::time::Duration;

fn tokens(n: i64) -> Vec<Token> {
    let mut registry = KeyRegistry::new();
    (0..n)
        .map(|i| registry.register(&Value::Int(i)).unwrap())
        .collect()
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("store::insert_fresh_100k", |b| {
        let ts = tokens(100_000);
        b.iter_batched(
            OrderedStore::new,
            |mut s| {
                for (i, &t) in ts.iter().enumerate() {
                    s.insert(t, Value::from(i));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove_middle(c: &mut Criterion) {
    c.bench_function("store::remove_reinsert", |b| {
        let ts = tokens(50_000);
        let mut s = OrderedStore::with_capacity(ts.len());
        for &t in &ts {
            s.insert(t, Value::Null);
        }
        let mut it = ts.iter().cycle();
        b.iter(|| {
            let &t = it.next().unwrap();
            let v = s.remove(t).unwrap();
            s.insert(t, v);
        })
    });
}

fn bench_iterate(c: &mut Criterion) {
    c.bench_function("store::iterate_100k", |b| {
        let ts = tokens(100_000);
        let mut s = OrderedStore::new();
        for &t in &ts {
            s.insert(t, Value::Int(1));
        }
        b.iter(|| black_box(s.iter().rev().count()))
    });
}

fn bench_register_text(c: &mut Criterion) {
    c.bench_function("registry::register_text_10k", |b| {
        let keys: Vec<_> = (0..10_000).map(|i| Value::from(format!("key-{i}"))).collect();
        b.iter_batched(
            KeyRegistry::new,
            |mut r| {
                for k in &keys {
                    black_box(r.register(k).unwrap());
                }
                r
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_remove_middle, bench_iterate, bench_register_text
}
criterion_main!(benches);
