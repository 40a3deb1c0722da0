use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use store::{CommerceStore, InMemoryStore};

const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

fn bench_next_sequence_value(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();

    c.bench_function("store/next_sequence_value", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .next_sequence_value("order", "20261018", LOCK_TIMEOUT)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_contended_sequence(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/contended_sequence_16_tasks", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let handles: Vec<_> = (0..16)
                    .map(|_| {
                        let store = store.clone();
                        tokio::spawn(async move {
                            store
                                .next_sequence_value("order", "20261018", LOCK_TIMEOUT)
                                .await
                                .unwrap()
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_next_sequence_value, bench_contended_sequence);
criterion_main!(benches);
