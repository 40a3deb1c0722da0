use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{Money, PricedLine, PricingPolicy, ProductId, SequenceCounter, VariationId};

fn make_lines(count: usize) -> Vec<PricedLine> {
    (0..count)
        .map(|i| PricedLine {
            product_id: ProductId::new(format!("P-{i}")),
            variation_id: VariationId::new(format!("V-{i}")),
            quantity: (i % 5 + 1) as u32,
            unit_price: Money::from_minor(19_999 + i as i64),
        })
        .collect()
}

fn bench_price_cart(c: &mut Criterion) {
    let policy = PricingPolicy::default();
    let mut group = c.benchmark_group("pricing/price_cart");

    for size in [1, 10, 100] {
        let lines = make_lines(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| policy.price(lines, Some(Money::from_major(50))));
        });
    }

    group.finish();
}

fn bench_sequence_advance(c: &mut Criterion) {
    let mut counter = SequenceCounter::new("order", "20261018");

    c.bench_function("sequence/advance_same_bucket", |b| {
        b.iter(|| counter.advance("20261018").order_code());
    });
}

criterion_group!(benches, bench_price_cart, bench_sequence_advance);
criterion_main!(benches);
