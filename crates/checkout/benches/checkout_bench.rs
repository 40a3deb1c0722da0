use std::sync::Arc;

use checkout::services::{Address, VariationPrice};
use checkout::{
    CheckoutConfig, Clock, CreateOrder, InMemoryCollaborators, OrderWorkflow, SystemClock,
};
use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartLine, Money, PaymentType};
use store::InMemoryStore;

fn setup() -> (OrderWorkflow<InMemoryStore>, CreateOrder) {
    let fakes = InMemoryCollaborators::new("bench_secret");
    for i in 0..10 {
        fakes.catalog.add_variation(
            format!("V-{i}"),
            VariationPrice::at(format!("P-{i}"), Money::from_major(100 + i), 1000),
        );
    }
    let user_id = UserId::new();
    let address_id = fakes
        .addresses
        .add_address(Address::new(user_id, "Bench", "1 Loop Road"));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let workflow = OrderWorkflow::new(
        InMemoryStore::new(),
        fakes.collaborators(),
        clock,
        CheckoutConfig::default(),
    );
    let request = CreateOrder {
        user_id,
        cart: (0..10)
            .map(|i| CartLine::new(format!("P-{i}"), format!("V-{i}"), 2))
            .collect(),
        shipping_address_id: address_id,
        payment_type: PaymentType::Prepaid,
        coupon_code: None,
    };
    (workflow, request)
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (workflow, request) = setup();

    c.bench_function("checkout/create_order_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                workflow.create_order(request.clone()).await.unwrap();
            });
        });
    });
}

fn bench_price_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (workflow, request) = setup();

    c.bench_function("checkout/price_cart_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                workflow
                    .pricing()
                    .price_cart(&request.cart, None)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_create_order, bench_price_cart);
criterion_main!(benches);
