use chrono::NaiveDate;
use common::{CustomerId, Money, ProductId, PromotionId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{AddToCart, Cart, CartService, OrderService, PlaceOrder, pricing};
use rust_decimal::Decimal;
use store::{CatalogStore, InMemoryStore, OrderLine, ProductDraft, Promotion};

fn lines(count: usize) -> Vec<OrderLine> {
    (0..count)
        .map(|i| OrderLine {
            product_id: ProductId::new(i as i64 + 1),
            product_name: format!("Product {i}"),
            quantity: (i % 4) as u32 + 1,
            unit_price: Money::from_cents(1250 + i as i64 * 10),
        })
        .collect()
}

fn promotions(count: usize) -> Vec<Promotion> {
    (0..count)
        .map(|i| Promotion {
            id: PromotionId::new(i as i64 + 1),
            name: format!("Promo {i}"),
            description: String::new(),
            discount_percent: Decimal::new(5 + i as i64 % 20, 0),
            minimum_amount: Some(Money::from_units(1_000_000 - i as i64 * 1000)),
            active: i % 3 != 0,
            starts_on: None,
            ends_on: None,
        })
        .collect()
}

fn bench_price_lines(c: &mut Criterion) {
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let mut group = c.benchmark_group("pricing/price_lines");

    for (line_count, promo_count) in [(5, 3), (50, 20), (200, 100)] {
        let lines = lines(line_count);
        let promotions = promotions(promo_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{line_count}x{promo_count}")),
            &(lines, promotions),
            |b, (lines, promotions)| b.iter(|| pricing::price_lines(lines, promotions, today)),
        );
    }

    group.finish();
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let product = store
                    .create_product(ProductDraft {
                        name: "Latte".to_string(),
                        category_id: None,
                        price: Money::from_units(6000),
                        description: String::new(),
                        active: true,
                        stock: 10,
                    })
                    .await
                    .unwrap();
                let cart = CartService::new(store.clone())
                    .add(Cart::new(), AddToCart::new(product.id, 2))
                    .await
                    .unwrap();
                OrderService::new(store)
                    .place_order(PlaceOrder::new(CustomerId::new(), cart))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_price_lines, bench_place_order);
criterion_main!(benches);
