use criterion::{black_box, criterion_group, criterion_main, Criterion};
use microstructure_core::config::{OrderBookConfig, ZoneConfig};
use microstructure_core::orderbook::{OrderBookState, RestSnapshot};
use microstructure_core::preprocessor::{AggTrade, OrderFlowPreprocessor};
use std::sync::Arc;
use std::time::Instant;

fn build_preprocessor() -> OrderFlowPreprocessor {
    let book = OrderBookState::new(OrderBookConfig {
        price_precision: 2,
        ..Default::default()
    });
    book.load_snapshot(RestSnapshot {
        last_update_id: 1,
        bids: vec![("100.00".to_string(), "500".to_string())],
        asks: vec![("100.01".to_string(), "500".to_string())],
    })
    .unwrap();
    OrderFlowPreprocessor::new(Arc::new(book), ZoneConfig::default())
}

fn bench_process_trade(c: &mut Criterion) {
    let mut pre = build_preprocessor();
    let mut id = 0u64;

    c.bench_function("preprocessor/process_trade", |b| {
        b.iter(|| {
            id += 1;
            let trade = AggTrade::parse(id, "100.00", "1", 2, id % 2 == 0, Instant::now()).unwrap();
            black_box(pre.process_trade(black_box(&trade)).unwrap());
        })
    });
}

criterion_group!(benches, bench_process_trade);
criterion_main!(benches);
