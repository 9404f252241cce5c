use criterion::{black_box, criterion_group, criterion_main, Criterion};
use microstructure_core::config::OrderBookConfig;
use microstructure_core::fixed_point::Ticks;
use microstructure_core::orderbook::{DepthDiff, OrderBookState, RestSnapshot};

fn build_book(levels: usize) -> OrderBookState {
    let book = OrderBookState::new(OrderBookConfig {
        price_precision: 2,
        max_levels: 10_000,
        ..Default::default()
    });
    let bids: Vec<(String, String)> = (0..levels)
        .map(|i| (format!("{:.2}", 100.0 - i as f64 * 0.01), "10".to_string()))
        .collect();
    let asks: Vec<(String, String)> = (0..levels)
        .map(|i| (format!("{:.2}", 100.01 + i as f64 * 0.01), "10".to_string()))
        .collect();
    book.load_snapshot(RestSnapshot {
        last_update_id: 1,
        bids,
        asks,
    })
    .unwrap();
    book
}

fn bench_update_depth(c: &mut Criterion) {
    let book = build_book(1_000);
    let mut update_id = 2u64;

    c.bench_function("orderbook/update_depth_single_level", |b| {
        b.iter(|| {
            update_id += 1;
            let diff = DepthDiff {
                first_update_id: update_id,
                final_update_id: update_id,
                bids: vec![("99.50".to_string(), "15".to_string())],
                asks: vec![],
            };
            black_box(book.update_depth(black_box(diff)).unwrap());
        })
    });
}

fn bench_sum_band(c: &mut Criterion) {
    let book = build_book(1_000);
    c.bench_function("orderbook/sum_band_20_ticks", |b| {
        b.iter(|| black_box(book.sum_band(black_box(Ticks(10000)), black_box(20))))
    });
}

fn bench_depth_metrics(c: &mut Criterion) {
    let book = build_book(1_000);
    c.bench_function("orderbook/get_depth_metrics", |b| {
        b.iter(|| black_box(book.get_depth_metrics()))
    });
}

criterion_group!(benches, bench_update_depth, bench_sum_band, bench_depth_metrics);
criterion_main!(benches);
