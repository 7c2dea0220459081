use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cozy_chess::Color;
use magpie::board::Position;
use magpie::eval::nnue::{Accumulator, AccumulatorCaches, AccumulatorStack, Networks, FT_BIG};

fn bench_incremental_vs_refresh(c: &mut Criterion) {
    let networks = Networks::embedded();
    let mut caches = AccumulatorCaches::new(&networks);

    let mut pos = Position::startpos();
    let mut stack = AccumulatorStack::new();
    stack.ensure_big(&pos, &networks.big.transformer, &mut caches.big);
    let dirty = pos.play("g1f3".parse().unwrap());

    c.bench_function("nnue_incremental_update", |b| {
        b.iter(|| {
            stack.push(black_box(dirty));
            stack.ensure_big(&pos, &networks.big.transformer, &mut caches.big);
            stack.pop();
        })
    });

    c.bench_function("nnue_full_refresh", |b| {
        b.iter(|| {
            let mut acc = Accumulator::<FT_BIG>::new();
            networks.big.transformer.refresh(black_box(&pos), Color::White, &mut acc);
            black_box(acc.values[0][0])
        })
    });
}

criterion_group!(benches, bench_incremental_vs_refresh);
criterion_main!(benches);
