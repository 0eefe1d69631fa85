use criterion::{black_box, criterion_group, criterion_main, Criterion};
use site_shield::core::ledger::AbuseLedger;
use site_shield::utils::now_millis;

fn ledger_benchmark(c: &mut Criterion) {
    let ledger = AbuseLedger::new(100);
    let window_ms = 15 * 60 * 1000;

    c.bench_function("check_and_increment_single_key", |b| {
        let now = now_millis();
        b.iter(|| black_box(ledger.check_and_increment("general:203.0.113.7", u32::MAX, window_ms, now)))
    });

    c.bench_function("check_and_increment_spread_keys", |b| {
        let now = now_millis();
        let mut i: u64 = 0;
        b.iter(|| {
            i = i.wrapping_add(1);
            let key = format!("general:10.{}.{}.{}", i % 256, (i / 256) % 256, i % 199);
            black_box(ledger.check_and_increment(&key, 100, window_ms, now))
        })
    });

    c.bench_function("block_remaining_lookup", |b| {
        let now = now_millis();
        ledger.check_and_increment("general:198.51.100.99", 1, window_ms, now);
        ledger.block("general:198.51.100.99", now, 3_600_000);
        b.iter(|| black_box(ledger.block_remaining("general:198.51.100.99", now + 1_000)))
    });
}

criterion_group!(benches, ledger_benchmark);
criterion_main!(benches);
