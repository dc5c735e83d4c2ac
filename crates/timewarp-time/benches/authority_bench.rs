//! Benchmarks for the clock state authority

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use timewarp_core::{ClockDomain, Speed};
use timewarp_time::{ManualClock, RealClock, SleepPlan, TimeAuthority};

fn bench_read_virtual(c: &mut Criterion) {
    let clock = ManualClock::new(0, 0);
    let authority = TimeAuthority::new(&clock, false);
    authority.set_speed(Speed::new(2.0).unwrap(), &clock);

    c.bench_function("read_virtual_monotonic", |b| {
        b.iter(|| {
            clock.advance(1);
            let real = clock.now_ns(ClockDomain::Monotonic);
            black_box(authority.read_virtual(ClockDomain::Monotonic, black_box(real)))
        })
    });
}

fn bench_set_speed(c: &mut Criterion) {
    let clock = ManualClock::new(0, 0);
    let authority = TimeAuthority::new(&clock, true);
    let speeds = [Speed::new(0.5).unwrap(), Speed::new(4.0).unwrap()];
    let mut i = 0usize;

    c.bench_function("set_speed", |b| {
        b.iter(|| {
            clock.advance(1_000);
            authority.set_speed(black_box(speeds[i & 1]), &clock);
            i = i.wrapping_add(1);
        })
    });
}

fn bench_sleep_plan(c: &mut Criterion) {
    let speed = Speed::new(3.0).unwrap();

    c.bench_function("sleep_plan", |b| {
        b.iter(|| {
            let plan = SleepPlan::new(black_box(16_666_667), speed);
            black_box(plan.virtual_remaining(black_box(1_000_000)))
        })
    });
}

criterion_group!(benches, bench_read_virtual, bench_set_speed, bench_sleep_plan);
criterion_main!(benches);
