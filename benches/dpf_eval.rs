// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

use dpf_rs::{DistributedPointFunction, DpfParameters};

pub fn bench_full_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("dpf full eval");
    for log_domain_size in [10u32, 14, 18] {
        let dpf = DistributedPointFunction::new(DpfParameters::new(log_domain_size, 64)).unwrap();
        let alpha = thread_rng().gen_range(0..1u128 << log_domain_size);
        let (key, _) = dpf.generate_keys(alpha, 1).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(log_domain_size),
            &log_domain_size,
            |b, _| {
                b.iter(|| {
                    let mut ctx = dpf.create_evaluation_context(key.clone()).unwrap();
                    let out: Vec<u64> = dpf.evaluate_next(&[], &mut ctx).unwrap();
                    out
                })
            },
        );
    }
    group.finish();
}

pub fn bench_pruned_incremental_eval(c: &mut Criterion) {
    let parameters = [DpfParameters::new(10, 64), DpfParameters::new(20, 64)];
    let dpf = DistributedPointFunction::new_incremental(&parameters).unwrap();
    let alpha = thread_rng().gen_range(0..1u128 << 20);
    let (key, _) = dpf.generate_keys_incremental(alpha, &[1, 2]).unwrap();
    let prefixes: Vec<u128> = (0..32).collect();

    c.bench_function("dpf eval next 32 prefixes of 2^10", |b| {
        b.iter(|| {
            let mut ctx = dpf.create_evaluation_context(key.clone()).unwrap();
            let _: Vec<u64> = dpf.evaluate_next(&[], &mut ctx).unwrap();
            let out: Vec<u64> = dpf.evaluate_next(&prefixes, &mut ctx).unwrap();
            out
        })
    });
}

criterion_group!(benches, bench_full_eval, bench_pruned_incremental_eval);
criterion_main!(benches);
