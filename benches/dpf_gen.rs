// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

use dpf_rs::{DistributedPointFunction, DpfParameters};

pub fn bench_gen(c: &mut Criterion) {
    let mut group = c.benchmark_group("dpf gen");
    for log_domain_size in [10u32, 16, 20] {
        let dpf = DistributedPointFunction::new(DpfParameters::new(log_domain_size, 64)).unwrap();
        let alpha = thread_rng().gen_range(0..1u128 << log_domain_size);
        let beta = thread_rng().gen::<u64>() as u128;
        group.bench_with_input(
            BenchmarkId::from_parameter(log_domain_size),
            &log_domain_size,
            |b, _| b.iter(|| dpf.generate_keys(alpha, beta).unwrap()),
        );
    }
    group.finish();
}

pub fn bench_gen_incremental(c: &mut Criterion) {
    let parameters: Vec<DpfParameters> =
        (0..4).map(|i| DpfParameters::new(5 * (i + 1), 64)).collect();
    let dpf = DistributedPointFunction::new_incremental(&parameters).unwrap();
    let alpha = thread_rng().gen_range(0..1u128 << 20);
    let betas: Vec<u128> = (0..4).map(|_| thread_rng().gen::<u64>() as u128).collect();

    c.bench_function("dpf gen incremental 4x5 bits", |b| {
        b.iter(|| dpf.generate_keys_incremental(alpha, &betas).unwrap())
    });
}

criterion_group!(benches, bench_gen, bench_gen_incremental);
criterion_main!(benches);
