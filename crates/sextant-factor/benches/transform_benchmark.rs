// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sextant_factor::factorization::{
    create_factorization, BasisFactorization, FactorizationConfig, FactorizationKind,
};
use std::hint::black_box;

const SIZES: [usize; 3] = [16, 64, 128];
const ETA_UPDATES: usize = 32;

fn random_basis(rng: &mut StdRng, m: usize) -> Vec<f64> {
    let mut b: Vec<f64> = (0..m * m).map(|_| rng.gen_range(-1.0..1.0)).collect();
    for i in 0..m {
        b[i * m + i] = m as f64 + 1.0;
    }
    b
}

/// A factorization of a random basis with `ETA_UPDATES` pivots applied.
fn prepared(kind: FactorizationKind, m: usize) -> Box<dyn BasisFactorization> {
    let mut rng = StdRng::seed_from_u64(1995);
    let mut f = create_factorization(kind, m, FactorizationConfig::default());
    f.set_basis(&random_basis(&mut rng, m))
        .unwrap_or_else(|e| panic!("random basis of size {} is singular: {}", m, e));

    for _ in 0..ETA_UPDATES {
        let p = rng.gen_range(0..m);
        let mut d: Vec<f64> = (0..m).map(|_| rng.gen_range(-0.1..0.1)).collect();
        d[p] = 1.0 + rng.gen_range(0.0..1.0);
        f.push_eta_matrix(p, &d)
            .unwrap_or_else(|e| panic!("eta update failed: {}", e));
    }
    f
}

fn bench_transformations(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_benchmark");

    for kind in [FactorizationKind::ForrestTomlin, FactorizationKind::DenseLu] {
        for m in SIZES {
            let f = prepared(kind, m);
            let y: Vec<f64> = (0..m).map(|i| i as f64).collect();
            let mut x = vec![0.0; m];

            group.throughput(Throughput::Elements(m as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("{}/forward", kind), m),
                &m,
                |b, _| {
                    b.iter(|| {
                        f.forward_transformation(black_box(&y), black_box(&mut x))
                            .unwrap_or_else(|e| panic!("forward transformation failed: {}", e));
                    })
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("{}/backward", kind), m),
                &m,
                |b, _| {
                    b.iter(|| {
                        f.backward_transformation(black_box(&y), black_box(&mut x))
                            .unwrap_or_else(|e| panic!("backward transformation failed: {}", e));
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_transformations);
criterion_main!(benches);
