use criterion::{measurement::Measurement, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use flowspace::{region, FlowSpace, Space1, Space2};

use crate::Lfsr;

pub(super) fn bench(c: &mut Criterion) {
    let mut g = c.benchmark_group("insert");

    for n_values in [1, 100, 1_000, 10_000] {
        bench_rank1(&mut g, n_values);
    }
    for n_values in [100, 1_000] {
        bench_rank2(&mut g, n_values);
    }
}

/// Measure the time needed to insert `n_values` randomly generated
/// intervals into an empty rank-1 space.
fn bench_rank1<M>(g: &mut BenchmarkGroup<'_, M>, n_values: usize)
where
    M: Measurement,
{
    g.throughput(Throughput::Elements(n_values as _)); // Entries inserted per second
    g.bench_function(BenchmarkId::new("rank1_n_values", n_values), |b| {
        b.iter_batched(
            || (Space1::<u16, usize>::default(), Lfsr::default()),
            |(mut s, mut rand)| {
                for i in 0..n_values {
                    s.insert(region!(rand.next_interval()), i).unwrap();
                }
                s
            },
            criterion::BatchSize::PerIteration,
        );
    });
}

/// As [`bench_rank1`], with a second dimension per entry.
fn bench_rank2<M>(g: &mut BenchmarkGroup<'_, M>, n_values: usize)
where
    M: Measurement,
{
    g.throughput(Throughput::Elements(n_values as _));
    g.bench_function(BenchmarkId::new("rank2_n_values", n_values), |b| {
        b.iter_batched(
            || (Space2::<u16, u16, usize>::default(), Lfsr::default()),
            |(mut s, mut rand)| {
                for i in 0..n_values {
                    let r = region!(rand.next_interval(), rand.next_interval());
                    s.insert(r, i).unwrap();
                }
                s
            },
            criterion::BatchSize::PerIteration,
        );
    });
}
