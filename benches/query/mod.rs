use criterion::{measurement::Measurement, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use flowspace::{region, FlowSpace, Interval, Space1};

use crate::Lfsr;

pub(super) fn bench(c: &mut Criterion) {
    let mut g = c.benchmark_group("query");

    for n_values in [100, 1_000, 10_000] {
        bench_param(&mut g, n_values);
    }
}

/// Measure a narrow intersection query against a space of `n_values`
/// random intervals, counting the yielded entries.
fn bench_param<M>(g: &mut BenchmarkGroup<'_, M>, n_values: usize)
where
    M: Measurement,
{
    let mut s = Space1::<u16, usize>::default();
    let mut rand = Lfsr::default();
    for i in 0..n_values {
        s.insert(region!(rand.next_interval()), i).unwrap();
    }

    let q = region!(Interval::new(42, 1042));

    g.throughput(Throughput::Elements(n_values as _));
    g.bench_function(BenchmarkId::new("n_values", n_values), |b| {
        b.iter(|| s.query(&q).count());
    });
}
