use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relevo::routing::{stripe_index, CandidatePlan, FailoverPolicy, ReadStripeCounter};
use relevo::topology::Topology;
use relevo::{Endpoint, FailoverBehavior, OperationKind};

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("stripe_counter", |b| {
        let stripes = ReadStripeCounter::new();
        b.iter(|| black_box(stripe_index(stripes.next(), 4)))
    });

    let primary = Endpoint::new("http://primary:8080");
    let policy = FailoverPolicy::new(FailoverBehavior::AllowReadsFromSecondaries, true);
    let mut group = c.benchmark_group("candidate_plan");

    for replicas in [1usize, 4, 16].iter() {
        let destinations = (0..*replicas)
            .map(|i| Endpoint::new(format!("http://replica-{}:8080", i)))
            .collect();
        let topology = Topology::new(destinations, None);
        let stripes = ReadStripeCounter::new();

        group.bench_with_input(BenchmarkId::new("striped_read", replicas), replicas, |b, _| {
            b.iter(|| {
                black_box(CandidatePlan::build(
                    &policy,
                    OperationKind::Read,
                    &primary,
                    &topology,
                    stripes.next(),
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
