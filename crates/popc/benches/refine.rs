use criterion::{
    criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
};
use popc::{kmeans, rng, Clustering, Dataset, Params};
use rand::RngExt;

const NUM_ATTRIBUTES: usize = 64;
const NUM_PATTERNS: usize = 8;

/// Noisy copies of a few random prototypes.
fn generate_planted(n: usize) -> Dataset {
    let mut rng = rng::new();

    let prototypes: Vec<Vec<bool>> = (0..NUM_PATTERNS)
        .map(|_| (0..NUM_ATTRIBUTES).map(|_| rng.random::<f32>() < 0.3).collect())
        .collect();
    let rows: Vec<Vec<bool>> = (0..n)
        .map(|i| {
            prototypes[i % NUM_PATTERNS]
                .iter()
                .map(|&v| if rng.random::<f32>() < 0.05 { !v } else { v })
                .collect()
        })
        .collect();

    Dataset::from_rows(&rows).unwrap()
}

fn bench(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    let sizes = [("100", 100usize), ("500", 500usize), ("2k", 2_000usize)];

    let inputs = sizes
        .iter()
        .map(|&(label, n)| {
            let ds = generate_planted(n);
            let k = kmeans::default_num_clusters(n);
            let assignments = kmeans::initial_partition(&mut rng::new(), &ds, k).assignments;
            (label, ds, assignments)
        })
        .collect::<Vec<_>>();

    let mut group = c.benchmark_group("refine/planted");
    group.plot_config(plot_config);
    group.sample_size(10);

    for (label, ds, assignments) in &inputs {
        group.bench_with_input(BenchmarkId::from_parameter(label), ds, |b, ds| {
            b.iter_with_large_drop(|| {
                let mut clustering = Clustering::from_assignments(ds, assignments).unwrap();
                popc::refine(ds, &mut clustering, &Params::default(), &mut ()).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
