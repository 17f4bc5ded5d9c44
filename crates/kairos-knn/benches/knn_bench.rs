//! Criterion benchmarks for kairos-knn: query-time classification.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use kairos_distance::{Dataset, Dtw, TimeSeries, Window};
use kairos_knn::{Classifier, KnnConfig, Weighting};

fn make_shapes(n: usize, len: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let series = (0..n)
        .map(|i| {
            let class = i % 3;
            let values = (0..len)
                .map(|t| {
                    let x = t as f64 / len as f64;
                    let base = match class {
                        0 => 0.0,
                        1 => 3.0 * x,
                        _ => 2.0 * (std::f64::consts::TAU * x).sin(),
                    };
                    base + rng.gen_range(-0.25..0.25)
                })
                .collect();
            TimeSeries::new(values, class as f64).unwrap()
        })
        .collect();
    Dataset::indexed(series)
}

fn bench_classify_threads(c: &mut Criterion) {
    let data = make_shapes(300, 128, 42);
    let train = Dataset::new(data.as_slice()[..250].to_vec());
    let query = data[260].clone();

    let mut group = c.benchmark_group("knn_classify_250x128");
    for threads in [1usize, 2, 4] {
        let mut knn = KnnConfig::new(5)
            .unwrap()
            .with_threads(threads)
            .build(Dtw::sakoe_chiba(Window::Relative(10.0)).unwrap())
            .unwrap();
        knn.initialize(&train).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(threads), &query, |b, q| {
            b.iter(|| knn.classify(q).unwrap());
        });
    }
    group.finish();
}

fn bench_weighting(c: &mut Criterion) {
    let data = make_shapes(200, 64, 7);
    let train = Dataset::new(data.as_slice()[..150].to_vec());
    let queries = Dataset::new(data.as_slice()[150..].to_vec());

    let mut group = c.benchmark_group("knn_batch_150x64_k9");
    for (name, weighting) in [
        ("majority", Weighting::Majority),
        ("dudani", Weighting::Dudani),
        ("macleod", Weighting::Macleod { s: 12, alpha: 1.0 }),
    ] {
        let mut knn = KnnConfig::new(9)
            .unwrap()
            .with_weighting(weighting)
            .build(Dtw::unconstrained())
            .unwrap();
        knn.initialize(&train).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| knn.classify_batch(&queries).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify_threads, bench_weighting);
criterion_main!(benches);
