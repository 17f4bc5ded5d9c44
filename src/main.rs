use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;

use kairos_distance::{
    Dataset, Distance, GlobalConstraint, MeasureConfig, NeighbourMatrix, Pointwise, TimeSeries,
    Window, pairwise,
};
use kairos_knn::{Classifier, KnnConfig, Weighting};

#[derive(Parser)]
#[command(name = "kairos")]
#[command(about = "Elastic-distance k-nearest-neighbour time series classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum MeasureKind {
    Dtw,
    Lcs,
    Erp,
    Twed,
    Euclidean,
    SquaredEuclidean,
    Manhattan,
    Chebyshev,
    Minkowski,
    Canberra,
    Cosine,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ConstraintKind {
    Unconstrained,
    SakoeChiba,
    Itakura,
}

/// Distance measure selection shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct MeasureArgs {
    /// Distance measure
    #[arg(long, value_enum, default_value = "dtw")]
    measure: MeasureKind,

    /// Global constraint for elastic measures
    #[arg(long, value_enum, default_value = "unconstrained")]
    constraint: ConstraintKind,

    /// Warping window as a percentage of the series length
    #[arg(long, default_value_t = 100.0, conflicts_with = "window_w")]
    window_r: f64,

    /// Warping window in time steps
    #[arg(long)]
    window_w: Option<usize>,

    /// LCS matching threshold
    #[arg(long, default_value_t = 0.1)]
    epsilon: f64,

    /// ERP gap value
    #[arg(long, default_value_t = 0.0)]
    g: f64,

    /// TWED stiffness
    #[arg(long, default_value_t = 0.001)]
    nu: f64,

    /// TWED deletion penalty
    #[arg(long, default_value_t = 1.0)]
    lambda: f64,

    /// Minkowski order
    #[arg(long, default_value_t = 2.0)]
    p: f64,
}

impl MeasureArgs {
    fn config(&self) -> MeasureConfig {
        let window = match self.window_w {
            Some(w) => Window::Absolute(w),
            None => Window::Relative(self.window_r),
        };
        let constraint = match self.constraint {
            ConstraintKind::Unconstrained => GlobalConstraint::Unconstrained,
            ConstraintKind::SakoeChiba => GlobalConstraint::SakoeChiba(window),
            ConstraintKind::Itakura => GlobalConstraint::Itakura(window),
        };
        let vector = |metric| MeasureConfig::Vector { metric };
        match self.measure {
            MeasureKind::Dtw => MeasureConfig::Dtw { constraint },
            MeasureKind::Lcs => MeasureConfig::Lcs {
                epsilon: self.epsilon,
                constraint,
            },
            MeasureKind::Erp => MeasureConfig::Erp {
                g: self.g,
                constraint,
            },
            MeasureKind::Twed => MeasureConfig::Twed {
                nu: self.nu,
                lambda: self.lambda,
                constraint,
            },
            MeasureKind::Euclidean => vector(Pointwise::Euclidean),
            MeasureKind::SquaredEuclidean => vector(Pointwise::SquaredEuclidean),
            MeasureKind::Manhattan => vector(Pointwise::Manhattan),
            MeasureKind::Chebyshev => vector(Pointwise::Chebyshev),
            MeasureKind::Minkowski => vector(Pointwise::Minkowski { p: self.p }),
            MeasureKind::Canberra => vector(Pointwise::Canberra),
            MeasureKind::Cosine => vector(Pointwise::Cosine),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum WeightingKind {
    Majority,
    Rank,
    Uniform,
    Fibonacci,
    Inverse,
    InverseSquared,
    Dudani,
    Macleod,
    Zavrel,
    DualUniform,
    DualDistance,
}

/// Neighbour voting parameters.
#[derive(Args, Debug, Clone)]
struct VoteArgs {
    /// Number of voting neighbours
    #[arg(long, default_value_t = 1)]
    k: usize,

    /// Number of closest neighbours discarded before voting
    #[arg(long, default_value_t = 0)]
    exclude: usize,

    /// Weighting scheme
    #[arg(long, value_enum, default_value = "majority")]
    weighting: WeightingKind,

    /// Offset added to the distance by inverse weightings
    #[arg(long, default_value_t = 0.001)]
    weight_epsilon: f64,

    /// Macleod reference neighbour position
    #[arg(long, default_value_t = 1)]
    s: usize,

    /// Macleod and Zavrel alpha
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,

    /// Zavrel beta
    #[arg(long, default_value_t = 1.0)]
    beta: f64,
}

impl VoteArgs {
    fn weighting(&self) -> Weighting {
        let epsilon = self.weight_epsilon;
        match self.weighting {
            WeightingKind::Majority => Weighting::Majority,
            WeightingKind::Rank => Weighting::Rank,
            WeightingKind::Uniform => Weighting::Uniform,
            WeightingKind::Fibonacci => Weighting::Fibonacci,
            WeightingKind::Inverse => Weighting::Inverse { epsilon },
            WeightingKind::InverseSquared => Weighting::InverseSquared { epsilon },
            WeightingKind::Dudani => Weighting::Dudani,
            WeightingKind::Macleod => Weighting::Macleod {
                s: self.s,
                alpha: self.alpha,
            },
            WeightingKind::Zavrel => Weighting::Zavrel {
                alpha: self.alpha,
                beta: self.beta,
            },
            WeightingKind::DualUniform => Weighting::DualUniform,
            WeightingKind::DualDistance => Weighting::DualDistance,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compute the distance between two inline series
    Distance {
        /// First series, comma separated (e.g. "1,2.5,3")
        #[arg(long)]
        a: String,

        /// Second series, comma separated
        #[arg(long)]
        b: String,

        #[command(flatten)]
        measure: MeasureArgs,
    },

    /// Classify a synthetic train/test split and report accuracy
    Evaluate {
        /// Number of training series
        #[arg(long, default_value_t = 150)]
        n_train: usize,

        /// Number of test series
        #[arg(long, default_value_t = 60)]
        n_test: usize,

        /// Length of every series
        #[arg(long, default_value_t = 64)]
        length: usize,

        /// Half-width of the uniform noise added to each point
        #[arg(long, default_value_t = 0.5)]
        noise: f64,

        /// Precompute the full distance and neighbour matrices first
        #[arg(long, default_value_t = false)]
        precompute: bool,

        #[command(flatten)]
        measure: MeasureArgs,

        #[command(flatten)]
        vote: VoteArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct DistanceOutput {
    measure: MeasureConfig,
    len_a: usize,
    len_b: usize,
    distance: f64,
}

#[derive(Serialize)]
struct EvaluateOutput {
    measure: MeasureConfig,
    config: KnnConfig,
    n_train: usize,
    n_test: usize,
    length: usize,
    precomputed: bool,
    accuracy: f64,
    class_accuracy: Vec<f64>,
}

fn parse_series(s: &str, name: &str) -> Result<TimeSeries> {
    let values = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid value {v:?} in series {name}"))
        })
        .collect::<Result<Vec<_>>>()?;
    TimeSeries::new(values, 0.0).with_context(|| format!("invalid series {name}"))
}

const N_CLASSES: usize = 4;

/// Noisy flat, ramp, sine and step shapes, classes assigned round-robin and
/// every series indexed by position.
fn synthetic_dataset(n: usize, length: usize, noise: f64, seed: u64) -> Result<Dataset> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let series = (0..n)
        .map(|i| {
            let class = i % N_CLASSES;
            let shift = rng.gen_range(0.0..0.2);
            let values = (0..length)
                .map(|t| {
                    let x = t as f64 / length as f64 - shift;
                    let base = match class {
                        0 => 0.0,
                        1 => 3.0 * x,
                        2 => 2.0 * (std::f64::consts::TAU * x).sin(),
                        _ => {
                            if x < 0.5 {
                                -1.0
                            } else {
                                1.5
                            }
                        }
                    };
                    base + noise * rng.gen_range(-1.0..=1.0)
                })
                .collect();
            TimeSeries::new(values, class as f64)
        })
        .collect::<Result<Vec<_>, _>>()
        .context("failed to generate synthetic series")?;
    Ok(Dataset::indexed(series))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        kairos_knn::set_global_thread_limit(threads);
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Distance { a, b, measure } => {
            let a = parse_series(&a, "a")?;
            let b = parse_series(&b, "b")?;
            let config = measure.config();
            let measure = config.build().context("invalid measure parameters")?;
            let distance = measure
                .distance(&a, &b)
                .context("distance computation failed")?;

            let output = DistanceOutput {
                measure: config,
                len_a: a.len(),
                len_b: b.len(),
                distance,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            n_train,
            n_test,
            length,
            noise,
            precompute,
            measure,
            vote,
        } => {
            let threads = cli.threads.unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
            });
            let knn_config = KnnConfig::new(vote.k)
                .context("invalid k")?
                .with_exclude(vote.exclude)
                .with_weighting(vote.weighting())
                .with_threads(threads);
            let measure_config = measure.config();
            let measure = measure_config
                .build()
                .context("invalid measure parameters")?;

            let data = synthetic_dataset(n_train + n_test, length, noise, cli.seed)?;
            let train = Dataset::new(data.as_slice()[..n_train].to_vec());
            let test = Dataset::new(data.as_slice()[n_train..].to_vec());
            info!(n_train, n_test, length, "synthetic dataset generated");

            let mut classifier = knn_config
                .build(measure)
                .context("invalid classifier configuration")?;
            if precompute {
                let distances = pairwise(classifier.measure(), data.as_slice())
                    .context("pairwise distance computation failed")?;
                let neighbours = NeighbourMatrix::from_distances(&distances);
                classifier.set_distances(Some(Arc::new(distances)));
                classifier
                    .set_neighbours(Some(Arc::new(neighbours)))
                    .context("failed to attach neighbour matrix")?;
                info!(n = data.len(), "distance matrices precomputed");
            }
            classifier
                .initialize(&train)
                .context("failed to initialize classifier")?;

            let predicted = classifier
                .classify_batch(&test)
                .context("classification failed")?;
            classifier.shutdown();

            let mut hits = [0usize; N_CLASSES];
            let mut totals = [0usize; N_CLASSES];
            for (p, series) in predicted.iter().zip(&test) {
                let class = series.label() as usize;
                totals[class] += 1;
                if *p == series.label() {
                    hits[class] += 1;
                }
            }
            let ratio = |h: usize, t: usize| if t == 0 { 0.0 } else { h as f64 / t as f64 };
            let accuracy = ratio(hits.iter().sum(), totals.iter().sum());
            info!(accuracy, "evaluation complete");

            let output = EvaluateOutput {
                measure: measure_config,
                config: knn_config,
                n_train,
                n_test,
                length,
                precomputed: precompute,
                accuracy,
                class_accuracy: hits.iter().zip(&totals).map(|(&h, &t)| ratio(h, t)).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
