// ml_examples/src/main.rs
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use primitive_nn::{
    confusion_matrix, export_decision_surface, load_arff, load_csv, print_model_summary,
    print_summary_table, two_clusters, xor_dataset, DataMatrix, Grid, NetworkConfig, NeuralNet,
    SupervisedLearner,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Train a backpropagation network and report its accuracy.
#[derive(Parser)]
struct Cli {
    /// ARFF or CSV file (optionally .gz); the last column is the label.
    /// Without it the built-in XOR set is used.
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,
    /// Use the synthetic two-cluster set instead of XOR.
    #[arg(long, conflicts_with = "data")]
    clusters: bool,
    /// TOML file with network hyperparameters.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Scale continuous feature columns to [0, 1].
    #[arg(long)]
    normalize: bool,
    /// Fraction of rows held out as validation set.
    #[arg(long, value_name = "FRACTION")]
    validation: Option<f64>,
    /// Override the configured seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Write the per-epoch report as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Write the decision surface of a two-feature model as a PPM image.
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,
}

fn load(path: &PathBuf) -> Result<DataMatrix> {
    let name = path.to_string_lossy().to_lowercase();
    let matrix = if name.ends_with(".csv") || name.ends_with(".csv.gz") {
        load_csv(path, true)
    } else {
        load_arff(path)
    };
    matrix.with_context(|| format!("loading {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .compact()
        .init();
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => NetworkConfig::load_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => NetworkConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let mut rng = StdRng::seed_from_u64(config.seed);

    let (mut features, mut labels) = match &args.data {
        Some(path) => load(path)?.split_labels()?,
        None if args.clusters => two_clusters(&mut rng, 50),
        None => xor_dataset(),
    };
    if args.normalize {
        features.normalize();
    }
    features.shuffle(&mut rng, Some(&mut labels))?;

    let mut net = NeuralNet::new(config.clone(), rng);
    if let Some(fraction) = args.validation {
        if !(0.0..1.0).contains(&fraction) {
            bail!("validation fraction must be in [0, 1), got {fraction}");
        }
        let held_out = (features.rows() as f64 * fraction).round() as usize;
        if held_out == 0 || held_out >= features.rows() {
            bail!("validation fraction leaves no rows on one side of the split");
        }
        let split = features.rows() - held_out;
        net.set_validation_set(
            features.select_rows(split..features.rows()),
            labels.select_rows(split..labels.rows()),
        );
        features = features.select_rows(0..split);
        labels = labels.select_rows(0..split);
        info!(training = split, validation = held_out, "split dataset");
    }

    print_model_summary(&net);
    net.train(&features, &labels)?;
    print_model_summary(&net);
    if let Some(report) = net.report() {
        print_summary_table(report, config.epoch_window * 100);
    }

    let score = net.measure_accuracy(&features, &labels)?;
    if labels.value_count(0) >= 2 {
        println!("Training accuracy: {:.2}%", score * 100.0);
        let cm = confusion_matrix(&net, &features, &labels)?;
        println!("Confusion matrix (rows = {}):", labels.attr_name(0));
        for (class, row) in cm.iter().enumerate() {
            let name = labels.attr_value(0, class).unwrap_or("?");
            println!("  {:>12}: {:?}", name, row);
        }
    } else {
        println!("Training MSE: {:.6}", score);
    }

    if let Some(path) = &args.report {
        if let Some(report) = net.report() {
            report.write_json(path)?;
            println!("Wrote report to {}", path.display());
        }
    }
    if let Some(path) = &args.image {
        if features.cols() != 2 {
            bail!("decision surface needs exactly two features, found {}", features.cols());
        }
        if let Some(network) = net.network() {
            export_decision_surface(network, &Grid::default(), path)?;
            println!("Wrote decision surface to {}", path.display());
        }
    }
    Ok(())
}
