//! Train the boarding and alighting models on a CSV of stop observations
//!
//! Usage: cargo run --bin train_model -- --data data/transit_data.csv --output models

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use transit_demand::config::load_config;
use transit_demand::data::{load_records_csv, DatasetBuilder};
use transit_demand::features::{canonicalize, FieldValue, RawContext};
use transit_demand::predictor::Predictor;
use transit_demand::store::ModelStore;
use transit_demand::trainer::Trainer;
use transit_demand::Target;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train passenger demand models")]
struct Args {
    /// Training data CSV
    #[arg(short, long, default_value = "data/transit_data.csv")]
    data: PathBuf,

    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "transit_demand.toml")]
    config: PathBuf,

    /// Bundle directory, overrides `store.model_dir`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of trees, overrides `forest.n_trees`
    #[arg(short, long)]
    trees: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transit_demand=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config {:?}", args.config))?;
    if let Some(trees) = args.trees {
        config.forest.n_trees = trees;
    }
    let model_dir = args.output.unwrap_or_else(|| config.store.model_dir.clone());

    println!("===========================================");
    println!("  Passenger Demand Model Training");
    println!("===========================================\n");

    info!("Loading records from {:?}", args.data);
    let records = load_records_csv(&args.data)
        .with_context(|| format!("Failed to read training data {:?}", args.data))?;
    let dataset = DatasetBuilder::new().build(&records)?;
    println!("Dataset: {} observations\n", dataset.n_samples());

    println!(
        "Training {} trees per target (max depth {})...\n",
        config.forest.n_trees, config.forest.max_depth
    );
    let start_time = std::time::Instant::now();
    let trainer = Trainer::new(config.forest.clone(), config.training.clone());
    let bundle = trainer.train(&dataset)?;
    println!(
        "Training completed in {:.2}s\n",
        start_time.elapsed().as_secs_f64()
    );

    if let Some(metrics) = bundle.metrics() {
        println!("=== Model Evaluation ===\n");
        for target in Target::ALL {
            let m = metrics.for_target(target);
            println!("{}:", target);
            println!("  MAE:  {:.3}", m.mae);
            println!("  RMSE: {:.3}", m.rmse);
            println!("  R²:   {:.4}", m.r2);
            println!("  MAPE: {:.2}%", m.mape);
        }

        println!("\n=== Feature Importance Ranking (boarding) ===\n");
        for (i, (name, imp)) in metrics.ranked(Target::Boarding).iter().enumerate() {
            let bar = "█".repeat((imp * 40.0) as usize);
            println!("{:2}. {:20} {:.4} {}", i + 1, name, imp, bar);
        }
    }

    let store = ModelStore::new(&model_dir);
    store
        .save(&bundle)
        .with_context(|| format!("Failed to save bundle to {:?}", model_dir))?;
    println!("\nSaved model bundle to {:?}", model_dir);

    // Sample: a transit hub stop in the morning peak
    let sample = RawContext {
        stop_id: Some(FieldValue::Int(3)),
        hour: Some(FieldValue::Int(8)),
        day_of_week: Some(FieldValue::Int(0)),
        is_peak_hour: Some(FieldValue::Int(1)),
        current_occupancy: Some(FieldValue::Int(15)),
        stop_sequence: Some(FieldValue::Float(0.3)),
        historical_avg: Some(FieldValue::Float(8.5)),
    };
    let features = canonicalize(&sample)?;
    let prediction = Predictor::new(bundle.into()).predict(&features)?;

    println!("\n=== Sample Prediction ===\n");
    println!("Stop 3, Monday 08:00, occupancy 15");
    println!(
        "  Expected boarding:  {} (confidence {}%)",
        prediction.expected_boarding, prediction.confidence_boarding
    );
    println!(
        "  Expected alighting: {} (confidence {}%)",
        prediction.expected_alighting, prediction.confidence_alighting
    );

    Ok(())
}
