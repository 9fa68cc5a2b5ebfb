//! Generate synthetic stop observations for training
//!
//! Usage: cargo run --bin generate_data -- --days 180 --stops 10 --output data/transit_data.csv

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use transit_demand::data::synthetic::{self, SyntheticConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate synthetic transit demand data")]
struct Args {
    /// Number of days of history
    #[arg(short, long, default_value = "180")]
    days: usize,

    /// Number of stops on the route
    #[arg(short, long, default_value = "10")]
    stops: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output CSV path
    #[arg(short, long, default_value = "data/transit_data.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transit_demand=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = SyntheticConfig {
        num_days: args.days,
        num_stops: args.stops,
        seed: args.seed,
        ..Default::default()
    };

    info!(
        "Generating {} days of data for {} stops",
        config.num_days, config.num_stops
    );
    let rows = synthetic::generate(&config)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    synthetic::save_rows_csv(&rows, &args.output)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    info!("Saved {} rows to {:?}", rows.len(), args.output);

    // Print sample data
    println!("\nFirst 5 rows:");
    println!(
        "{:<20} {:>5} {:>13} {:>5} {:>5} {:>10} {:>10}",
        "Timestamp", "Stop", "Type", "Hour", "Peak", "Boardings", "Alightings"
    );
    println!("{}", "-".repeat(75));

    for row in rows.iter().take(5) {
        println!(
            "{:<20} {:>5} {:>13} {:>5} {:>5} {:>10} {:>10}",
            row.timestamp.format("%Y-%m-%d %H:%M"),
            row.stop_id,
            row.stop_type.name(),
            row.hour,
            row.is_peak_hour,
            row.boardings,
            row.alightings
        );
    }

    if !rows.is_empty() {
        let n = rows.len() as f64;
        let mean_b = rows.iter().map(|r| r.boardings as f64).sum::<f64>() / n;
        let mean_a = rows.iter().map(|r| r.alightings as f64).sum::<f64>() / n;
        println!("\nMean boardings:  {:.2}", mean_b);
        println!("Mean alightings: {:.2}", mean_a);
    }

    Ok(())
}
