pub mod area;
pub mod axis;
pub mod config;
pub mod coverage;
pub mod data;
pub mod error;
pub mod processing;
pub mod projection;
pub mod report;
pub mod sample;
pub mod types;

#[cfg(test)]
mod test_utils;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute both layers' areas and the coverage percentage
    Reconcile {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a random sample of a layer's records without geometry
    Sample {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_enum)]
        layer: LayerArg,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayerArg {
    NatureTypes,
    Coverage,
}

impl From<LayerArg> for data::Layer {
    fn from(arg: LayerArg) -> Self {
        match arg {
            LayerArg::NatureTypes => data::Layer::NatureTypes,
            LayerArg::Coverage => data::Layer::Coverage,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile { config, json } => {
            tracing::info!("Reconciling areas with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;

            // 1. Open the data-access context for this run
            let session = data::Session::open(app_config)?;

            // 2. Load, measure and aggregate
            let reconciliation = processing::process_layers(&session)?;
            let summary = report::Summary::from_reconciliation(&reconciliation);

            // 3. Report
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary);
            }

            let output = &session.config().output;
            if let Some(path) = &output.json {
                report::write_json(&summary, path)?;
            }
            if let Some(dir) = &output.records_dir {
                report::write_records_csv(&reconciliation.nature_types, dir)?;
                report::write_records_csv(&reconciliation.coverage, dir)?;
            }
        }
        Commands::Sample {
            config,
            layer,
            count,
            seed,
        } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let session = data::Session::open(app_config)?;
            sample::print_sample(&session, layer.into(), count, seed)?;
        }
    }

    Ok(())
}
