use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod bids;
mod config;
mod metrics;
mod stimuli;

#[derive(Parser)]
#[command(name = "crt")]
#[command(about = "Continuous recognition task data pipeline", long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML). Falls back to CRT_CONFIG_PATH.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Write stimuli.js listing target and filler images
    Stimuli(stimuli::StimuliArgs),
    /// Convert a survey export into per-subject trial tables
    ToBids(bids::ToBidsArgs),
    /// Score participants and write per-image memorability metrics
    Metrics(metrics::MetricsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let config = config::PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Stimuli(args) => stimuli::run(args),
        Commands::ToBids(args) => bids::run(args, &config),
        Commands::Metrics(args) => metrics::run(args, &config),
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("CRT_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("log_init_error: subscriber already set");
    }
}
