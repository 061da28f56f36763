//! # MEA Loop Binary
//!
//! Runs one closed-loop experiment described by a TOML file.
//!
//! # Usage
//!
//! ```bash
//! # Mock array, debug stream
//! mea_loop --config config/experiment.toml
//!
//! # Override the driver and stop after 30 s
//! mea_loop --config config/experiment.toml --driver empty --runtime 30
//!
//! # Verbose JSON logs
//! mea_loop -c config/experiment.toml -v --json
//! ```

use clap::Parser;
use mea_array::DriverRegistry;
use mea_common::config::ConfigLoader;
use mea_common::consts::DEFAULT_CONFIG_PATH;
use mea_loop::{ExperimentConfig, Runner};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// MEA Loop - closed-loop stimulation runner
#[derive(Parser, Debug)]
#[command(name = "mea_loop")]
#[command(version)]
#[command(about = "Closed-loop stimulation runner for microelectrode arrays")]
#[command(long_about = None)]
struct Args {
    /// Path to the experiment configuration (experiment.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Array driver, overrides `[array] driver`
    #[arg(short, long)]
    driver: Option<String>,

    /// Runtime in seconds, overrides `runtime_s`
    #[arg(short, long)]
    runtime: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Experiment failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Config is read before tracing so its log level can apply.
    let loaded = ExperimentConfig::load_validated(&args.config);
    let level = match &loaded {
        Ok(config) => config.shared.log_level.as_directive(),
        Err(_) => "info",
    };
    setup_tracing(&args, level);
    let mut config = loaded?;

    info!(
        "MEA Loop v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    if let Some(driver) = args.driver {
        info!("Driver from CLI: {}", driver);
        config.array.driver = driver;
    }
    if let Some(runtime) = args.runtime {
        config.runtime_s = Some(runtime);
    }

    let registry = DriverRegistry::with_builtin();
    info!("Available drivers: {:?}", registry.list_drivers());

    let mut runner = Runner::new(config, registry);
    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let report = runner.run()?;
    info!(
        "Experiment done: {} batches ({} dropped), {} samples, {} triggers, {} programs",
        report.ingestion.batches,
        report.ingestion.dropped,
        report.activity.samples,
        report.triggers,
        report.programs
    );
    Ok(())
}

/// Setup tracing subscriber from the configured level and CLI flags.
fn setup_tracing(args: &Args, level: &str) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
