//! Patronage: weekly customer patronage forecast CLI
//!
//! This is the main entrypoint that orchestrates data loading, model fitting,
//! reporting and visualization.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use patronage::{print_report, run, viz, write_json, Args};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // A missing .env file is fine; values then come from the environment and flags
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.to_config().context("invalid configuration")?;
    let start_time = Instant::now();

    let report = run(&config)
        .with_context(|| format!("forecasting patronage from {}", config.input.display()))?;
    print_report(&report);

    if config.render_figures {
        let figures = viz::generate_figures(&report, &config.figures_dir)?;
        println!("\nFigures saved to: {}", config.figures_dir.display());
        for path in &figures {
            println!("  {}", path.display());
        }
    }

    if let Some(path) = &config.json_output {
        write_json(&report, path)
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "pipeline complete"
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "patronage=debug" } else { "patronage=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
