//! blockmul CLI
//!
//! # Commands
//!
//! - `run --config job.toml`: multiply seeded random operands described by a
//!   job file and verify the product
//! - `demo`: run the built-in scenarios with known products

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod demo;
mod job_file;
mod run;

use job_file::JobFile;

/// Block-partitioned matrix multiplication over sharded tile stores
#[derive(Parser)]
#[command(name = "blockmul")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter, e.g. `debug` or `bm_engine=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Multiply the operands described by a TOML job file
    Run {
        /// Path to the job file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run the built-in scenarios
    Demo,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run { config } => handle_run(config),
        Commands::Demo => handle_demo(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn handle_run(path: PathBuf) -> Result<()> {
    let file = JobFile::load(&path)?;
    let summary = run::run_job(&file)?;
    println!("{}", summary.report);
    if let Some(diff) = summary.max_abs_diff {
        println!("verified against direct product: max |diff| = {:e}", diff);
    }
    Ok(())
}

fn handle_demo() -> Result<()> {
    for scenario in demo::scenarios()? {
        let product = scenario.run()?;
        println!(
            "{:<28} {} -> {:?}",
            scenario.name,
            product.shape(),
            product.storage().to_f64_vec()
        );
    }
    Ok(())
}
