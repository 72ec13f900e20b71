//! Tandem CLI - co-simulation of paired stream units.
//!
//! Commands:
//! - `tandem verify` - Round-trip every page of a dump through both units
//! - `tandem stream` - Stream a file through both units coupled lane by lane

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Cycle-accurate co-simulation of a compressor/decompressor pair")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify that every page of a dump survives the round trip
    Verify(commands::verify::VerifyArgs),

    /// Stream input through both units and write what comes out
    Stream(commands::stream::StreamArgs),
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose; stdout may carry data
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Verify(args) => commands::verify::run(&args),
        Commands::Stream(args) => commands::stream::run(&args),
    }
}
