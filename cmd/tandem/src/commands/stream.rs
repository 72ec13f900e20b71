//! Stream command implementation.

use super::{chaos, create_output, open_input, open_trace, FileConfig};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tandem_harness::{FusedHarness, HarnessConfig};
use tandem_stream::Device;
use tandem_units::{Deserializer, Serializer, Throttle};
use tracing::{info, warn};

const LANES: usize = 8;
const A_IN: usize = 8;
const A_OUT: usize = 24;
const B_IN: usize = 24;
const B_OUT: usize = 8;

/// Arguments of `tandem stream`.
#[derive(Args)]
pub struct StreamArgs {
    /// Input file (`-` for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output file (`-` for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Stage A signal trace (`-` to disable)
    #[arg(long, default_value = "-")]
    a_trace: String,

    /// Stage B signal trace (`-` to disable)
    #[arg(long, default_value = "-")]
    b_trace: String,

    /// Idle cycles before a stage is declared dead
    #[arg(long)]
    idle_limit: Option<u64>,

    /// Scheduler iterations before the run is abandoned
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Wrap both units in seeded chaos throttles
    #[arg(long, env = "TANDEM_CHAOS_SEED")]
    chaos_seed: Option<u64>,

    /// YAML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl StreamArgs {
    fn harness_config(&self, file: HarnessConfig) -> HarnessConfig {
        let mut config = file;
        if let Some(cycles) = self.idle_limit {
            config = config.with_idle_limit(cycles);
        }
        if let Some(iterations) = self.max_iterations {
            config = config.with_max_iterations(iterations);
        }
        config
    }
}

/// Runs the stream command.
pub fn run(args: &StreamArgs) -> Result<ExitCode> {
    let file = FileConfig::load(args.config.as_deref())?;
    let config = args.harness_config(file.harness);
    info!("Streaming {} through {LANES} lanes", args.input);

    match chaos(args.chaos_seed, file.chaos) {
        Some((front, back)) => stream(
            Throttle::new(Serializer::<LANES, A_IN, A_OUT>::new(), front),
            Throttle::new(Deserializer::<LANES, B_IN, B_OUT>::new(), back),
            &config,
            args,
        ),
        None => stream(
            Serializer::<LANES, A_IN, A_OUT>::new(),
            Deserializer::<LANES, B_IN, B_OUT>::new(),
            &config,
            args,
        ),
    }
}

fn stream<A, B>(a: A, b: B, config: &HarnessConfig, args: &StreamArgs) -> Result<ExitCode>
where
    A: Device<1, A_IN, LANES, A_OUT, In = u8, Out = bool>,
    B: Device<LANES, B_IN, 1, B_OUT, In = bool, Out = u8>,
{
    let mut harness: FusedHarness<A, B, LANES, A_IN, A_OUT, B_IN, B_OUT> =
        FusedHarness::new(a, b, config);
    if let Some(trace) = open_trace(&args.a_trace)? {
        harness = harness.with_a_trace(trace);
    }
    if let Some(trace) = open_trace(&args.b_trace)? {
        harness = harness.with_b_trace(trace);
    }

    let mut source = open_input(&args.input)?;
    let mut sink = create_output(&args.output)?;
    let report = harness
        .run(&mut source, &mut sink)
        .with_context(|| "Streaming failed")?;

    eprintln!("{report}");
    info!(
        "{} bytes in, {} bytes out, {} middle bits, digest {:016x}",
        report.bytes_in, report.bytes_out, report.middle_bits, report.digest
    );

    if report.timed_out {
        warn!("Run timed out after {} iterations", report.iterations);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
