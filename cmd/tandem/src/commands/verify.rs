//! Verify command implementation.

use super::{chaos, create_output, open_input, open_trace, FileConfig};
use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tandem_stream::Device;
use tandem_units::{Deserializer, Serializer, Throttle};
use tandem_verify::{JobPipeline, PipelineConfig, ReportWriter};
use tracing::{error, info, warn};

const CI: usize = 8;
const CO: usize = 32;
const DI: usize = 32;
const DO: usize = 8;

/// Arguments of `tandem verify`.
#[derive(Args)]
pub struct VerifyArgs {
    /// Page dump to verify (`-` for stdin)
    #[arg(short, long, default_value = "-")]
    dump: String,

    /// Report output (`-` for stdout)
    #[arg(short, long, default_value = "-")]
    report: String,

    /// Compressor signal trace (`-` to disable)
    #[arg(long, default_value = "-")]
    c_trace: String,

    /// Decompressor signal trace (`-` to disable)
    #[arg(long, default_value = "-")]
    d_trace: String,

    /// Job whose payloads are dumped into the report
    #[arg(long)]
    debug_job: Option<u64>,

    /// Bytes per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Job slots in flight
    #[arg(long)]
    capacity: Option<usize>,

    /// Idle cycles before a stage is declared dead
    #[arg(long)]
    idle_limit: Option<u64>,

    /// Wrap both units in seeded chaos throttles
    #[arg(long, env = "TANDEM_CHAOS_SEED")]
    chaos_seed: Option<u64>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// YAML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl VerifyArgs {
    fn pipeline_config(&self, file: PipelineConfig) -> PipelineConfig {
        let mut config = file.with_dump_name(self.dump.clone());
        if let Some(bytes) = self.page_size {
            config = config.with_page_size(bytes);
        }
        if let Some(slots) = self.capacity {
            config = config.with_capacity(slots);
        }
        if let Some(cycles) = self.idle_limit {
            config = config.with_idle_limit(cycles);
        }
        if let Some(id) = self.debug_job {
            config = config.with_debug_job(id);
        }
        config
    }
}

/// Runs the verify command.
pub fn run(args: &VerifyArgs) -> Result<ExitCode> {
    let file = FileConfig::load(args.config.as_deref())?;
    let config = args.pipeline_config(file.pipeline);
    info!("Verifying dump: {}", args.dump);

    match chaos(args.chaos_seed, file.chaos) {
        Some((front, back)) => verify(
            Throttle::new(Serializer::<1, CI, CO>::new(), front),
            Throttle::new(Deserializer::<1, DI, DO>::new(), back),
            &config,
            args,
        ),
        None => verify(
            Serializer::<1, CI, CO>::new(),
            Deserializer::<1, DI, DO>::new(),
            &config,
            args,
        ),
    }
}

fn verify<C, D>(compressor: C, decompressor: D, config: &PipelineConfig, args: &VerifyArgs) -> Result<ExitCode>
where
    C: Device<1, CI, 1, CO, In = u8, Out = bool>,
    D: Device<1, DI, 1, DO, In = bool, Out = u8>,
{
    let mut pipeline = JobPipeline::new(compressor, decompressor, config)
        .with_context(|| "Invalid pipeline configuration")?;
    if let Some(trace) = open_trace(&args.c_trace)? {
        pipeline = pipeline.with_compress_trace(trace);
    }
    if let Some(trace) = open_trace(&args.d_trace)? {
        pipeline = pipeline.with_decompress_trace(trace);
    }

    let mut source: Box<dyn Read> = open_input(&args.dump)?;
    let mut report = ReportWriter::new(create_output(&args.report)?, config.dump_name.clone());

    let outcome = pipeline.run(&mut source, &mut report);
    let summary = pipeline.summary();

    if let Some(path) = &args.summary_json {
        let json = summary.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        info!("Summary written to: {}", path.display());
    }

    if let Err(e) = outcome {
        if e.is_deadlock() {
            error!(
                "Run aborted after {} compressor / {} decompressor cycles",
                summary.compress_cycles, summary.decompress_cycles
            );
        }
        return Err(e).with_context(|| "Verification aborted");
    }

    if summary.failed_pages > 0 {
        warn!(
            "{} of {} pages failed the round trip",
            summary.failed_pages, summary.nonzero_pages
        );
    } else {
        info!("All {} non-zero pages passed", summary.passed_pages);
    }
    Ok(ExitCode::from(summary.exit_code()))
}
