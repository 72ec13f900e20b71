//! Command implementations and the file setup they share.

pub mod stream;
pub mod verify;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tandem_harness::HarnessConfig;
use tandem_stream::SignalTrace;
use tandem_units::ThrottleConfig;
use tandem_verify::PipelineConfig;
use tracing::info;

/// Path value meaning stdin, stdout or "disabled".
const STDIO: &str = "-";

/// Contents of a `--config` file; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Job pipeline settings.
    pub pipeline: PipelineConfig,
    /// Fused streaming settings.
    pub harness: HarnessConfig,
    /// Chaos settings used when a chaos seed is given.
    pub chaos: ThrottleConfig,
}

impl FileConfig {
    /// Loads `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Opens `path` for reading; `-` is stdin.
pub fn open_input(path: &str) -> Result<Box<dyn Read>> {
    if path == STDIO {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open input: {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Creates `path` for writing; `-` is stdout.
pub fn create_output(path: &str) -> Result<Box<dyn Write>> {
    if path == STDIO {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = File::create(path).with_context(|| format!("Failed to create output: {path}"))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Creates a signal trace at `path`; `-` disables tracing.
pub fn open_trace(path: &str) -> Result<Option<SignalTrace>> {
    if path == STDIO {
        return Ok(None);
    }
    SignalTrace::create(Path::new(path))
        .map(Some)
        .with_context(|| format!("Failed to create trace file: {path}"))
}

/// Chaos settings for the two units, or `None` when no seed is given.
///
/// The second unit gets the next seed so the two draw different caps.
pub fn chaos(seed: Option<u64>, base: ThrottleConfig) -> Option<(ThrottleConfig, ThrottleConfig)> {
    seed.map(|seed| {
        info!("Chaos enabled with seed {seed}, stall rate {}", base.stall_rate);
        (
            base.with_seed(seed),
            base.with_seed(seed.wrapping_add(1)),
        )
    })
}
