//! CSV signal traces of sampled port registers.

use crate::channel::Direction;
use crate::device::{Element, Registers};
use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Point within a cycle at which registers are sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Reset pulse.
    Reset,
    /// After the handshake settled, clock high.
    Settle,
    /// After the falling edge.
    Fall,
}

#[derive(Serialize)]
struct TraceRow {
    time: u64,
    phase: Phase,
    port: Direction,
    lane: usize,
    valid: usize,
    ready: usize,
    last: bool,
    restart: bool,
}

/// Writes one row per lane each time the registers are sampled.
pub struct SignalTrace {
    writer: csv::Writer<Box<dyn Write>>,
    time: u64,
}

impl std::fmt::Debug for SignalTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalTrace")
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl SignalTrace {
    /// Creates a trace writing to the given sink.
    pub fn new(sink: Box<dyn Write>) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
            time: 0,
        }
    }

    /// Creates a trace file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    /// Returns the number of samples taken so far.
    pub const fn time(&self) -> u64 {
        self.time
    }

    /// Records every lane of the register file and advances trace time.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn sample<I, O, const IL: usize, const IW: usize, const OL: usize, const OW: usize>(
        &mut self,
        phase: Phase,
        registers: &Registers<I, O, IL, IW, OL, OW>,
    ) -> Result<()>
    where
        I: Element,
        O: Element,
    {
        let inputs = registers
            .input
            .iter()
            .map(|p| (Direction::Input, p.valid, p.ready, p.last, p.restart));
        let outputs = registers
            .output
            .iter()
            .map(|p| (Direction::Output, p.valid, p.ready, p.last, p.restart));

        let mut lanes = [0usize; 2];
        for (port, valid, ready, last, restart) in inputs.chain(outputs) {
            let lane = &mut lanes[usize::from(port == Direction::Output)];
            self.writer.serialize(TraceRow {
                time: self.time,
                phase,
                port,
                lane: *lane,
                valid,
                ready,
                last,
                restart,
            })?;
            *lane += 1;
        }

        self.time += 1;
        Ok(())
    }

    /// Flushes buffered rows to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be flushed.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sample_writes_one_row_per_lane() {
        let path = std::env::temp_dir().join(format!("tandem-trace-{}.csv", std::process::id()));
        let mut trace = SignalTrace::create(&path).unwrap();

        let mut registers = Registers::<u8, bool, 1, 4, 2, 8>::default();
        registers.input[0].valid = 3;
        registers.output[1].last = true;

        trace.sample(Phase::Settle, &registers).unwrap();
        trace.sample(Phase::Fall, &registers).unwrap();
        trace.flush().unwrap();
        drop(trace);

        let contents = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "time,phase,port,lane,valid,ready,last,restart");
        assert_eq!(lines.len(), 1 + 2 * 3);
        assert_eq!(lines[1], "0,settle,input,0,3,0,false,false");
        assert_eq!(lines[3], "0,settle,output,1,0,0,true,false");
        assert!(lines[4].starts_with("1,fall,input,0"));
    }
}
