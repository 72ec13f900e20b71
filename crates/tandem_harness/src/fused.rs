//! Fused two-stage streaming.
//!
//! Stage A turns a byte stream into `L` bit lanes; stage B turns those lanes
//! back into bytes. Each middle lane is a [`BitLane`], so bits stage B is
//! shown but does not take are pushed back at the head. The [`Scheduler`]
//! decides every iteration which stage advances.

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::scheduler::{Decision, LaneState, Occupancy, Scheduler, StallTracker};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use tandem_stream::{
    BitLane, ByteLane, Device, Offer, SignalTrace, Stage, StageLink, StepReport, Transfer,
};
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::Xxh64;

/// Outcome of a fused run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    /// Cycles stepped by stage A.
    pub a_cycles: u64,
    /// Cycles stepped by stage B.
    pub b_cycles: u64,
    /// Stage A cycles without any transfer.
    pub a_stalls: u64,
    /// Stage B cycles without any transfer.
    pub b_stalls: u64,
    /// Outer scheduler iterations.
    pub iterations: u64,
    /// Iterations in which neither stage qualified.
    pub forced_steps: u64,
    /// Bytes read from the source.
    pub bytes_in: u64,
    /// Bytes produced by stage B.
    pub bytes_out: u64,
    /// Bits stage A put on the middle lanes.
    pub middle_bits: u64,
    /// `xxh64` digest of the produced bytes.
    pub digest: u64,
    /// The run ended through the idle bound or the iteration cap.
    pub timed_out: bool,
}

impl fmt::Display for StreamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycles: {:>5} {:>5}", self.a_cycles, self.b_cycles)?;
        if self.timed_out {
            write!(f, " (timeout)")?;
        }
        Ok(())
    }
}

struct FrontLink<'a, const L: usize> {
    input: &'a mut ByteLane,
    middle: &'a mut [BitLane; L],
    capacity: usize,
}

impl<const L: usize> StageLink<u8, bool> for FrontLink<'_, L> {
    fn offer(&mut self, _lane: usize, dst: &mut [u8]) -> tandem_stream::Result<Offer> {
        Ok(self.input.offer(dst))
    }

    fn accept(&mut self, _lane: usize, _presented: &[u8], transfer: Transfer) -> tandem_stream::Result<()> {
        self.input.consume(transfer.consumed);
        if transfer.restart {
            self.input.close();
        }
        Ok(())
    }

    fn room(&self, lane: usize) -> usize {
        self.capacity.saturating_sub(self.middle[lane].size())
    }

    fn deliver(&mut self, lane: usize, data: &[bool], transfer: Transfer) -> tandem_stream::Result<()> {
        let middle = &mut self.middle[lane];
        middle.extend(data)?;
        middle.last |= transfer.restart;
        Ok(())
    }
}

struct BackLink<'a, const L: usize> {
    middle: &'a mut [BitLane; L],
    output: &'a mut ByteLane,
    digest: &'a mut Xxh64,
    done: &'a mut bool,
}

impl<const L: usize> StageLink<bool, u8> for BackLink<'_, L> {
    fn offer(&mut self, lane: usize, dst: &mut [bool]) -> tandem_stream::Result<Offer> {
        self.middle[lane].offer(dst)
    }

    fn accept(&mut self, lane: usize, presented: &[bool], transfer: Transfer) -> tandem_stream::Result<()> {
        let middle = &mut self.middle[lane];
        middle.restore(presented, transfer.consumed)?;
        if transfer.restart {
            middle.close();
        }
        Ok(())
    }

    fn room(&self, _lane: usize) -> usize {
        self.output.room()
    }

    fn deliver(&mut self, _lane: usize, data: &[u8], transfer: Transfer) -> tandem_stream::Result<()> {
        self.output.extend(data)?;
        self.digest.update(data);
        *self.done |= transfer.restart;
        Ok(())
    }
}

/// Two stages coupled through `L` bit lanes.
///
/// Stage A has one byte input lane of width `AI` and `L` bit output lanes
/// of width `AO`; stage B has `L` bit input lanes of width `BI` and one
/// byte output lane of width `BO`.
#[derive(Debug)]
pub struct FusedHarness<
    A,
    B,
    const L: usize,
    const AI: usize,
    const AO: usize,
    const BI: usize,
    const BO: usize,
> {
    a: Stage<A, 1, AI, L, AO>,
    b: Stage<B, L, BI, 1, BO>,
    input: ByteLane,
    middle: [BitLane; L],
    output: ByteLane,
    output_done: bool,
    lane_capacity: usize,
    scheduler: Scheduler,
    stalls: StallTracker,
    max_iterations: Option<u64>,
}

impl<A, B, const L: usize, const AI: usize, const AO: usize, const BI: usize, const BO: usize>
    FusedHarness<A, B, L, AI, AO, BI, BO>
where
    A: Device<1, AI, L, AO, In = u8, Out = bool>,
    B: Device<L, BI, 1, BO, In = bool, Out = u8>,
{
    /// Couples two devices under the given configuration.
    pub fn new(a: A, b: B, config: &HarnessConfig) -> Self {
        let lane_capacity = config.lane_capacity.unwrap_or(2 * (AO + BI));
        let low_water = config
            .low_water
            .unwrap_or_else(|| lane_capacity.saturating_sub(AO));
        let high_water = config.high_water.unwrap_or(BI);

        Self {
            a: Stage::new("stage-a", a, config.idle_limit),
            b: Stage::new("stage-b", b, config.idle_limit),
            input: ByteLane::new(AI),
            middle: std::array::from_fn(|_| BitLane::new()),
            output: ByteLane::new(BO),
            output_done: false,
            lane_capacity,
            scheduler: Scheduler::new(low_water, high_water, config.stall_override),
            stalls: StallTracker::default(),
            max_iterations: config.max_iterations,
        }
    }

    /// Records stage A's signals to `trace`.
    #[must_use]
    pub fn with_a_trace(mut self, trace: SignalTrace) -> Self {
        self.a = self.a.with_trace(trace);
        self
    }

    /// Records stage B's signals to `trace`.
    #[must_use]
    pub fn with_b_trace(mut self, trace: SignalTrace) -> Self {
        self.b = self.b.with_trace(trace);
        self
    }

    fn occupancy(&self) -> Occupancy<L> {
        Occupancy {
            lanes: std::array::from_fn(|lane| LaneState {
                size: self.middle[lane].size(),
                last: self.middle[lane].last,
            }),
            input_available: self.input.is_full() || self.input.last,
            output_empty: self.output.is_empty(),
            output_done: self.output_done,
        }
    }

    fn step_a(&mut self) -> tandem_stream::Result<StepReport<1, L>> {
        let mut link = FrontLink {
            input: &mut self.input,
            middle: &mut self.middle,
            capacity: self.lane_capacity,
        };
        let report = self.a.step(&mut link)?;
        self.stalls
            .record_a(report.input_moved(), report.output_moved());
        Ok(report)
    }

    fn step_b(&mut self, digest: &mut Xxh64) -> tandem_stream::Result<StepReport<L, 1>> {
        let mut link = BackLink {
            middle: &mut self.middle,
            output: &mut self.output,
            digest,
            done: &mut self.output_done,
        };
        let report = self.b.step(&mut link)?;
        self.stalls
            .record_b(report.input_moved(), report.output_moved());
        Ok(report)
    }

    fn iterate(&mut self, report: &mut StreamReport, digest: &mut Xxh64) -> tandem_stream::Result<()> {
        let go_a = self.scheduler.wants_a(&self.occupancy(), &self.stalls);
        if go_a {
            report.middle_bits += self.step_a()?.produced() as u64;
        }

        let go_b = self.scheduler.wants_b(&self.occupancy(), &self.stalls);
        if go_b {
            report.bytes_out += self.step_b(digest)?.produced() as u64;
        }

        let decision = Decision::resolve(go_a, go_b);
        if decision.forced {
            debug!(iteration = report.iterations, "neither stage qualified, stepping both");
            report.forced_steps += 1;
            report.middle_bits += self.step_a()?.produced() as u64;
            report.bytes_out += self.step_b(digest)?.produced() as u64;
        }
        Ok(())
    }

    /// Streams `source` through both stages into `sink`.
    ///
    /// A stage exceeding its idle bound, or the iteration cap, ends the run
    /// with `timed_out` set; traces are flushed either way.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, allocation failure or a protocol
    /// violation.
    pub fn run(&mut self, source: &mut impl Read, sink: &mut impl Write) -> Result<StreamReport> {
        self.a.reset()?;
        self.b.reset()?;
        info!(lanes = L, "fused run started");

        let mut report = StreamReport::default();
        let mut digest = Xxh64::new(0);

        while !self.output_done || !self.output.is_empty() {
            if self.max_iterations.is_some_and(|max| report.iterations >= max) {
                warn!(iterations = report.iterations, "iteration cap reached");
                report.timed_out = true;
                break;
            }

            report.bytes_in += self.input.fill_from(source)? as u64;

            match self.iterate(&mut report, &mut digest) {
                Ok(()) => {}
                Err(e) if e.is_deadlock() => {
                    report.timed_out = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            self.output.drain_to(sink)?;
            report.iterations += 1;
        }

        // whatever was produced before a timeout still goes out
        self.output.drain_to(sink)?;
        sink.flush()?;
        self.a.finish()?;
        self.b.finish()?;

        report.a_cycles = self.a.cycles();
        report.b_cycles = self.b.cycles();
        report.a_stalls = self.a.stall_cycles();
        report.b_stalls = self.b.stall_cycles();
        report.digest = digest.digest();

        info!(
            a_cycles = report.a_cycles,
            b_cycles = report.b_cycles,
            timed_out = report.timed_out,
            "fused run finished"
        );
        Ok(report)
    }
}
