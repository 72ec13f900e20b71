//! Software-pipelined round-trip verification.
//!
//! Pages of a dump move through a ring of job slots. Every tick the loader
//! fills at most one page, the compressor and decompressor stages each run
//! until their input job is fully fed, and the finalizer checks at most one
//! job. Stage A work on a later job therefore overlaps, in simulated time,
//! with stage B work on an earlier one.
//!
//! Each stage keeps two cursors into the ring: the job it is feeding and
//! the job it is writing. They differ while the unit still holds output of
//! a job whose input it has already consumed.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::job::{Fill, Job, Phase};
use crate::report::ReportWriter;
use crate::summary::Summary;
use std::io::{Read, Write};
use tandem_stream::{Device, Offer, SignalTrace, Stage, StageLink, Transfer};
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::Xxh64;

/// Position of one stage in the job ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    /// Slot whose payload is being fed to the unit.
    input: usize,
    /// Slot receiving the unit's output.
    output: usize,
    /// Elements of the input payload already accepted.
    offset: usize,
    /// Jobs fully fed whose output has not ended yet.
    fed: usize,
}

/// Connects a stage to the job ring for one tick.
struct PhaseLink<'a> {
    jobs: &'a mut [Job],
    cursor: &'a mut Cursor,
    only_out: bool,
    floor: usize,
}

impl StageLink<u8, bool> for PhaseLink<'_> {
    fn offer(&mut self, _lane: usize, dst: &mut [u8]) -> tandem_stream::Result<Offer> {
        if self.only_out {
            return Ok(Offer::default());
        }
        let raw = &self.jobs[self.cursor.input].raw;
        let remaining = raw.len().saturating_sub(self.cursor.offset);
        let valid = remaining.min(dst.len());
        dst[..valid].copy_from_slice(&raw[self.cursor.offset..self.cursor.offset + valid]);
        Ok(Offer {
            valid,
            last: remaining <= dst.len(),
        })
    }

    fn accept(&mut self, _lane: usize, _presented: &[u8], transfer: Transfer) -> tandem_stream::Result<()> {
        self.cursor.offset += transfer.consumed;
        Ok(())
    }

    fn room(&self, _lane: usize) -> usize {
        usize::MAX
    }

    fn deliver(&mut self, _lane: usize, data: &[bool], _transfer: Transfer) -> tandem_stream::Result<()> {
        self.jobs[self.cursor.output]
            .compressed
            .extend(data, self.floor)
    }
}

impl StageLink<bool, u8> for PhaseLink<'_> {
    fn offer(&mut self, _lane: usize, dst: &mut [bool]) -> tandem_stream::Result<Offer> {
        if self.only_out {
            return Ok(Offer::default());
        }
        let compressed = &self.jobs[self.cursor.input].compressed;
        let remaining = compressed.len().saturating_sub(self.cursor.offset);
        let valid = compressed.copy_to(self.cursor.offset, dst);
        Ok(Offer {
            valid,
            last: remaining <= dst.len(),
        })
    }

    fn accept(&mut self, _lane: usize, _presented: &[bool], transfer: Transfer) -> tandem_stream::Result<()> {
        self.cursor.offset += transfer.consumed;
        Ok(())
    }

    fn room(&self, _lane: usize) -> usize {
        usize::MAX
    }

    fn deliver(&mut self, _lane: usize, data: &[u8], _transfer: Transfer) -> tandem_stream::Result<()> {
        self.jobs[self.cursor.output].push_decompressed(data, self.floor)
    }
}

/// Runs one stage for one tick.
///
/// Feeds jobs while the input slot holds a fresh job of `phase`. When it
/// does not but the output slot is still in `phase`, the stage is stepped
/// with nothing presented until that output ends.
fn advance<D, const IW: usize, const OW: usize>(
    stage: &mut Stage<D, 1, IW, 1, OW>,
    jobs: &mut [Job],
    cursor: &mut Cursor,
    phase: Phase,
    floor: usize,
) -> tandem_stream::Result<()>
where
    D: Device<1, IW, 1, OW>,
    for<'a> PhaseLink<'a>: StageLink<D::In, D::Out>,
{
    let slots = jobs.len();
    let feedable = |jobs: &[Job], cursor: &Cursor| {
        jobs[cursor.input].phase == phase && cursor.fed < slots
    };

    let only_out = !feedable(&*jobs, &*cursor);
    if only_out && jobs[cursor.output].phase != phase {
        return Ok(());
    }

    loop {
        let before = *cursor;
        let report = {
            let mut link = PhaseLink {
                jobs: &mut *jobs,
                cursor: &mut *cursor,
                only_out,
                floor,
            };
            stage.step(&mut link)?
        };

        // every job between the output and input cursors was in flight
        for i in 0..(before.fed + 1).min(slots) {
            let job = &mut jobs[(before.output + i) % slots];
            if job.phase == phase {
                job.charge(phase, !report.moved());
            }
        }

        let mut quit = false;
        if report.input[0].restart {
            cursor.input = (cursor.input + 1) % slots;
            cursor.offset = 0;
            cursor.fed += 1;
            quit |= !feedable(&*jobs, &*cursor);
        }
        if report.output[0].restart {
            let job = &mut jobs[cursor.output];
            job.phase = phase.next();
            debug!(stage = stage.name(), job = job.id, phase = %job.phase, "job handed on");
            cursor.output = (cursor.output + 1) % slots;
            cursor.fed = cursor.fed.saturating_sub(1);
            quit |= only_out && jobs[cursor.output].phase != phase;
        }
        if quit {
            return Ok(());
        }
    }
}

/// Verifies a compressor/decompressor pair over every page of a dump.
///
/// The compressor takes `CI` bytes and emits `CO` bits per cycle; the
/// decompressor takes `DI` bits and emits `DO` bytes per cycle.
#[derive(Debug)]
pub struct JobPipeline<C, D, const CI: usize, const CO: usize, const DI: usize, const DO: usize> {
    compressor: Stage<C, 1, CI, 1, CO>,
    decompressor: Stage<D, 1, DI, 1, DO>,
    jobs: Vec<Job>,
    loader: usize,
    compress: Cursor,
    decompress: Cursor,
    finalizer: usize,
    page_size: usize,
    debug_job: Option<u64>,
    summary: Summary,
}

impl<C, D, const CI: usize, const CO: usize, const DI: usize, const DO: usize>
    JobPipeline<C, D, CI, CO, DI, DO>
where
    C: Device<1, CI, 1, CO, In = u8, Out = bool>,
    D: Device<1, DI, 1, DO, In = bool, Out = u8>,
{
    /// Builds a pipeline around the two units.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration cannot run.
    pub fn new(compressor: C, decompressor: D, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            compressor: Stage::new("compressor", compressor, config.idle_limit),
            decompressor: Stage::new("decompressor", decompressor, config.idle_limit),
            jobs: (0..config.capacity).map(|_| Job::default()).collect(),
            loader: 0,
            compress: Cursor::default(),
            decompress: Cursor::default(),
            finalizer: 0,
            page_size: config.page_size,
            debug_job: config.debug_job,
            summary: Summary::default(),
        })
    }

    /// Records the compressor's signals to `trace`.
    #[must_use]
    pub fn with_compress_trace(mut self, trace: SignalTrace) -> Self {
        self.compressor = self.compressor.with_trace(trace);
        self
    }

    /// Records the decompressor's signals to `trace`.
    #[must_use]
    pub fn with_decompress_trace(mut self, trace: SignalTrace) -> Self {
        self.decompressor = self.decompressor.with_trace(trace);
        self
    }

    /// Statistics gathered so far; complete once [`run`](Self::run) returns,
    /// including when it returns a deadlock.
    pub const fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Every slot is free or marks the end of the dump, and the end has
    /// been reached.
    fn is_finished(&self) -> bool {
        self.jobs
            .iter()
            .all(|j| matches!(j.phase, Phase::Load | Phase::Done))
            && self.jobs.iter().any(|j| j.phase == Phase::Done)
    }

    fn next_slot(&self, slot: usize) -> usize {
        (slot + 1) % self.jobs.len()
    }

    fn load(&mut self, source: &mut impl Read) -> Result<()> {
        let job = &mut self.jobs[self.loader];
        if job.phase != Phase::Load {
            return Ok(());
        }

        match job.fill(source, self.page_size)? {
            Fill::Partial => {}
            Fill::Exhausted => {
                debug!(pages = self.summary.total_pages, "dump exhausted");
                job.phase = Phase::Done;
            }
            Fill::Complete => {
                let zero = job.is_zero();
                self.summary.record_page(job.raw.len(), zero);
                if zero {
                    job.raw.clear();
                } else {
                    job.id = self.summary.nonzero_pages - 1;
                    job.phase = Phase::Compress;
                    debug!(job = job.id, bytes = job.raw.len(), "page loaded");
                    self.loader = self.next_slot(self.loader);
                }
            }
        }
        Ok(())
    }

    fn finalize<W: Write>(&mut self, report: &mut ReportWriter<W>, digest: &mut Xxh64) -> Result<()> {
        let job = &mut self.jobs[self.finalizer];
        if job.phase != Phase::Finalize {
            return Ok(());
        }

        let passed = job.verify();
        if !passed {
            warn!(
                job = job.id,
                raw = job.raw.len(),
                decompressed = job.decompressed.len(),
                "round trip mismatch"
            );
        }
        self.summary.record_result(passed, job.compressed.len());
        digest.update(&job.decompressed);

        report.record(job, passed)?;
        if self.debug_job == Some(job.id) {
            report.debug_dump(job)?;
        }

        job.recycle();
        self.finalizer = self.next_slot(self.finalizer);
        Ok(())
    }

    fn tick<W: Write>(
        &mut self,
        source: &mut impl Read,
        report: &mut ReportWriter<W>,
        digest: &mut Xxh64,
    ) -> Result<()> {
        self.load(source)?;
        advance(
            &mut self.compressor,
            &mut self.jobs,
            &mut self.compress,
            Phase::Compress,
            self.page_size,
        )?;
        advance(
            &mut self.decompressor,
            &mut self.jobs,
            &mut self.decompress,
            Phase::Decompress,
            self.page_size,
        )?;
        self.finalize(report, digest)
    }

    /// Verifies every page of `source`, writing one report row per job and
    /// the trailer.
    ///
    /// On a hardware deadlock the trailer is still written, marked as a
    /// timeout, and the deadlock is returned; [`summary`](Self::summary)
    /// then holds the partial statistics.
    ///
    /// # Errors
    ///
    /// Returns `HardwareDeadlock` if a stage exceeds its idle bound, or an
    /// I/O, allocation, protocol or report error.
    pub fn run<W: Write>(&mut self, source: &mut impl Read, report: &mut ReportWriter<W>) -> Result<Summary> {
        self.compressor.reset()?;
        self.decompressor.reset()?;
        info!(slots = self.jobs.len(), page_size = self.page_size, "verification started");

        let mut digest = Xxh64::new(0);
        let mut deadlock = None;
        while !self.is_finished() {
            match self.tick(source, report, &mut digest) {
                Ok(()) => {}
                Err(e) if e.is_deadlock() => {
                    self.summary.timed_out = true;
                    deadlock = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.summary.compress_cycles = self.compressor.cycles();
        self.summary.decompress_cycles = self.decompressor.cycles();
        self.summary.compress_stalls = self.compressor.stall_cycles();
        self.summary.decompress_stalls = self.decompressor.stall_cycles();
        self.summary.digest = digest.digest();

        report.trailer(&self.summary)?;
        report.flush()?;
        self.compressor.finish()?;
        self.decompressor.finish()?;

        info!(
            passed = self.summary.passed_pages,
            failed = self.summary.failed_pages,
            timed_out = self.summary.timed_out,
            "verification finished"
        );
        match deadlock {
            Some(e) => Err(e),
            None => Ok(self.summary.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tandem_stream::Registers;
    use tandem_units::generators::{dump, throttle_config};
    use tandem_units::{Blackhole, Deserializer, Serializer, Throttle};
    use xxhash_rust::xxh64::xxh64;

    type Compressor = Serializer<1, 8, 32>;
    type Decompressor = Deserializer<1, 32, 8>;

    fn identity(config: &PipelineConfig) -> JobPipeline<Compressor, Decompressor, 8, 32, 32, 8> {
        JobPipeline::new(Serializer::new(), Deserializer::new(), config).unwrap()
    }

    fn report() -> ReportWriter<Vec<u8>> {
        ReportWriter::new(Vec::new(), "dump.bin")
    }

    fn text(report: ReportWriter<Vec<u8>>) -> String {
        String::from_utf8_lossy(&report.into_inner().unwrap()).into_owned()
    }

    fn page(seed: u8, size: usize) -> Vec<u8> {
        (0..=255u8).cycle().skip(usize::from(seed)).take(size).collect()
    }

    /// Flips the low bit of the first byte of every output chunk.
    #[derive(Default)]
    struct Corrupt(Decompressor);

    impl Device<1, 32, 1, 8> for Corrupt {
        type In = bool;
        type Out = u8;

        fn registers(&self) -> &Registers<bool, u8, 1, 32, 1, 8> {
            self.0.registers()
        }

        fn registers_mut(&mut self) -> &mut Registers<bool, u8, 1, 32, 1, 8> {
            self.0.registers_mut()
        }

        fn eval(&mut self) {
            self.0.eval();
            let out = &mut self.0.registers_mut().output[0];
            if out.valid > 0 {
                out.data[0] ^= 1;
            }
        }
    }

    #[test]
    fn zero_pages_are_counted_but_not_verified() {
        let mut input = page(1, 4096);
        input.extend(vec![0u8; 4096]);
        input.extend(page(9, 4096));

        let mut pipeline = identity(&PipelineConfig::default());
        let mut out = report();
        let summary = pipeline.run(&mut input.as_slice(), &mut out).unwrap();

        assert_eq!(summary.total_pages, 3);
        assert_eq!(summary.total_bytes, 3 * 4096);
        assert_eq!(summary.nonzero_pages, 2);
        assert_eq!(summary.passed_pages, 2);
        assert_eq!(summary.failed_pages, 0);
        assert_eq!(summary.compressed_bits, 2 * 4096 * 8);
        assert_eq!(summary.exit_code(), 0);
        assert!(!summary.timed_out);

        let mut decompressed = page(1, 4096);
        decompressed.extend(page(9, 4096));
        assert_eq!(summary.digest, xxh64(&decompressed, 0));

        let text = text(out);
        let rows: Vec<&str> = text.lines().take_while(|l| !l.starts_with("*****")).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("dump.bin,0,pass,4096,32768,"));
        assert!(rows[2].starts_with("dump.bin,1,pass,4096,32768,"));
        assert!(text.contains("***** FINISHED *****\n"));
        assert!(text.contains("pass rate: 1.000000\n"));
    }

    #[test]
    fn silent_decompressor_times_out() {
        let config = PipelineConfig::default();
        let mut pipeline: JobPipeline<Compressor, Blackhole<1, 32, 8>, 8, 32, 32, 8> =
            JobPipeline::new(Serializer::new(), Blackhole::new(), &config).unwrap();

        let input = page(3, 4096);
        let mut out = report();
        let err = pipeline.run(&mut input.as_slice(), &mut out).unwrap_err();

        assert!(err.is_deadlock());
        assert!(err.to_string().contains("decompressor"));
        assert!(pipeline.summary().timed_out);
        assert_eq!(pipeline.summary().passed_pages, 0);
        assert!(pipeline.summary().decompress_cycles >= 5000);

        let text = text(out);
        assert!(text.starts_with("***** TIMEOUT *****\n"));
        assert!(text.contains("non-zero (pages): 1\n"));
    }

    #[test]
    fn small_ring_keeps_every_page_moving() {
        let input: Vec<u8> = (0..7u8).flat_map(|i| page(i * 11 + 1, 64)).collect();
        for capacity in 1..=3 {
            let config = PipelineConfig::default()
                .with_page_size(64)
                .with_capacity(capacity);
            let summary = identity(&config)
                .run(&mut input.as_slice(), &mut report())
                .unwrap();

            assert_eq!(summary.nonzero_pages, 7, "capacity {capacity}");
            assert_eq!(summary.passed_pages, 7, "capacity {capacity}");
            assert_eq!(summary.digest, xxh64(&input, 0));
        }
    }

    #[test]
    fn corrupted_output_fails_pages() {
        let input: Vec<u8> = (0..3u8).flat_map(|i| page(i + 5, 256)).collect();
        let config = PipelineConfig::default().with_page_size(256);
        let mut pipeline: JobPipeline<Compressor, Corrupt, 8, 32, 32, 8> =
            JobPipeline::new(Serializer::new(), Corrupt::default(), &config).unwrap();

        let mut out = report();
        let summary = pipeline.run(&mut input.as_slice(), &mut out).unwrap();

        assert_eq!(summary.failed_pages, 3);
        assert_eq!(summary.passed_pages, 0);
        assert_eq!(summary.exit_code(), 3);
        assert!(text(out).contains("dump.bin,2,fail,256,"));
    }

    #[test]
    fn empty_dump_finishes_without_rows() {
        let summary = identity(&PipelineConfig::default())
            .run(&mut b"".as_slice(), &mut report())
            .unwrap();
        assert_eq!(summary.total_pages, 0);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn truncated_last_page_is_a_short_job() {
        let mut input = page(2, 128);
        input.extend(page(4, 40));
        let config = PipelineConfig::default().with_page_size(128);

        let mut out = report();
        let summary = identity(&config).run(&mut input.as_slice(), &mut out).unwrap();

        assert_eq!(summary.total_pages, 2);
        assert_eq!(summary.total_bytes, 168);
        assert_eq!(summary.passed_pages, 2);
        assert!(text(out).contains("dump.bin,1,pass,40,320,"));
    }

    #[test]
    fn selected_job_is_dumped() {
        let input: Vec<u8> = (0..3u8).flat_map(|i| page(i + 65, 32)).collect();
        let config = PipelineConfig::default()
            .with_page_size(32)
            .with_debug_job(1);

        let mut out = report();
        identity(&config).run(&mut input.as_slice(), &mut out).unwrap();

        let text = text(out);
        assert_eq!(text.matches("| BEGIN DEBUG DUMP |").count(), 1);
        assert!(text.contains("job ID: 1\nraw: (length = 32)\n"));
    }

    #[test]
    fn in_flight_cycles_are_charged_per_job() {
        let input: Vec<u8> = (0..4u8).flat_map(|i| page(i + 1, 64)).collect();
        let config = PipelineConfig::default().with_page_size(64);

        let mut out = report();
        let summary = identity(&config).run(&mut input.as_slice(), &mut out).unwrap();

        let text = text(out);
        for row in text.lines().skip(1).take(4) {
            let fields: Vec<&str> = row.split(',').collect();
            let compress: u64 = fields[5].parse().unwrap();
            let decompress: u64 = fields[6].parse().unwrap();
            assert!(compress > 0 && compress <= summary.compress_cycles);
            assert!(decompress > 0 && decompress <= summary.decompress_cycles);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn round_trip_under_chaos(
            input in dump(48, 6),
            capacity in 1usize..4,
            front in throttle_config(),
            back in throttle_config(),
        ) {
            let config = PipelineConfig::default()
                .with_page_size(48)
                .with_capacity(capacity);
            let mut pipeline: JobPipeline<
                Throttle<Compressor, 1, 8, 1, 32>,
                Throttle<Decompressor, 1, 32, 1, 8>,
                8, 32, 32, 8,
            > = JobPipeline::new(
                Throttle::new(Serializer::new(), front),
                Throttle::new(Deserializer::new(), back),
                &config,
            )
            .unwrap();

            let summary = pipeline.run(&mut input.as_slice(), &mut report()).unwrap();

            prop_assert!(!summary.timed_out);
            prop_assert_eq!(summary.failed_pages, 0);
            prop_assert_eq!(summary.passed_pages, summary.nonzero_pages);
            prop_assert_eq!(summary.total_bytes, input.len() as u64);
        }
    }
}
