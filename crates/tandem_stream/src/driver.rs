//! Multi-lane stage driver.
//!
//! A [`Stage`] advances one clocked device by exactly one cycle per
//! [`Stage::step`], applying the decoupled-stream handshake once per lane
//! in both directions. Where data comes from and goes to is supplied by a
//! [`StageLink`], so the same driver serves byte buffers, bit queues or a
//! job's payload.

use crate::channel::{Direction, Transfer};
use crate::clock::Clocked;
use crate::device::Device;
use crate::error::Result;
use crate::monitor::IdleMonitor;
use crate::trace::SignalTrace;
use tracing::{debug, trace};

/// Elements a source presents on one lane for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offer {
    /// Number of elements written into the port.
    pub valid: usize,
    /// The presented chunk ends the message.
    pub last: bool,
}

/// Harness-side buffers a stage reads from and writes to.
///
/// `offer` and `room` are asked before the device settles; `accept` and
/// `deliver` are told the resolved handshake afterwards.
pub trait StageLink<I, O> {
    /// Fills `dst` with up to `dst.len()` elements for input lane `lane`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot produce its elements.
    fn offer(&mut self, lane: usize, dst: &mut [I]) -> Result<Offer>;

    /// Reports how many of the `presented` elements the device took.
    ///
    /// # Errors
    ///
    /// Returns an error if unconsumed elements cannot be put back.
    fn accept(&mut self, lane: usize, presented: &[I], transfer: Transfer) -> Result<()>;

    /// Free space on output lane `lane`.
    fn room(&self, lane: usize) -> usize;

    /// Takes the elements the device transferred on output lane `lane`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot grow.
    fn deliver(&mut self, lane: usize, data: &[O], transfer: Transfer) -> Result<()>;
}

/// Per-lane transfers of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport<const IL: usize, const OL: usize> {
    /// Input lane transfers.
    pub input: [Transfer; IL],
    /// Output lane transfers.
    pub output: [Transfer; OL],
}

impl<const IL: usize, const OL: usize> Default for StepReport<IL, OL> {
    fn default() -> Self {
        let none = Transfer {
            consumed: 0,
            restart: false,
        };
        Self {
            input: [none; IL],
            output: [none; OL],
        }
    }
}

impl<const IL: usize, const OL: usize> StepReport<IL, OL> {
    /// Some input lane moved at least one element.
    pub fn input_moved(&self) -> bool {
        self.input.iter().any(Transfer::moved)
    }

    /// Some output lane moved at least one element.
    pub fn output_moved(&self) -> bool {
        self.output.iter().any(Transfer::moved)
    }

    /// Some lane moved at least one element in either direction.
    pub fn moved(&self) -> bool {
        self.input_moved() || self.output_moved()
    }

    /// Elements accepted over all input lanes.
    pub fn consumed(&self) -> usize {
        self.input.iter().map(|t| t.consumed).sum()
    }

    /// Elements produced over all output lanes.
    pub fn produced(&self) -> usize {
        self.output.iter().map(|t| t.consumed).sum()
    }
}

/// One simulated unit with its cycle counter, idle monitor and trace.
#[derive(Debug)]
pub struct Stage<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> {
    name: String,
    unit: Clocked<D, IL, IW, OL, OW>,
    cycles: u64,
    monitor: IdleMonitor,
    trace: Option<SignalTrace>,
}

impl<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> Stage<D, IL, IW, OL, OW>
where
    D: Device<IL, IW, OL, OW>,
{
    /// Creates a stage that aborts after `idle_limit` idle cycles.
    pub fn new(name: impl Into<String>, device: D, idle_limit: u64) -> Self {
        Self {
            name: name.into(),
            unit: Clocked::new(device),
            cycles: 0,
            monitor: IdleMonitor::new(idle_limit),
            trace: None,
        }
    }

    /// Attaches a signal trace.
    #[must_use]
    pub fn with_trace(mut self, trace: SignalTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Stage name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cycles stepped since creation.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Consecutive cycles without a transfer.
    pub const fn idle_cycles(&self) -> u64 {
        self.monitor.idle()
    }

    /// Total cycles without a transfer.
    pub const fn stall_cycles(&self) -> u64 {
        self.monitor.stalls()
    }

    /// Returns the driven device.
    pub const fn device(&self) -> &D {
        self.unit.device()
    }

    /// Pulses reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the trace cannot be written.
    pub fn reset(&mut self) -> Result<()> {
        debug!(stage = %self.name, "reset");
        self.unit.reset(self.trace.as_mut())
    }

    /// Advances the device by one clock cycle.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if a lane reports a count outside its
    /// width, `HardwareDeadlock` once the idle bound is reached (after
    /// flushing the trace), or any error raised by the link.
    pub fn step<L>(&mut self, link: &mut L) -> Result<StepReport<IL, OL>>
    where
        L: StageLink<D::In, D::Out>,
    {
        let report = self.unit.cycle(
            link,
            |link, regs| {
                for (lane, port) in regs.input.iter_mut().enumerate() {
                    let offer = link.offer(lane, &mut port.data)?;
                    port.valid = offer.valid;
                    port.last = offer.last;
                    port.restart = false;
                }
                for (lane, port) in regs.output.iter_mut().enumerate() {
                    port.ready = link.room(lane).min(OW);
                    port.restart = false;
                }
                Ok(())
            },
            |link, regs| {
                let mut report = StepReport::<IL, OL>::default();
                for (lane, port) in regs.input.iter_mut().enumerate() {
                    let transfer = port.handshake().resolve(IW, lane, Direction::Input)?;
                    link.accept(lane, port.offered(), transfer)?;
                    port.restart = transfer.restart;
                    report.input[lane] = transfer;
                }
                for (lane, port) in regs.output.iter_mut().enumerate() {
                    let transfer = port.handshake().resolve(OW, lane, Direction::Output)?;
                    link.deliver(lane, &port.data[..transfer.consumed], transfer)?;
                    port.restart = transfer.restart;
                    report.output[lane] = transfer;
                }
                Ok(report)
            },
            self.trace.as_mut(),
        )?;

        self.cycles += 1;
        self.monitor.record(report.moved());
        trace!(
            stage = %self.name,
            cycle = self.cycles,
            consumed = report.consumed(),
            produced = report.produced(),
            "step"
        );

        if let Err(e) = self.monitor.check(&self.name, self.cycles) {
            self.flush()?;
            return Err(e);
        }
        Ok(report)
    }

    /// Flushes the signal trace, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the trace sink cannot be flushed.
    pub fn flush(&mut self) -> Result<()> {
        match self.trace.as_mut() {
            Some(trace) => trace.flush(),
            None => Ok(()),
        }
    }

    /// Ends the simulation of this stage and flushes its trace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trace sink cannot be flushed.
    pub fn finish(&mut self) -> Result<()> {
        self.unit.device_mut().finish();
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{EdgeDetector, Registers};
    use crate::error::Error;
    use crate::lane::ByteLane;
    use std::collections::VecDeque;

    const DEPTH: usize = 8;

    /// Buffers up to eight bytes, accepts four per cycle and emits two.
    #[derive(Default)]
    struct Echo {
        registers: Registers<u8, u8, 1, 4, 1, 2>,
        edge: EdgeDetector,
        buffer: VecDeque<u8>,
        ended: bool,
        oversize_ready: bool,
    }

    impl Device<1, 4, 1, 2> for Echo {
        type In = u8;
        type Out = u8;

        fn registers(&self) -> &Registers<u8, u8, 1, 4, 1, 2> {
            &self.registers
        }

        fn registers_mut(&mut self) -> &mut Registers<u8, u8, 1, 4, 1, 2> {
            &mut self.registers
        }

        fn eval(&mut self) {
            if self.edge.rising(self.registers.clock) {
                if self.registers.reset {
                    self.buffer.clear();
                    self.ended = false;
                } else {
                    let out = &self.registers.output[0];
                    let sent = out.valid.min(out.ready);
                    let restarted = out.restart;
                    self.buffer.drain(..sent);
                    if restarted {
                        self.ended = false;
                    }

                    let input = &self.registers.input[0];
                    let taken = input.valid.min(input.ready);
                    self.buffer.extend(&input.data[..taken]);
                    if input.restart {
                        self.ended = true;
                    }
                }
            }

            let input = &mut self.registers.input[0];
            input.ready = if self.oversize_ready {
                5
            } else if self.ended {
                0
            } else {
                (DEPTH - self.buffer.len()).min(4)
            };

            let out = &mut self.registers.output[0];
            out.valid = self.buffer.len().min(2);
            for (slot, byte) in out.data.iter_mut().zip(&self.buffer) {
                *slot = *byte;
            }
            out.last = self.ended && self.buffer.len() <= 2;
        }
    }

    struct Pipe {
        input: ByteLane,
        output: Vec<u8>,
        room: usize,
        finished: bool,
    }

    impl StageLink<u8, u8> for Pipe {
        fn offer(&mut self, _lane: usize, dst: &mut [u8]) -> Result<Offer> {
            Ok(self.input.offer(dst))
        }

        fn accept(&mut self, _lane: usize, _presented: &[u8], transfer: Transfer) -> Result<()> {
            self.input.consume(transfer.consumed);
            Ok(())
        }

        fn room(&self, _lane: usize) -> usize {
            self.room
        }

        fn deliver(&mut self, _lane: usize, data: &[u8], transfer: Transfer) -> Result<()> {
            self.output.extend_from_slice(data);
            self.finished |= transfer.restart;
            Ok(())
        }
    }

    fn pipe(data: &[u8], room: usize) -> Pipe {
        let mut input = ByteLane::new(64);
        input.extend(data).unwrap();
        input.last = true;
        Pipe {
            input,
            output: Vec::new(),
            room,
            finished: false,
        }
    }

    #[test]
    fn message_passes_through_and_restarts() {
        let mut stage = Stage::new("echo", Echo::default(), 100);
        stage.reset().unwrap();
        let mut link = pipe(b"hello, stage", 16);

        while !link.finished {
            stage.step(&mut link).unwrap();
            assert!(stage.cycles() < 50);
        }

        assert_eq!(link.output, b"hello, stage");
        assert!(link.input.is_empty());
        assert_eq!(stage.idle_cycles(), 0);
    }

    #[test]
    fn backpressure_limits_output() {
        let mut stage = Stage::new("echo", Echo::default(), 100);
        stage.reset().unwrap();
        let mut link = pipe(b"abcdef", 0);

        for _ in 0..3 {
            stage.step(&mut link).unwrap();
        }
        assert!(link.output.is_empty());

        // the device buffer is full, so nothing moves any more
        let report = stage.step(&mut link).unwrap();
        assert!(!report.moved());
        assert_eq!(stage.stall_cycles(), 2);
    }

    #[test]
    fn stalled_stage_hits_the_idle_bound() {
        let mut stage = Stage::new("stuck", Echo::default(), 4);
        stage.reset().unwrap();
        let mut link = pipe(b"", 0);
        link.input.last = false;

        let mut result = Ok(StepReport::default());
        for _ in 0..4 {
            result = stage.step(&mut link);
        }
        let err = result.unwrap_err();
        assert!(err.is_deadlock());
        assert_eq!(stage.cycles(), 4);
    }

    #[test]
    fn oversized_ready_is_a_protocol_violation() {
        let echo = Echo {
            oversize_ready: true,
            ..Echo::default()
        };
        let mut stage = Stage::new("broken", echo, 100);
        stage.reset().unwrap();
        let mut link = pipe(b"xy", 4);

        let err = stage.step(&mut link).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation {
                direction: Direction::Input,
                ready: 5,
                width: 4,
                ..
            }
        ));
    }
}
