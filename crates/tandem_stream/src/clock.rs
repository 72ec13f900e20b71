//! Three-phase clocked stepping of a device.
//!
//! One cycle is: present inputs and settle, observe and act on the
//! settled outputs, then commit with a falling and a rising clock edge.
//! The phases are closures handed to [`Clocked::cycle`], so a caller can
//! neither observe before presenting nor forget the commit edge.

use crate::device::{Device, Registers};
use crate::error::Result;
use crate::trace::{Phase, SignalTrace};

/// A device owned together with its clock sequencing.
#[derive(Debug)]
pub struct Clocked<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> {
    device: D,
}

type Regs<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> = Registers<
    <D as Device<IL, IW, OL, OW>>::In,
    <D as Device<IL, IW, OL, OW>>::Out,
    IL,
    IW,
    OL,
    OW,
>;

impl<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> Clocked<D, IL, IW, OL, OW>
where
    D: Device<IL, IW, OL, OW>,
{
    /// Wraps a device.
    pub const fn new(device: D) -> Self {
        Self { device }
    }

    /// Returns the wrapped device.
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Returns the wrapped device mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Consumes the wrapper, returning the device.
    pub fn into_inner(self) -> D {
        self.device
    }

    /// Asserts reset across one rising edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the trace cannot be written.
    pub fn reset(&mut self, trace: Option<&mut SignalTrace>) -> Result<()> {
        let registers = self.device.registers_mut();
        registers.reset = true;
        registers.clock = false;
        self.device.eval();
        if let Some(trace) = trace {
            trace.sample(Phase::Reset, self.device.registers())?;
        }

        self.device.registers_mut().clock = true;
        self.device.eval();
        self.device.registers_mut().reset = false;
        Ok(())
    }

    /// Runs one full clock cycle.
    ///
    /// `present` drives the inputs, `observe` reads the settled outputs and
    /// may write harness-side responses (such as `restart`). The shared
    /// context is threaded through both phases.
    ///
    /// # Errors
    ///
    /// Propagates errors from either phase or from the trace; the commit
    /// edge is skipped when a phase fails.
    pub fn cycle<C, R>(
        &mut self,
        context: &mut C,
        present: impl FnOnce(&mut C, &mut Regs<D, IL, IW, OL, OW>) -> Result<()>,
        observe: impl FnOnce(&mut C, &mut Regs<D, IL, IW, OL, OW>) -> Result<R>,
        mut trace: Option<&mut SignalTrace>,
    ) -> Result<R> {
        // pick up external changes made since the last commit
        self.device.eval();

        present(context, self.device.registers_mut())?;
        self.device.eval();

        let observed = observe(context, self.device.registers_mut())?;
        self.device.eval();
        if let Some(trace) = trace.as_deref_mut() {
            trace.sample(Phase::Settle, self.device.registers())?;
        }

        self.device.registers_mut().clock = false;
        self.device.eval();
        if let Some(trace) = trace {
            trace.sample(Phase::Fall, self.device.registers())?;
        }

        // rising edge commits state; not traced until the next settle
        self.device.registers_mut().clock = true;
        self.device.eval();

        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::EdgeDetector;

    /// Counts rising edges and reflects the count on its output.
    #[derive(Default)]
    struct Counter {
        registers: Registers<u8, u8, 1, 1, 1, 1>,
        edge: EdgeDetector,
        edges: u8,
        evals: usize,
    }

    impl Device<1, 1, 1, 1> for Counter {
        type In = u8;
        type Out = u8;

        fn registers(&self) -> &Registers<u8, u8, 1, 1, 1, 1> {
            &self.registers
        }

        fn registers_mut(&mut self) -> &mut Registers<u8, u8, 1, 1, 1, 1> {
            &mut self.registers
        }

        fn eval(&mut self) {
            self.evals += 1;
            if self.edge.rising(self.registers.clock) {
                self.edges = if self.registers.reset { 0 } else { self.edges + 1 };
            }
            self.registers.output[0].data[0] = self.edges;
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut unit = Clocked::new(Counter {
            edges: 7,
            ..Counter::default()
        });
        unit.reset(None).unwrap();
        assert_eq!(unit.device().edges, 0);
        assert!(!unit.device().registers().reset);
        assert!(unit.device().registers().clock);
    }

    #[test]
    fn cycle_commits_exactly_one_edge() {
        let mut unit = Clocked::new(Counter::default());
        unit.reset(None).unwrap();

        let seen = unit
            .cycle(
                &mut (),
                |(), regs| {
                    regs.input[0].valid = 1;
                    Ok(())
                },
                |(), regs| Ok(regs.output[0].data[0]),
                None,
            )
            .unwrap();

        // observed before the commit edge
        assert_eq!(seen, 0);
        assert_eq!(unit.device().edges, 1);
        assert_eq!(unit.device().evals, 2 + 5);
    }
}
