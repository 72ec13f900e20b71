//! A unit that swallows its input and never finishes a message.

use tandem_stream::{Device, EdgeDetector, Registers};

/// Accepts every bit on every lane and produces nothing.
///
/// The output lane never asserts `last`, so a harness waiting on this
/// unit's output can only end through its idle bound.
#[derive(Debug, Clone, Default)]
pub struct Blackhole<const L: usize, const IW: usize, const OW: usize> {
    registers: Registers<bool, u8, L, IW, 1, OW>,
    edge: EdgeDetector,
    absorbed: usize,
}

impl<const L: usize, const IW: usize, const OW: usize> Blackhole<L, IW, OW> {
    /// Creates a sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits accepted since reset.
    pub const fn absorbed(&self) -> usize {
        self.absorbed
    }
}

impl<const L: usize, const IW: usize, const OW: usize> Device<L, IW, 1, OW> for Blackhole<L, IW, OW> {
    type In = bool;
    type Out = u8;

    fn registers(&self) -> &Registers<bool, u8, L, IW, 1, OW> {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut Registers<bool, u8, L, IW, 1, OW> {
        &mut self.registers
    }

    fn eval(&mut self) {
        if self.edge.rising(self.registers.clock) {
            if self.registers.reset {
                self.absorbed = 0;
            } else {
                self.absorbed += self
                    .registers
                    .input
                    .iter()
                    .map(|p| p.valid.min(p.ready))
                    .sum::<usize>();
            }
        }

        for port in &mut self.registers.input {
            port.ready = IW;
        }
        let out = &mut self.registers.output[0];
        out.valid = 0;
        out.last = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbs_and_never_ends() {
        let mut sink = Blackhole::<2, 4, 8>::new();
        sink.eval();
        sink.registers_mut().input[1].valid = 3;
        sink.registers_mut().clock = true;
        sink.eval();

        assert_eq!(sink.absorbed(), 3);
        assert_eq!(sink.registers().input[0].ready, 4);
        assert_eq!(sink.registers().output[0].valid, 0);
        assert!(!sink.registers().output[0].last);
    }
}
