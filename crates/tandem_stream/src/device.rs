//! Register contract of a simulated unit.
//!
//! A device exposes banks of decoupled-stream ports as genuine fixed-size
//! arrays, plus clock and reset lines. `eval` recomputes outputs from the
//! current inputs and state; stored state only advances when `eval` sees
//! a rising clock transition.

use crate::channel::Handshake;
use std::fmt;

/// Payload type carried on a lane.
pub trait Element: Copy + Default + PartialEq + fmt::Debug {}

impl Element for u8 {}
impl Element for bool {}

/// One decoupled-stream lane of a device's register file.
///
/// On an input port the harness drives `data`, `valid` and `last` and the
/// device drives `ready`. On an output port the roles are swapped. The
/// harness writes `restart` after each handshake so the device can observe
/// message completion before the clock edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port<E, const W: usize> {
    /// Element registers.
    pub data: [E; W],
    /// Elements the source presents, `0..=W`.
    pub valid: usize,
    /// Elements the sink accepts, `0..=W`.
    pub ready: usize,
    /// Presented chunk ends the current message.
    pub last: bool,
    /// Harness-computed message completion for this cycle.
    pub restart: bool,
}

impl<E: Element, const W: usize> Default for Port<E, W> {
    fn default() -> Self {
        Self {
            data: [E::default(); W],
            valid: 0,
            ready: 0,
            last: false,
            restart: false,
        }
    }
}

impl<E: Element, const W: usize> Port<E, W> {
    /// Lane width in elements.
    pub const WIDTH: usize = W;

    /// Returns the lane's current handshake signals.
    pub const fn handshake(&self) -> Handshake {
        Handshake::new(self.valid, self.ready, self.last)
    }

    /// Returns the presented elements, clipped to the lane width.
    pub fn offered(&self) -> &[E] {
        &self.data[..self.valid.min(W)]
    }
}

/// Full register file of a device with `IL` input lanes of width `IW` and
/// `OL` output lanes of width `OW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers<I, O, const IL: usize, const IW: usize, const OL: usize, const OW: usize> {
    /// Input port bank.
    pub input: [Port<I, IW>; IL],
    /// Output port bank.
    pub output: [Port<O, OW>; OL],
    /// Clock line.
    pub clock: bool,
    /// Synchronous reset line.
    pub reset: bool,
}

impl<I, O, const IL: usize, const IW: usize, const OL: usize, const OW: usize> Default
    for Registers<I, O, IL, IW, OL, OW>
where
    I: Element,
    O: Element,
{
    fn default() -> Self {
        Self {
            input: std::array::from_fn(|_| Port::default()),
            output: std::array::from_fn(|_| Port::default()),
            clock: false,
            reset: false,
        }
    }
}

/// A cycle-evaluated unit driven through its register contract.
pub trait Device<const IL: usize, const IW: usize, const OL: usize, const OW: usize> {
    /// Element type of the input lanes.
    type In: Element;
    /// Element type of the output lanes.
    type Out: Element;

    /// Returns the register file.
    fn registers(&self) -> &Registers<Self::In, Self::Out, IL, IW, OL, OW>;

    /// Returns the register file for driving inputs.
    fn registers_mut(&mut self) -> &mut Registers<Self::In, Self::Out, IL, IW, OL, OW>;

    /// Recomputes outputs; commits state on a rising clock transition.
    fn eval(&mut self);

    /// Called once when the simulation ends.
    fn finish(&mut self) {}
}

/// Rising-edge detector for device implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    /// Records the clock level and returns true on a low-to-high transition.
    pub fn rising(&mut self, clock: bool) -> bool {
        let rising = clock && !self.previous;
        self.previous = clock;
        rising
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offered_clips_to_width() {
        let mut port = Port::<u8, 4>::default();
        port.data = [1, 2, 3, 4];
        port.valid = 2;
        assert_eq!(port.offered(), &[1, 2]);
        port.valid = 9;
        assert_eq!(port.offered().len(), 4);
    }

    #[test]
    fn edge_detector_fires_once_per_rise() {
        let mut edge = EdgeDetector::default();
        assert!(!edge.rising(false));
        assert!(edge.rising(true));
        assert!(!edge.rising(true));
        assert!(!edge.rising(false));
        assert!(edge.rising(true));
    }
}
