//! Chaos injection for stream units.
//!
//! A [`Throttle`] sits between the harness and any device and, on every
//! rising edge, draws fresh per-lane caps from a seeded RNG. Caps limit how
//! much input the wrapped device may accept and how much output it may
//! offer during the following cycle, including full stalls. The wrapped
//! device still sees a well-formed handshake, so throttling changes timing
//! but never content.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tandem_stream::{Device, EdgeDetector, Registers};
use tracing::trace;

/// Configuration for chaos throttling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Random seed for reproducible chaos.
    pub seed: u64,
    /// Probability that a lane is fully stalled for a cycle (0.0 - 1.0).
    pub stall_rate: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            stall_rate: 0.25,
        }
    }
}

impl ThrottleConfig {
    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the stall probability.
    #[must_use]
    pub const fn with_stall_rate(mut self, rate: f64) -> Self {
        self.stall_rate = rate;
        self
    }
}

/// Wraps a device and randomly narrows its lanes each cycle.
pub struct Throttle<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize>
where
    D: Device<IL, IW, OL, OW>,
{
    inner: D,
    outer: Registers<D::In, D::Out, IL, IW, OL, OW>,
    edge: EdgeDetector,
    rng: ChaCha8Rng,
    stall_rate: f64,
    input_caps: [usize; IL],
    output_caps: [usize; OL],
}

impl<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> std::fmt::Debug
    for Throttle<D, IL, IW, OL, OW>
where
    D: Device<IL, IW, OL, OW>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("stall_rate", &self.stall_rate)
            .field("input_caps", &self.input_caps)
            .field("output_caps", &self.output_caps)
            .finish_non_exhaustive()
    }
}

fn draw_cap(rng: &mut ChaCha8Rng, stall_rate: f64, width: usize) -> usize {
    if width == 0 || rng.gen_bool(stall_rate) {
        0
    } else {
        rng.gen_range(1..=width)
    }
}

impl<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> Throttle<D, IL, IW, OL, OW>
where
    D: Device<IL, IW, OL, OW>,
{
    /// Wraps `device`; caps start fully open.
    pub fn new(device: D, config: ThrottleConfig) -> Self {
        Self {
            inner: device,
            outer: Registers::default(),
            edge: EdgeDetector::default(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            stall_rate: config.stall_rate.clamp(0.0, 1.0),
            input_caps: [IW; IL],
            output_caps: [OW; OL],
        }
    }

    /// Returns the wrapped device.
    pub const fn inner(&self) -> &D {
        &self.inner
    }

    /// Current input lane caps.
    pub const fn input_caps(&self) -> &[usize; IL] {
        &self.input_caps
    }

    /// Current output lane caps.
    pub const fn output_caps(&self) -> &[usize; OL] {
        &self.output_caps
    }

    fn draw(&mut self) {
        for cap in &mut self.input_caps {
            *cap = draw_cap(&mut self.rng, self.stall_rate, IW);
        }
        for cap in &mut self.output_caps {
            *cap = draw_cap(&mut self.rng, self.stall_rate, OW);
        }
        trace!(input = ?self.input_caps, output = ?self.output_caps, "throttle caps");
    }

    fn propagate(&mut self) {
        let inner = self.inner.registers_mut();
        inner.clock = self.outer.clock;
        inner.reset = self.outer.reset;
        for ((port, outer), &cap) in inner
            .input
            .iter_mut()
            .zip(&self.outer.input)
            .zip(&self.input_caps)
        {
            port.data = outer.data;
            port.valid = outer.valid.min(cap);
            port.last = outer.last && outer.valid <= cap;
            port.restart = outer.restart;
        }
        for ((port, outer), &cap) in inner
            .output
            .iter_mut()
            .zip(&self.outer.output)
            .zip(&self.output_caps)
        {
            port.ready = outer.ready.min(cap);
            port.restart = outer.restart;
        }

        self.inner.eval();

        let inner = self.inner.registers();
        for ((outer, port), &cap) in self
            .outer
            .input
            .iter_mut()
            .zip(&inner.input)
            .zip(&self.input_caps)
        {
            outer.ready = port.ready.min(cap);
        }
        for ((outer, port), &cap) in self
            .outer
            .output
            .iter_mut()
            .zip(&inner.output)
            .zip(&self.output_caps)
        {
            outer.data = port.data;
            outer.valid = port.valid.min(cap);
            outer.last = port.last && port.valid <= cap;
        }
    }
}

impl<D, const IL: usize, const IW: usize, const OL: usize, const OW: usize> Device<IL, IW, OL, OW>
    for Throttle<D, IL, IW, OL, OW>
where
    D: Device<IL, IW, OL, OW>,
{
    type In = D::In;
    type Out = D::Out;

    fn registers(&self) -> &Registers<D::In, D::Out, IL, IW, OL, OW> {
        &self.outer
    }

    fn registers_mut(&mut self) -> &mut Registers<D::In, D::Out, IL, IW, OL, OW> {
        &mut self.outer
    }

    fn eval(&mut self) {
        let rising = self.edge.rising(self.outer.clock);
        // the wrapped device commits under the caps of the cycle just ended
        self.propagate();
        if rising && !self.outer.reset {
            self.draw();
            self.propagate();
        }
    }

    fn finish(&mut self) {
        self.inner.finish();
    }
}
