//! Identity units that split bytes into bit lanes and join them back.
//!
//! The [`Serializer`] stripes the bytes of each message round-robin over
//! `L` output lanes, eight bits per byte, least significant bit first. The
//! [`Deserializer`] reads the lanes in the same order. Each input message
//! becomes one message on every lane, so boundaries survive the trip even
//! when a lane's share of a message is empty.

use crate::fifo::MessageFifo;
use tandem_stream::{Device, EdgeDetector, Registers};

const BYTE_BITS: usize = 8;

fn bits_of(byte: u8) -> impl Iterator<Item = bool> {
    (0..BYTE_BITS).map(move |i| (byte >> i) & 1 == 1)
}

fn byte_of(bits: impl Iterator<Item = bool>) -> u8 {
    bits.enumerate()
        .fold(0, |acc, (i, bit)| acc | (u8::from(bit) << i))
}

/// Bytes in on one lane, bits out on `L` lanes.
#[derive(Debug, Clone)]
pub struct Serializer<const L: usize, const IW: usize, const OW: usize> {
    registers: Registers<u8, bool, 1, IW, L, OW>,
    edge: EdgeDetector,
    lanes: [MessageFifo<bool>; L],
    next: usize,
    depth: usize,
}

impl<const L: usize, const IW: usize, const OW: usize> Default for Serializer<L, IW, OW> {
    fn default() -> Self {
        Self {
            registers: Registers::default(),
            edge: EdgeDetector::default(),
            lanes: std::array::from_fn(|_| MessageFifo::new()),
            next: 0,
            depth: 4 * OW.max(BYTE_BITS * IW),
        }
    }
}

impl<const L: usize, const IW: usize, const OW: usize> Serializer<L, IW, OW> {
    /// Creates an idle serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits buffered on each lane.
    pub fn buffered(&self) -> [usize; L] {
        std::array::from_fn(|lane| self.lanes[lane].len())
    }

    fn commit(&mut self) {
        for (fifo, port) in self.lanes.iter_mut().zip(&self.registers.output) {
            fifo.take(port.valid.min(port.ready)).for_each(drop);
            if port.restart {
                fifo.finish_current();
            }
        }

        let input = &self.registers.input[0];
        let taken = input.valid.min(input.ready);
        for &byte in &input.data[..taken] {
            let fifo = &mut self.lanes[self.next];
            bits_of(byte).for_each(|bit| fifo.push(bit));
            self.next = (self.next + 1) % L;
        }
        if input.restart {
            self.lanes.iter_mut().for_each(MessageFifo::close);
            self.next = 0;
        }
    }

    fn drive(&mut self) {
        let room = self.lanes.iter().all(|fifo| fifo.len() < self.depth);
        self.registers.input[0].ready = if room { IW } else { 0 };

        for (fifo, port) in self.lanes.iter().zip(self.registers.output.iter_mut()) {
            let offer = fifo.write_offer(&mut port.data);
            port.valid = offer.valid;
            port.last = offer.last;
        }
    }
}

impl<const L: usize, const IW: usize, const OW: usize> Device<1, IW, L, OW>
    for Serializer<L, IW, OW>
{
    type In = u8;
    type Out = bool;

    fn registers(&self) -> &Registers<u8, bool, 1, IW, L, OW> {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut Registers<u8, bool, 1, IW, L, OW> {
        &mut self.registers
    }

    fn eval(&mut self) {
        if self.edge.rising(self.registers.clock) {
            if self.registers.reset {
                self.lanes.iter_mut().for_each(MessageFifo::clear);
                self.next = 0;
            } else {
                self.commit();
            }
        }
        self.drive();
    }
}

/// Bits in on `L` lanes, bytes out on one lane.
#[derive(Debug, Clone)]
pub struct Deserializer<const L: usize, const IW: usize, const OW: usize> {
    registers: Registers<bool, u8, L, IW, 1, OW>,
    edge: EdgeDetector,
    lanes: [MessageFifo<bool>; L],
    out: MessageFifo<u8>,
    next: usize,
    depth: usize,
    out_depth: usize,
}

impl<const L: usize, const IW: usize, const OW: usize> Default for Deserializer<L, IW, OW> {
    fn default() -> Self {
        Self {
            registers: Registers::default(),
            edge: EdgeDetector::default(),
            lanes: std::array::from_fn(|_| MessageFifo::new()),
            out: MessageFifo::new(),
            next: 0,
            depth: 4 * IW.max(BYTE_BITS),
            out_depth: 4 * OW.max(L),
        }
    }
}

impl<const L: usize, const IW: usize, const OW: usize> Deserializer<L, IW, OW> {
    /// Creates an idle deserializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes decoded but not yet delivered.
    pub fn pending_output(&self) -> usize {
        self.out.len()
    }

    fn commit(&mut self) {
        let port = &self.registers.output[0];
        self.out.take(port.valid.min(port.ready)).for_each(drop);
        if port.restart {
            self.out.finish_current();
        }

        for (fifo, port) in self.lanes.iter_mut().zip(&self.registers.input) {
            let taken = port.valid.min(port.ready);
            port.data[..taken].iter().for_each(|&bit| fifo.push(bit));
            if port.restart {
                fifo.close();
            }
        }

        self.decode();
    }

    fn decode(&mut self) {
        loop {
            let lane = &mut self.lanes[self.next];
            if lane.current_len() >= BYTE_BITS {
                let byte = byte_of(lane.take(BYTE_BITS));
                self.out.push(byte);
                self.next = (self.next + 1) % L;
            } else if self.lanes.iter().all(MessageFifo::current_closed) {
                // every lane has ended its share of the message
                self.lanes.iter_mut().for_each(MessageFifo::drop_current);
                self.out.close();
                self.next = 0;
            } else {
                break;
            }
        }
    }

    fn drive(&mut self) {
        let out_full = self.out.len() >= self.out_depth;
        for (fifo, port) in self.lanes.iter().zip(self.registers.input.iter_mut()) {
            port.ready = if out_full {
                0
            } else {
                self.depth.saturating_sub(fifo.len()).min(IW)
            };
        }

        let port = &mut self.registers.output[0];
        let offer = self.out.write_offer(&mut port.data);
        port.valid = offer.valid;
        port.last = offer.last;
    }
}

impl<const L: usize, const IW: usize, const OW: usize> Device<L, IW, 1, OW>
    for Deserializer<L, IW, OW>
{
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
                self.lanes.iter_mut().for_each(MessageFifo::clear);
                self.out.clear();
                self.next = 0;
            } else {
                self.commit();
            }
        }
        self.drive();
    }
}
