//! Harness-side buffers that feed or drain one lane.
//!
//! A [`ByteLane`] is byte-granular: presented bytes stay in place and the
//! consumed prefix is shifted out after the handshake. A [`BitLane`] is
//! bit-granular: presented bits are popped off a [`BitQueue`] and the
//! unconsumed tail is pushed back at the head.

use crate::bitqueue::BitQueue;
use crate::driver::Offer;
use crate::error::{Error, Result};
use std::io::{self, Read, Write};

/// Bounded byte buffer with an end-of-message flag.
///
/// Once the consumer has taken the final byte the lane is closed and
/// presents nothing further, so an ended message never restarts twice.
#[derive(Debug, Clone, Default)]
pub struct ByteLane {
    bytes: Vec<u8>,
    capacity: usize,
    closed: bool,
    /// The producer has delivered its final byte.
    pub last: bool,
}

impl ByteLane {
    /// Creates an empty lane holding at most `capacity` bytes.
    pub const fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::new(),
            capacity,
            closed: false,
            last: false,
        }
    }

    /// Returns the buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true if the lane holds `capacity` bytes.
    pub fn is_full(&self) -> bool {
        self.bytes.len() >= self.capacity
    }

    /// Returns free space in bytes.
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.bytes.len())
    }

    /// Appends bytes delivered by a device.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the buffer cannot grow.
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        self.bytes
            .try_reserve(data.len())
            .map_err(|_| Error::allocation("byte lane"))?;
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    /// Reads from `source` until the lane is full or the source stops.
    ///
    /// A zero-length read marks the lane `last`. Interrupted and
    /// would-block reads leave the lane untouched for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns any other I/O error from the source.
    pub fn fill_from(&mut self, source: &mut impl Read) -> Result<usize> {
        if self.last || self.is_full() {
            return Ok(0);
        }

        let mut chunk = vec![0u8; self.room()];
        match source.read(&mut chunk) {
            Ok(0) => {
                self.last = true;
                Ok(0)
            }
            Ok(n) => {
                self.extend(&chunk[..n])?;
                Ok(n)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks the message as fully transferred.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns true once the message has been fully transferred.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Copies up to `dst.len()` bytes into `dst` for presentation.
    pub fn offer(&self, dst: &mut [u8]) -> Offer {
        if self.closed {
            return Offer::default();
        }
        let valid = self.bytes.len().min(dst.len());
        dst[..valid].copy_from_slice(&self.bytes[..valid]);
        Offer {
            valid,
            last: self.last && self.bytes.len() <= dst.len(),
        }
    }

    /// Discards the first `consumed` bytes.
    pub fn consume(&mut self, consumed: usize) {
        self.bytes.drain(..consumed.min(self.bytes.len()));
    }

    /// Writes as much as the sink takes and shifts out what was written.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than an interrupted write.
    pub fn drain_to(&mut self, sink: &mut impl Write) -> Result<usize> {
        if self.bytes.is_empty() {
            return Ok(0);
        }
        match sink.write(&self.bytes) {
            Ok(n) => {
                self.consume(n);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Bit FIFO between two stages with an end-of-message flag.
#[derive(Debug, Clone, Default)]
pub struct BitLane {
    queue: BitQueue,
    closed: bool,
    /// The producer has delivered its final bit.
    pub last: bool,
}

impl BitLane {
    /// Creates an empty lane.
    pub const fn new() -> Self {
        Self {
            queue: BitQueue::new(),
            closed: false,
            last: false,
        }
    }

    /// Returns the number of buffered bits.
    pub fn size(&self) -> usize {
        self.queue.size()
    }

    /// Returns true if no bits are buffered.
    pub const fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Appends bits at the tail.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the queue cannot grow.
    pub fn extend(&mut self, bits: &[bool]) -> Result<()> {
        for &bit in bits {
            self.queue.push_tail(bit)?;
        }
        Ok(())
    }

    /// Marks the message as fully transferred.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns true once the message has been fully transferred.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pops up to `dst.len()` bits into `dst` for presentation.
    ///
    /// # Errors
    ///
    /// Never fails in practice; `EmptyQueue` is unreachable because the
    /// queue is checked before each pop.
    pub fn offer(&mut self, dst: &mut [bool]) -> Result<Offer> {
        if self.closed {
            return Ok(Offer::default());
        }
        let mut valid = 0;
        while valid < dst.len() && !self.queue.is_empty() {
            dst[valid] = self.queue.pop()?;
            valid += 1;
        }
        Ok(Offer {
            valid,
            last: self.last && self.queue.is_empty(),
        })
    }

    /// Returns presented bits that were not consumed to the head, in order.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if a head block cannot be allocated.
    pub fn restore(&mut self, presented: &[bool], consumed: usize) -> Result<()> {
        for &bit in presented.iter().skip(consumed).rev() {
            self.queue.push_head(bit)?;
        }
        Ok(())
    }
}
