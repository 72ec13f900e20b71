//! Jobs: one page of input and everything derived from it.

use serde::Serialize;
use std::fmt;
use std::io::{self, Read};
use tandem_stream::{Error as StreamError, Result};

/// Lifecycle position of a job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Free, or being filled from the dump.
    Load,
    /// Owned by the compressor.
    Compress,
    /// Owned by the decompressor.
    Decompress,
    /// Waiting to be checked and reported.
    Finalize,
    /// The dump is exhausted; marks the end of the job stream.
    Done,
}

impl Phase {
    /// Phase a job enters after this one completes.
    pub const fn next(self) -> Self {
        match self {
            Self::Load => Self::Compress,
            Self::Compress => Self::Decompress,
            Self::Decompress => Self::Finalize,
            Self::Finalize | Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Compress => "compress",
            Self::Decompress => "decompress",
            Self::Finalize => "finalize",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Grows `buf` so it can hold `needed` bytes, doubling from at least `floor`.
fn reserve_doubling(buf: &mut Vec<u8>, needed: usize, floor: usize, what: &'static str) -> Result<()> {
    if needed <= buf.capacity() {
        return Ok(());
    }
    let mut target = (buf.capacity() * 2).max(floor).max(1);
    while target < needed {
        target *= 2;
    }
    buf.try_reserve_exact(target - buf.len())
        .map_err(|_| StreamError::allocation(what))
}

/// Bit string packed eight bits per byte, least significant bit first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedBits {
    bytes: Vec<u8>,
    len: usize,
}

impl PackedBits {
    /// Creates an empty bit string.
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            len: 0,
        }
    }

    /// Length in bits.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bits are stored.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the packed bytes; the final byte may be partial.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns bit `index`.
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| (self.bytes[index / 8] >> (index % 8)) & 1 == 1)
    }

    /// Appends bits, growing storage by doubling from `floor` bytes.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if storage cannot grow.
    pub fn extend(&mut self, bits: &[bool], floor: usize) -> Result<()> {
        let needed = (self.len + bits.len()).div_ceil(8);
        reserve_doubling(&mut self.bytes, needed, floor, "compressed payload")?;
        for &bit in bits {
            let minor = self.len % 8;
            if minor == 0 {
                self.bytes.push(0);
            }
            if let Some(byte) = self.bytes.last_mut() {
                *byte |= u8::from(bit) << minor;
            }
            self.len += 1;
        }
        Ok(())
    }

    /// Copies bits starting at `offset` into `dst`; returns how many.
    pub fn copy_to(&self, offset: usize, dst: &mut [bool]) -> usize {
        let count = self.len.saturating_sub(offset).min(dst.len());
        for (i, slot) in dst[..count].iter_mut().enumerate() {
            let index = offset + i;
            *slot = (self.bytes[index / 8] >> (index % 8)) & 1 == 1;
        }
        count
    }

    /// Empties the bit string, keeping its storage.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.len = 0;
    }
}

/// Result of one attempt to fill a job's page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// More bytes may still arrive.
    Partial,
    /// The page is full or the dump ended after some bytes.
    Complete,
    /// The dump ended with nothing read into this page.
    Exhausted,
}

/// One page moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    /// Current owner.
    pub phase: Phase,
    /// Index among non-zero pages.
    pub id: u64,
    /// Page as read from the dump.
    pub raw: Vec<u8>,
    /// Compressor output.
    pub compressed: PackedBits,
    /// Decompressor output.
    pub decompressed: Vec<u8>,
    /// Compressor cycles spent while this job was in flight.
    pub compress_cycles: u64,
    /// Decompressor cycles spent while this job was in flight.
    pub decompress_cycles: u64,
    /// Compressor cycles without any transfer while in flight.
    pub compress_stalls: u64,
    /// Decompressor cycles without any transfer while in flight.
    pub decompress_stalls: u64,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            phase: Phase::Load,
            id: 0,
            raw: Vec::new(),
            compressed: PackedBits::new(),
            decompressed: Vec::new(),
            compress_cycles: 0,
            decompress_cycles: 0,
            compress_stalls: 0,
            decompress_stalls: 0,
        }
    }
}

impl Job {
    /// Reads from `source` toward a page of `page_size` bytes.
    ///
    /// A zero-length read is taken as the end of the dump. Interrupted and
    /// would-block reads leave the page partial.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the page cannot be allocated, or any
    /// other I/O error from the source.
    pub fn fill(&mut self, source: &mut impl Read, page_size: usize) -> Result<Fill> {
        let start = self.raw.len();
        reserve_doubling(&mut self.raw, page_size, page_size, "page buffer")?;
        self.raw.resize(page_size, 0);

        let read = match source.read(&mut self.raw[start..]) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                self.raw.truncate(start);
                return Ok(Fill::Partial);
            }
            Err(e) => {
                self.raw.truncate(start);
                return Err(e.into());
            }
        };
        self.raw.truncate(start + read);

        Ok(match (read, self.raw.len()) {
            (0, 0) => Fill::Exhausted,
            (0, _) => Fill::Complete,
            (_, len) if len == page_size => Fill::Complete,
            _ => Fill::Partial,
        })
    }

    /// Returns true if every byte of the page is zero.
    pub fn is_zero(&self) -> bool {
        self.raw.iter().all(|&b| b == 0)
    }

    /// Appends decompressor output, growing by doubling from `floor` bytes.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the buffer cannot grow.
    pub fn push_decompressed(&mut self, bytes: &[u8], floor: usize) -> Result<()> {
        let needed = self.decompressed.len() + bytes.len();
        reserve_doubling(&mut self.decompressed, needed, floor, "decompressed payload")?;
        self.decompressed.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns true if decompression reproduced the page exactly.
    pub fn verify(&self) -> bool {
        self.raw == self.decompressed
    }

    /// Adds one cycle of `phase` to this job's counters.
    pub fn charge(&mut self, phase: Phase, stalled: bool) {
        let (cycles, stalls) = match phase {
            Phase::Compress => (&mut self.compress_cycles, &mut self.compress_stalls),
            Phase::Decompress => (&mut self.decompress_cycles, &mut self.decompress_stalls),
            _ => return,
        };
        *cycles += 1;
        if stalled {
            *stalls += 1;
        }
    }

    /// Returns the slot to `Load`, keeping buffer capacity for the next page.
    pub fn recycle(&mut self) {
        self.phase = Phase::Load;
        self.raw.clear();
        self.compressed.clear();
        self.decompressed.clear();
        self.compress_cycles = 0;
        self.decompress_cycles = 0;
        self.compress_stalls = 0;
        self.decompress_stalls = 0;
    }
}
