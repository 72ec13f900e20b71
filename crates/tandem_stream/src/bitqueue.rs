//! Double-ended FIFO of single bits.
//!
//! Bits are stored in a chain of 64-bit blocks. The head block services
//! pops and head pushes, the tail block services tail pushes. Within a
//! block the head-most bit sits in the least significant position, so a
//! pop is a right shift and a head push is a left shift.
//!
//! Every block other than the head and the tail is always full.

use crate::error::{Error, Result};
use std::collections::VecDeque;

/// Number of bits one block holds.
pub const BLOCK_BITS: u8 = 64;

/// A double-ended, block-allocated queue of bits.
#[derive(Debug, Clone, Default)]
pub struct BitQueue {
    blocks: VecDeque<u64>,
    head_len: u8,
    tail_len: u8,
}

impl BitQueue {
    /// Creates an empty queue. No block is allocated until the first push.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blocks: VecDeque::new(),
            head_len: 0,
            tail_len: 0,
        }
    }

    /// Clears the queue and releases every block.
    pub fn init(&mut self) {
        self.blocks = VecDeque::new();
        self.head_len = 0;
        self.tail_len = 0;
    }

    /// Appends a bit at the tail.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if a new block cannot be allocated.
    pub fn push_tail(&mut self, bit: bool) -> Result<()> {
        if self.blocks.is_empty() || self.tail_len == BLOCK_BITS {
            self.grow_tail()?;
        }

        if let Some(tail) = self.blocks.back_mut() {
            *tail |= u64::from(bit) << self.tail_len;
        }
        self.tail_len += 1;
        if self.blocks.len() == 1 {
            self.head_len += 1;
        }
        Ok(())
    }

    /// Prepends a bit at the head, so the next `pop` returns it.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if a new block cannot be allocated.
    pub fn push_head(&mut self, bit: bool) -> Result<()> {
        if self.blocks.is_empty() || self.head_len == BLOCK_BITS {
            self.grow_head()?;
        }

        if let Some(head) = self.blocks.front_mut() {
            *head = (*head << 1) | u64::from(bit);
        }
        self.head_len += 1;
        if self.blocks.len() == 1 {
            self.tail_len += 1;
        }
        Ok(())
    }

    /// Removes and returns the bit at the head.
    ///
    /// # Errors
    ///
    /// Returns `EmptyQueue` if no bits remain.
    pub fn pop(&mut self) -> Result<bool> {
        if self.head_len == 0 {
            return Err(Error::EmptyQueue);
        }

        let Some(head) = self.blocks.front_mut() else {
            return Err(Error::EmptyQueue);
        };
        let bit = *head & 1 == 1;
        *head >>= 1;
        self.head_len -= 1;
        if self.blocks.len() == 1 {
            self.tail_len -= 1;
        }

        if self.head_len == 0 {
            self.release_head();
        }
        Ok(bit)
    }

    /// Returns true if the queue holds no bits.
    pub const fn is_empty(&self) -> bool {
        self.head_len == 0
    }

    /// Returns the number of queued bits.
    pub fn size(&self) -> usize {
        match self.blocks.len() {
            0 => 0,
            1 => usize::from(self.head_len),
            n => {
                usize::from(self.head_len)
                    + usize::from(self.tail_len)
                    + (n - 2) * usize::from(BLOCK_BITS)
            }
        }
    }

    fn grow_tail(&mut self) -> Result<()> {
        self.blocks
            .try_reserve(1)
            .map_err(|_| Error::allocation("bit queue block"))?;
        if self.blocks.is_empty() {
            self.head_len = 0;
        }
        self.blocks.push_back(0);
        self.tail_len = 0;
        Ok(())
    }

    fn grow_head(&mut self) -> Result<()> {
        self.blocks
            .try_reserve(1)
            .map_err(|_| Error::allocation("bit queue block"))?;
        if self.blocks.is_empty() {
            self.tail_len = 0;
        }
        self.blocks.push_front(0);
        self.head_len = 0;
        Ok(())
    }

    fn release_head(&mut self) {
        self.blocks.pop_front();
        match self.blocks.len() {
            0 => self.init(),
            1 => self.head_len = self.tail_len,
            _ => self.head_len = BLOCK_BITS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_queue_is_empty() {
        let mut queue = BitQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.size(), 0);
        assert!(matches!(queue.pop(), Err(Error::EmptyQueue)));
    }

    #[test]
    fn push_then_pop_returns_bit() {
        let mut queue = BitQueue::new();
        queue.push_tail(true).unwrap();
        assert_eq!(queue.size(), 1);
        assert!(queue.pop().unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn head_push_is_popped_first() {
        let mut queue = BitQueue::new();
        queue.push_tail(false).unwrap();
        queue.push_tail(false).unwrap();
        queue.push_head(true).unwrap();
        assert!(queue.pop().unwrap());
        assert!(!queue.pop().unwrap());
    }

    #[test]
    fn tail_order_survives_block_boundaries() {
        let mut queue = BitQueue::new();
        let bits: Vec<bool> = (0..200).map(|i| i % 3 == 0).collect();
        for &bit in &bits {
            queue.push_tail(bit).unwrap();
        }
        assert_eq!(queue.size(), 200);
        let popped: Vec<bool> = (0..200).map(|_| queue.pop().unwrap()).collect();
        assert_eq!(popped, bits);
        assert!(queue.is_empty());
    }

    #[test]
    fn head_push_on_full_head_allocates_block() {
        let mut queue = BitQueue::new();
        for _ in 0..64 {
            queue.push_tail(false).unwrap();
        }
        queue.push_head(true).unwrap();
        assert_eq!(queue.size(), 65);
        assert!(queue.pop().unwrap());
        assert_eq!(queue.size(), 64);
    }

    #[test]
    fn init_releases_everything() {
        let mut queue = BitQueue::new();
        for _ in 0..130 {
            queue.push_tail(true).unwrap();
        }
        queue.init();
        assert!(queue.is_empty());
        assert_eq!(queue.size(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Tail(bool),
        Head(bool),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => any::<bool>().prop_map(Op::Tail),
            1 => any::<bool>().prop_map(Op::Head),
            2 => Just(Op::Pop),
        ]
    }

    proptest! {
        #[test]
        fn matches_deque_model(ops in prop::collection::vec(op(), 0..600)) {
            let mut queue = BitQueue::new();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Op::Tail(bit) => {
                        queue.push_tail(bit).unwrap();
                        model.push_back(bit);
                    }
                    Op::Head(bit) => {
                        queue.push_head(bit).unwrap();
                        prop_assert_eq!(queue.pop().unwrap(), bit);
                        queue.push_head(bit).unwrap();
                        model.push_front(bit);
                    }
                    Op::Pop => match model.pop_front() {
                        Some(expected) => prop_assert_eq!(queue.pop().unwrap(), expected),
                        None => prop_assert!(queue.pop().is_err()),
                    },
                }
                prop_assert_eq!(queue.size(), model.len());
                prop_assert_eq!(queue.is_empty(), model.is_empty());
            }
        }
    }
}
