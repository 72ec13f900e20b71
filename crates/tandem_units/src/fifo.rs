//! Element FIFO partitioned into messages.

use std::collections::VecDeque;
use tandem_stream::Offer;

/// FIFO whose elements are grouped into consecutive messages.
///
/// The newest message stays open until [`close`](Self::close) is called.
/// Reads only ever see the oldest (current) message.
#[derive(Debug, Clone)]
pub struct MessageFifo<E> {
    items: VecDeque<E>,
    closed: VecDeque<usize>,
    closed_total: usize,
}

impl<E> Default for MessageFifo<E> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            closed: VecDeque::new(),
            closed_total: 0,
        }
    }
}

impl<E: Copy> MessageFifo<E> {
    /// Creates an empty FIFO with one open message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total buffered elements over all messages.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no elements are buffered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of closed messages not yet finished.
    pub fn pending(&self) -> usize {
        self.closed.len()
    }

    /// Appends an element to the open message.
    pub fn push(&mut self, item: E) {
        self.items.push_back(item);
    }

    /// Ends the open message; later pushes start a new one.
    pub fn close(&mut self) {
        let open = self.items.len() - self.closed_total;
        self.closed.push_back(open);
        self.closed_total += open;
    }

    /// Elements remaining in the current message.
    pub fn current_len(&self) -> usize {
        self.closed.front().copied().unwrap_or(self.items.len())
    }

    /// Returns true if the current message has been closed.
    pub fn current_closed(&self) -> bool {
        !self.closed.is_empty()
    }

    /// Copies the head of the current message into `dst`.
    ///
    /// `last` is set when the current message is closed and fits.
    pub fn write_offer(&self, dst: &mut [E]) -> Offer {
        let available = self.current_len();
        let valid = available.min(dst.len());
        for (slot, item) in dst.iter_mut().zip(self.items.iter().take(valid)) {
            *slot = *item;
        }
        Offer {
            valid,
            last: self.current_closed() && available <= dst.len(),
        }
    }

    /// Removes up to `n` elements from the current message.
    pub fn take(&mut self, n: usize) -> impl Iterator<Item = E> + '_ {
        let n = n.min(self.current_len());
        if let Some(front) = self.closed.front_mut() {
            *front -= n;
            self.closed_total -= n;
        }
        self.items.drain(..n)
    }

    /// Retires the current message once it has been drained.
    pub fn finish_current(&mut self) {
        if self.closed.front() == Some(&0) {
            self.closed.pop_front();
        }
    }

    /// Discards whatever is left of the current closed message.
    pub fn drop_current(&mut self) {
        if let Some(rest) = self.closed.pop_front() {
            self.items.drain(..rest);
            self.closed_total -= rest;
        }
    }

    /// Removes every element and message boundary.
    pub fn clear(&mut self) {
        self.items.clear();
        self.closed.clear();
        self.closed_total = 0;
    }
}
