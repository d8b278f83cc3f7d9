// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded FIFO of pending commands: a const-generic array-backed ring
//! buffer, so it needs no allocator.

use crate::{Command, StateFlags};

/// One queued command together with the flags the coordinator should
/// install on dispatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use_defmt", derive(defmt::Format))]
pub struct QueueEntry {
    pub command: Command,
    pub flags: StateFlags,
}

/// A ring-buffer queue with capacity `CAP` (4-8 is the sweet spot: enough to
/// pipeline a playlist jump without the latency of a long queue).
#[derive(Debug)]
pub struct CommandQueue<const CAP: usize> {
    buffer: [Option<QueueEntry>; CAP],
    head: usize,
    tail: usize,
    full: bool,
}

impl<const CAP: usize> Default for CommandQueue<CAP> {
    fn default() -> Self {
        debug_assert!((2..=8).contains(&CAP), "queue capacity must be 2-8");
        Self {
            buffer: [None; CAP],
            head: 0,
            tail: 0,
            full: false,
        }
    }
}

impl<const CAP: usize> CommandQueue<CAP> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail && !self.full
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.full = false;
    }

    /// Precondition: `!is_empty()`.
    pub fn peek_front(&self) -> Option<QueueEntry> {
        if self.is_empty() {
            None
        } else {
            self.buffer[self.head]
        }
    }

    pub fn pop_front(&mut self) {
        if self.is_empty() {
            return;
        }
        self.buffer[self.head] = None;
        self.head = (self.head + 1) % CAP;
        self.full = false;
    }

    /// Returns `Err` if the queue is already full; overflow is reported to
    /// the caller rather than silently dropped.
    pub fn push_back(&mut self, entry: QueueEntry) -> Result<(), crate::Error> {
        if self.full {
            return Err(crate::Error::QueueFull);
        }
        self.buffer[self.tail] = Some(entry);
        self.tail = (self.tail + 1) % CAP;
        self.full = self.tail == self.head;
        Ok(())
    }
}
