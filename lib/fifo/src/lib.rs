// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simple byte FIFO with owned, run-time-sized storage.
//!
//! This exists for driver-side buffering -- the console uses one to smooth
//! transmit bursts over a slow UART -- so the design goals are modest:
//!
//! 1. `no_std` (plus an allocator, which the rest of the system already
//!    requires).
//! 2. Storage sized at creation and released on drop, so a buffer only
//!    exists while there is a burst to absorb.
//! 3. No clever index arithmetic; a FIFO is not where you want to discover
//!    an off-by-one.
//!
//! Non-goals: concurrent access (callers bring their own mutual exclusion)
//! and overwrite-on-full (a full FIFO refuses bytes; the caller chooses a
//! policy).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec;

/// Error returned when the FIFO has no room for another byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FifoFull;

#[derive(Debug)]
pub struct Fifo {
    storage: Box<[u8]>,
    /// Next slot to read.
    head: usize,
    /// Next slot to write.
    tail: usize,
    len: usize,
}

impl Fifo {
    /// Creates an empty FIFO holding up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            storage: vec![0; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.storage.len()
    }

    /// Appends `byte`, oldest-first order preserved.
    pub fn put(&mut self, byte: u8) -> Result<(), FifoFull> {
        if self.is_full() {
            return Err(FifoFull);
        }
        self.storage[self.tail] = byte;
        self.tail += 1;
        if self.tail == self.storage.len() {
            self.tail = 0;
        }
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the oldest byte.
    pub fn get(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.storage[self.head];
        self.head += 1;
        if self.head == self.storage.len() {
            self.head = 0;
        }
        self.len -= 1;
        Some(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let fifo = Fifo::with_capacity(8);
        assert!(fifo.is_empty());
        assert!(!fifo.is_full());
        assert_eq!(fifo.len(), 0);
        assert_eq!(fifo.capacity(), 8);
    }

    #[test]
    fn preserves_order() {
        let mut fifo = Fifo::with_capacity(8);
        for b in b"hello" {
            fifo.put(*b).unwrap();
        }
        let mut out = Vec::new();
        while let Some(b) = fifo.get() {
            out.push(b);
        }
        assert_eq!(out, b"hello");
    }

    #[test]
    fn refuses_bytes_when_full() {
        let mut fifo = Fifo::with_capacity(2);
        fifo.put(1).unwrap();
        fifo.put(2).unwrap();
        assert_eq!(fifo.put(3), Err(FifoFull));
        assert_eq!(fifo.len(), 2);
        // Draining one makes room for one.
        assert_eq!(fifo.get(), Some(1));
        fifo.put(3).unwrap();
        assert_eq!(fifo.get(), Some(2));
        assert_eq!(fifo.get(), Some(3));
    }

    #[test]
    fn get_on_empty_returns_none() {
        let mut fifo = Fifo::with_capacity(4);
        assert_eq!(fifo.get(), None);
        fifo.put(9).unwrap();
        assert_eq!(fifo.get(), Some(9));
        assert_eq!(fifo.get(), None);
    }

    #[test]
    fn wraps_cleanly_many_times() {
        let mut fifo = Fifo::with_capacity(3);
        for round in 0..10u8 {
            fifo.put(round).unwrap();
            fifo.put(round.wrapping_add(100)).unwrap();
            assert_eq!(fifo.get(), Some(round));
            assert_eq!(fifo.get(), Some(round.wrapping_add(100)));
        }
        assert!(fifo.is_empty());
    }
}
