// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel ABI definitions, shared between the kernel and components.
//!
//! This crate owns the vocabulary types that cross the kernel boundary: task
//! and event identity, and the width of the per-task event word. It contains
//! no behavior beyond trivial accessors, so that components can depend on it
//! without dragging in the kernel.

#![cfg_attr(not(test), no_std)]

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

cfg_if::cfg_if! {
    if #[cfg(feature = "events-u32")] {
        /// One task's pending-event word. Each bit is one level-triggered
        /// event; the width is a build-time choice made through this crate's
        /// features.
        pub type EventMask = u32;
    } else if #[cfg(feature = "events-u16")] {
        /// One task's pending-event word. Each bit is one level-triggered
        /// event; the width is a build-time choice made through this crate's
        /// features.
        pub type EventMask = u16;
    } else {
        /// One task's pending-event word. Each bit is one level-triggered
        /// event; the width is a build-time choice made through this crate's
        /// features.
        pub type EventMask = u8;
    }
}

/// Number of distinct event ids a task can use, equal to the bit width of
/// [`EventMask`].
pub const EVENT_MAX: u8 = EventMask::BITS as u8;

/// Names a task.
///
/// Task ids are small dense integers assigned by position in the
/// application's registry: the first entry is task 0, and so on. The task set
/// is fixed for the life of the program, so an id never goes stale.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(transparent)]
pub struct TaskId(pub u8);

impl TaskId {
    /// Returns the id as a table index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Names one event within a task's event word.
///
/// Event numbering is per-task: event 3 of the console task and event 3 of
/// the LED task are unrelated. The single exception is [`EventId::MSG`],
/// which the kernel reserves in every task's namespace for message delivery.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(transparent)]
pub struct EventId(pub u8);

impl EventId {
    /// Reserved event, set implicitly whenever a message lands in a task's
    /// queue.
    pub const MSG: Self = Self(0);

    /// Returns the single-bit mask for this event.
    ///
    /// Ids at or past [`EVENT_MAX`] are a programming error and abort.
    pub fn mask(self) -> EventMask {
        assert!(self.0 < EVENT_MAX);
        (1 as EventMask) << self.0
    }
}

/// Errors surfaced by timer arming.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerError {
    /// A timer for this `(task, event)` pair is already armed. Callers that
    /// want replace-semantics should use the reschedule operation instead.
    AlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_is_event_zero() {
        assert_eq!(EventId::MSG, EventId(0));
        assert_eq!(EventId::MSG.mask(), 1);
    }

    #[test]
    fn masks_are_single_bits() {
        for id in 0..EVENT_MAX {
            let mask = EventId(id).mask();
            assert_eq!(mask.count_ones(), 1);
            assert_eq!(mask.trailing_zeros(), u32::from(id));
        }
    }

    #[test]
    #[should_panic]
    fn mask_rejects_out_of_range_id() {
        let _ = EventId(EVENT_MAX).mask();
    }
}
