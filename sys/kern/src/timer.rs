// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot timed event delivery.
//!
//! Armed timers live in a single linked list ordered by deadline. Each entry
//! stores its delay *relative to its predecessor*, so the whole list is a
//! chain of deltas: the head holds milliseconds until it fires, every other
//! entry holds milliseconds after the one before it. The tick path then only
//! ever touches the head -- decrement, fire, pop -- which keeps the interrupt
//! work constant in the common case where nothing matures.
//!
//! Invariants:
//!
//! - The sum of deltas from the head through any entry equals the wall time
//!   until that entry fires.
//! - At most one entry exists per `(task, event)` pair.
//! - Entries with equal deadlines sit in arming order, and fire in that
//!   order. Insertion walks past entries with equal cumulative deadline, so a
//!   newly armed timer never jumps ahead of an older one firing at the same
//!   millisecond.

use abi::{EventId, TaskId, TimerError, EVENT_MAX};
use alloc::boxed::Box;

use crate::kernel::with_kernel;

fn check_event(event: EventId) {
    assert!(event.0 < EVENT_MAX);
}

struct Entry {
    task: TaskId,
    event: EventId,
    /// Milliseconds after the previous entry fires (absolute for the head).
    delta: u32,
    next: Option<Box<Entry>>,
}

pub(crate) struct TimerList {
    head: Option<Box<Entry>>,
}

impl TimerList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    fn contains(&self, task: TaskId, event: EventId) -> bool {
        let mut cursor = &self.head;
        while let Some(entry) = cursor {
            if entry.task == task && entry.event == event {
                return true;
            }
            cursor = &entry.next;
        }
        false
    }

    /// Arms a timer for `(task, event)` firing `delay_ms` from now.
    pub(crate) fn create(
        &mut self,
        task: TaskId,
        event: EventId,
        delay_ms: u32,
    ) -> Result<(), TimerError> {
        if self.contains(task, event) {
            return Err(TimerError::AlreadyExists);
        }

        // Walk off the delays of everything that fires at or before our
        // deadline; `remaining` becomes the new entry's delta.
        let mut remaining = delay_ms;
        let mut cursor = &mut self.head;
        loop {
            let walk_on = match cursor {
                Some(entry) => entry.delta <= remaining,
                None => false,
            };
            if !walk_on {
                break;
            }
            let entry = cursor.as_mut().unwrap();
            remaining -= entry.delta;
            cursor = &mut entry.next;
        }

        // Splice in, rebasing the downstream neighbor so every deadline past
        // the insertion point is unchanged.
        let mut rest = cursor.take();
        if let Some(next) = rest.as_mut() {
            next.delta -= remaining;
        }
        *cursor = Some(Box::new(Entry {
            task,
            event,
            delta: remaining,
            next: rest,
        }));
        Ok(())
    }

    /// Disarms the timer for `(task, event)`. Returns whether an entry was
    /// actually removed; a missing entry is not an error.
    pub(crate) fn delete(&mut self, task: TaskId, event: EventId) -> bool {
        let mut cursor = &mut self.head;
        loop {
            let found = match cursor {
                Some(entry) => entry.task == task && entry.event == event,
                None => return false,
            };
            if found {
                let mut removed = cursor.take().unwrap();
                let mut rest = removed.next.take();
                if let Some(next) = rest.as_mut() {
                    // Hand our delay down so the survivors keep their
                    // absolute deadlines.
                    next.delta += removed.delta;
                }
                *cursor = rest;
                return true;
            }
            let entry = cursor.as_mut().unwrap();
            cursor = &mut entry.next;
        }
    }

    /// Milliseconds until `(task, event)` fires, if armed.
    pub(crate) fn remaining(&self, task: TaskId, event: EventId) -> Option<u32> {
        let mut total: u32 = 0;
        let mut cursor = &self.head;
        while let Some(entry) = cursor {
            total += entry.delta;
            if entry.task == task && entry.event == event {
                return Some(total);
            }
            cursor = &entry.next;
        }
        None
    }

    /// Accounts for `elapsed` milliseconds, firing every entry whose deadline
    /// falls within the span through `post`. Entries fire in list order, so
    /// equal deadlines fire FIFO by arming time. Tolerates spans longer than
    /// the whole list.
    pub(crate) fn advance(
        &mut self,
        mut elapsed: u32,
        mut post: impl FnMut(TaskId, EventId),
    ) {
        loop {
            match self.head.as_mut() {
                None => return,
                Some(head) => {
                    if head.delta > elapsed {
                        head.delta -= elapsed;
                        return;
                    }
                }
            }
            let mut fired = self.head.take().unwrap();
            elapsed -= fired.delta;
            self.head = fired.next.take();
            post(fired.task, fired.event);
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        let mut n = 0;
        let mut cursor = &self.head;
        while let Some(entry) = cursor {
            n += 1;
            cursor = &entry.next;
        }
        n
    }
}

// The default recursive drop of a long chain could eat surprising amounts of
// stack; unlink iteratively instead.
impl Drop for TimerList {
    fn drop(&mut self) {
        let mut cursor = self.head.take();
        while let Some(mut entry) = cursor {
            cursor = entry.next.take();
        }
    }
}

/// Arms a one-shot delivery of `event` to `task` after `delay_ms`.
///
/// A `delay_ms` of zero sets the event bit synchronously instead of arming
/// anything; the dispatcher sees it on its next scan. If a timer for this
/// `(task, event)` pair is already armed the call fails with
/// [`TimerError::AlreadyExists`] -- use [`timer_update`] for
/// replace-semantics.
pub fn timer_create(
    task: TaskId,
    event: EventId,
    delay_ms: u32,
) -> Result<(), TimerError> {
    check_event(event);
    with_kernel(|k| {
        let index = k.check_task(task);
        if k.timers.contains(task, event) {
            return Err(TimerError::AlreadyExists);
        }
        if delay_ms == 0 {
            k.post(index, event);
            return Ok(());
        }
        k.timers.create(task, event, delay_ms)
    })
}

/// Disarms the timer for `(task, event)`. Deleting a timer that isn't armed
/// -- including one that just fired -- is a no-op.
pub fn timer_delete(task: TaskId, event: EventId) {
    check_event(event);
    with_kernel(|k| {
        k.check_task(task);
        k.timers.delete(task, event);
    })
}

/// Reschedules `(task, event)` to fire `new_delay_ms` from now, whether or
/// not it was armed. Equivalent to [`timer_delete`] followed by
/// [`timer_create`].
pub fn timer_update(task: TaskId, event: EventId, new_delay_ms: u32) {
    check_event(event);
    with_kernel(|k| {
        let index = k.check_task(task);
        k.timers.delete(task, event);
        if new_delay_ms == 0 {
            k.post(index, event);
        } else {
            // The pair was just removed, so arming cannot fail.
            let _ = k.timers.create(task, event, new_delay_ms);
        }
    })
}

/// Milliseconds until the timer for `(task, event)` fires, or `None` if no
/// such timer is armed.
pub fn timer_get_remaining(task: TaskId, event: EventId) -> Option<u32> {
    check_event(event);
    with_kernel(|k| {
        k.check_task(task);
        k.timers.remaining(task, event)
    })
}
