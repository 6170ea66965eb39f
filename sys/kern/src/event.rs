// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The event matrix: one pending-event word per task.
//!
//! Setting a bit is how anything -- another task, a driver interrupt, a timer
//! -- asks for a task's handler to run. Bits are level-triggered and carry no
//! payload or count: setting an already-set bit is a no-op, and a task that
//! can be signalled faster than it runs must be prepared to find only one bit
//! where two requests were made.

use abi::{EventId, EventMask, TaskId};

use crate::kernel::with_kernel;

/// Makes `event` pending for `task`.
///
/// Legal from both task and interrupt context. Idempotent: concurrent sets of
/// the same bit leave it set, with no ordering between them.
pub fn event_set(task: TaskId, event: EventId) {
    with_kernel(|k| {
        let index = k.check_task(task);
        k.post(index, event);
    })
}

/// Withdraws a pending `event` from `task`. Clearing a clear bit is a no-op.
///
/// Legal from both task and interrupt context.
pub fn event_clear(task: TaskId, event: EventId) {
    with_kernel(|k| {
        let index = k.check_task(task);
        k.events[index] &= !event.mask();
    })
}

/// Reads `task`'s pending-event word.
pub fn event_pending(task: TaskId) -> EventMask {
    with_kernel(|k| {
        let index = k.check_task(task);
        k.events[index]
    })
}
