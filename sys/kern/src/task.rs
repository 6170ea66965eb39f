// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The task registry and the dispatcher.
//!
//! A task is a pair of plain functions in the application's registry: an init
//! hook run once at startup, and a handler invoked with one event id per
//! dispatch. Handlers run to completion on the main stack -- there is no
//! preemption between tasks and no per-task context, which is what keeps
//! this kernel small enough for parts with a few kilobytes of RAM.
//!
//! Scheduling is fixed-priority by construction: position in the registry is
//! priority, lower index winning. Within a task, the lowest pending event id
//! is delivered first. After every handler the scan restarts from task 0, so
//! work posted for a more important task during a handler (or by an
//! interrupt while the handler ran) is always picked up next. A task that
//! perpetually re-arms its own event therefore starves everything after it;
//! that is the documented cost of keeping the scheduler a ten-line loop.

use abi::{EventId, TaskId};

use crate::kernel::{with_kernel, Kernel};

/// Task init hook. Runs once, before dispatch begins; may use the full
/// kernel API to pre-seed events, arm timers, or send messages.
pub type InitFn = fn();

/// Task event handler. Receives the event id being delivered; must return
/// rather than spin -- a task with more work to do posts an event to itself.
pub type HandlerFn = fn(EventId);

/// One entry in the application's task registry. The registry is a static
/// array in task-id order, fixed for the life of the program.
pub struct TaskDesc {
    pub init: InitFn,
    pub handler: HandlerFn,
}

/// Returns the id of the task whose init hook or handler is currently
/// running. Aborts when called from outside both (e.g. from an interrupt
/// handler, which has no task identity).
pub fn self_task_id() -> TaskId {
    with_kernel(|k| match k.current {
        Some(task) => task,
        None => panic!("no task context"),
    })
}

impl Kernel {
    /// Scheduling decision: finds the lowest-index task with a pending
    /// event, claims that task's lowest pending bit, and returns the handler
    /// to run. The bit is cleared here, under the critical section, so a
    /// handler re-posting its own event is observed on the *next* scan.
    fn take_next(&mut self) -> Option<(EventId, HandlerFn)> {
        for (index, word) in self.events.iter_mut().enumerate() {
            if *word != 0 {
                let event = EventId(word.trailing_zeros() as u8);
                *word &= !event.mask();
                self.current = Some(TaskId(index as u8));
                return Some((event, self.registry[index].handler));
            }
        }
        None
    }
}

/// One dispatch step: delivers the next pending event, if any. Returns
/// whether a handler ran. The handler itself runs with interrupts live --
/// only the scheduling decision happens inside the critical section.
pub(crate) fn poll() -> bool {
    match with_kernel(Kernel::take_next) {
        Some((event, handler)) => {
            handler(event);
            true
        }
        None => false,
    }
}
