// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel state and the discipline for getting at it.
//!
//! All mutable kernel state lives in one [`Kernel`] value, installed once at
//! startup into a global cell. Both task-context API calls and interrupt
//! handlers reach it through [`with_kernel`], which takes the critical
//! section for exactly the duration of the state mutation. Task handlers are
//! always invoked *outside* the critical section; nothing in this module may
//! call back into task code.

use core::cell::RefCell;

use abi::{EventId, EventMask, TaskId};
use alloc::boxed::Box;
use alloc::vec;
use critical_section::Mutex;

use crate::msg::MsgQueue;
use crate::task::TaskDesc;
use crate::time::Timestamp;
use crate::timer::TimerList;

/// The kernel's entire mutable state.
pub(crate) struct Kernel {
    /// The application's task table, in task-id order. Immutable.
    pub(crate) registry: &'static [TaskDesc],
    /// Pending-event word per task, indexed by task id.
    pub(crate) events: Box<[EventMask]>,
    /// Message queue heads/tails per task, indexed by task id.
    pub(crate) queues: Box<[MsgQueue]>,
    /// Armed one-shot timers.
    pub(crate) timers: TimerList,
    /// Milliseconds since startup, maintained by the tick interrupt.
    pub(crate) now: Timestamp,
    /// Task whose init hook or handler is currently on the stack, if any.
    pub(crate) current: Option<TaskId>,
}

impl Kernel {
    pub(crate) fn new(registry: &'static [TaskDesc]) -> Self {
        assert!(!registry.is_empty());
        // Task ids must fit the ABI's id type.
        assert!(registry.len() <= usize::from(u8::MAX) + 1);

        Self {
            registry,
            events: vec![0; registry.len()].into_boxed_slice(),
            queues: (0..registry.len()).map(|_| MsgQueue::new()).collect(),
            timers: TimerList::new(),
            now: Timestamp::from(0),
            current: None,
        }
    }

    /// Converts a caller-supplied task id into a table index, aborting on ids
    /// the registry doesn't cover. Bad task ids are a programming error, not
    /// a runtime condition.
    pub(crate) fn check_task(&self, task: TaskId) -> usize {
        let index = task.index();
        assert!(index < self.registry.len());
        index
    }

    /// Makes `event` pending for the task at `index`. Idempotent.
    pub(crate) fn post(&mut self, index: usize, event: EventId) {
        self.events[index] |= event.mask();
    }
}

static KERNEL: Mutex<RefCell<Option<Kernel>>> = Mutex::new(RefCell::new(None));

/// Installs `kernel` as the one kernel. May happen once.
pub(crate) fn install(kernel: Kernel) {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow_ref_mut(cs);
        assert!(slot.is_none());
        *slot = Some(kernel);
    })
}

/// Runs `body` with the critical section held and the kernel state borrowed.
///
/// Panics if called before [`install`], which would mean a component or ISR
/// is using the kernel API before `start`.
pub(crate) fn with_kernel<R>(body: impl FnOnce(&mut Kernel) -> R) -> R {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow_ref_mut(cs);
        match slot.as_mut() {
            Some(kernel) => body(kernel),
            None => panic!("kernel API used before start"),
        }
    })
}

/// Replaces the installed kernel wholesale. Tests re-boot the kernel many
/// times per process, which the one-shot [`install`] forbids.
#[cfg(any(test, feature = "test-harness"))]
pub(crate) fn reset(kernel: Kernel) {
    critical_section::with(|cs| {
        *KERNEL.borrow_ref_mut(cs) = Some(kernel);
    })
}
