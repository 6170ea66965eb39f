// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Comity kernel.
//!
//! This is the cooperative core of the system: the per-task event words, the
//! timer list that turns elapsed milliseconds into event bits, the per-task
//! message queues, and the dispatch loop that runs task handlers. Everything
//! hardware-shaped (interrupt controllers, peripherals, the tick source, the
//! heap) belongs to the platform; the kernel's only demands on it are a
//! `critical-section` implementation, a global allocator, and a periodic call
//! to [`tick_advance`] from the tick interrupt.
//!
//! # Execution model
//!
//! One stack, no preemption between tasks. Tasks are plain functions listed
//! in a registry; the dispatcher picks the lowest-numbered task with a
//! pending event, delivers the lowest pending event bit, and rescans from
//! task 0 when the handler returns. Interrupt handlers wake tasks by setting
//! event bits or sending messages; everything they share with task code is
//! mutated inside the critical section only.
//!
//! # Algorithm naivety principles
//!
//! This implementation uses *really naive algorithms*. This is deliberate:
//!
//! 1. Use safe Rust for as much as possible.
//! 2. Use easily understood and debugged algorithms.
//! 3. Revisit these decisions if they become performance problems.
//!
//! The assumptions enabling our naivete: the task count is fixed at build
//! time and small, few timers exist at once, and the dispatch rate is bounded
//! by how fast interrupts can make work.

#![cfg_attr(not(any(test, feature = "test-harness")), no_std)]

extern crate alloc;

mod kernel;

pub mod event;
pub mod msg;
pub mod startup;
pub mod task;
pub mod time;
pub mod timer;

#[cfg(any(test, feature = "test-harness"))]
pub mod harness;

#[cfg(test)]
mod scenarios;

pub use abi::{EventId, EventMask, TaskId, TimerError, EVENT_MAX};

pub use event::{event_clear, event_pending, event_set};
pub use msg::{msg_alloc, msg_recv, msg_send, Msg};
pub use startup::start;
pub use task::{self_task_id, TaskDesc};
pub use time::{now_ms, now_split, tick_advance, Timestamp};
pub use timer::{timer_create, timer_delete, timer_get_remaining, timer_update};
