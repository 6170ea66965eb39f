// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side test harness.
//!
//! Kernel state is a process-wide singleton and [`crate::start`] never
//! returns, which is correct on a target and useless in a test. This module
//! gives tests -- the kernel's own and those of component crates -- a way to
//! install a fresh kernel repeatedly and crank the dispatcher by hand. Tests
//! hold the returned guard for their whole body, which serializes everything
//! that touches the singleton.
//!
//! Compiled only under `cfg(test)` or the `test-harness` feature; it has no
//! place on a target.

use std::sync::{Mutex, MutexGuard, PoisonError};

use abi::EventId;

use crate::kernel::{self, Kernel};
use crate::task::TaskDesc;

static SEQ: Mutex<()> = Mutex::new(());

/// Installs a fresh kernel over `registry`, runs its init hooks in order,
/// and returns the guard that serializes kernel-touching tests.
pub fn boot(registry: &'static [TaskDesc]) -> MutexGuard<'static, ()> {
    let guard = boot_quiet(registry);
    crate::startup::run_init_hooks(registry);
    guard
}

/// Like [`boot`], but skips the init hooks, for tests that want to watch
/// them run (or keep them from running at all).
pub fn boot_quiet(registry: &'static [TaskDesc]) -> MutexGuard<'static, ()> {
    // A poisoned lock just means an earlier test failed; the next boot
    // replaces all shared state anyway.
    let guard = SEQ.lock().unwrap_or_else(PoisonError::into_inner);
    kernel::reset(Kernel::new(registry));
    guard
}

/// One dispatch step: delivers the next pending event, if any. Returns
/// whether a handler ran.
pub fn step() -> bool {
    crate::task::poll()
}

/// Dispatches until no task is ready, returning how many handlers ran.
/// Panics rather than spin forever on a self-reposting task.
pub fn run_until_idle() -> usize {
    let mut ran = 0;
    while step() {
        ran += 1;
        assert!(ran < 10_000, "dispatch never went idle");
    }
    ran
}

pub fn noop_init() {}

pub fn noop_handler(_event: EventId) {}

/// A registry entry that ignores everything, for padding test registries to
/// the task layout under test.
pub const fn noop_task() -> TaskDesc {
    TaskDesc {
        init: noop_init,
        handler: noop_handler,
    }
}
