// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel startup.

use abi::TaskId;

use crate::kernel::{self, Kernel};
use crate::task::{self, TaskDesc};

/// Brings the kernel up over `registry` and runs it forever.
///
/// Each task's init hook runs first, in task-id order; hooks commonly
/// pre-seed events or arm timers so there is work waiting when dispatch
/// begins. `idle_hook` is called whenever no task has a pending event --
/// platforms put their wait-for-interrupt (or deeper sleep policy) there.
///
/// The platform must have a `critical-section` implementation and a global
/// allocator in place, and should start feeding [`crate::tick_advance`] from
/// its tick interrupt; timers stand still until it does.
pub fn start(registry: &'static [TaskDesc], idle_hook: fn()) -> ! {
    kernel::install(Kernel::new(registry));
    run_init_hooks(registry);
    loop {
        if !task::poll() {
            idle_hook();
        }
    }
}

/// Runs init hooks in registry order. Hooks run outside the critical
/// section, with task identity set so `self_task_id` works.
pub(crate) fn run_init_hooks(registry: &'static [TaskDesc]) {
    for (index, desc) in registry.iter().enumerate() {
        kernel::with_kernel(|k| k.current = Some(TaskId(index as u8)));
        (desc.init)();
    }
}
