// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LED effects.
//!
//! Steady on/off/toggle plus duty-cycle blinking for up to eight LEDs,
//! driven entirely by one kernel timer slot: each wakeup walks the blink
//! table, toggles whichever LEDs have an edge due, and re-arms the timer for
//! the nearest next edge. The actual pins belong to the board; this
//! component writes them through a function the application supplies at
//! init.
//!
//! Register this component's [`init`] and [`handler`] as one task. All other
//! entry points may be called from any task's handler or init hook (not from
//! interrupts).

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;

use bitflags::bitflags;
use critical_section::Mutex;
use kern::{EventId, TaskId};
use ringbuf::{ringbuf, ringbuf_entry};

bitflags! {
    /// Selects one or more LEDs. The LED number is the bit position.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Leds: u8 {
        const LED_0 = 1 << 0;
        const LED_1 = 1 << 1;
        const LED_2 = 1 << 2;
        const LED_3 = 1 << 3;
        const LED_4 = 1 << 4;
        const LED_5 = 1 << 5;
        const LED_6 = 1 << 6;
        const LED_7 = 1 << 7;
    }
}

/// Event this component arms its wakeup timer with. The task it registers
/// under must not use this id for anything else.
pub const EVT_UPDATE: EventId = EventId(1);

const LED_MAX: usize = 8;

/// Application-supplied configuration.
pub struct Config {
    /// Writes one LED: index 0..8, `true` = lit. Polarity and pin mapping
    /// are the board's business.
    pub write: fn(u8, bool),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Blink { leds: u8, count: u8 },
    Steady { leds: u8, lit: bool },
    Restore { led: u8, lit: bool },
}

ringbuf!(Trace, 16, Trace::None);

/// Per-LED blink bookkeeping. Absent entry = steady state.
#[derive(Copy, Clone)]
struct Blink {
    /// Full cycles still to run; unused when `forever`.
    left: u8,
    forever: bool,
    /// Percentage of each period spent lit, 1..=99.
    duty_pct: u8,
    period_ms: u16,
    /// Wall time of the next edge.
    next: u64,
    /// Currently in the lit phase of the cycle.
    lit: bool,
}

struct LedState {
    task: TaskId,
    write: fn(u8, bool),
    /// LEDs currently commanded lit.
    lit: Leds,
    /// Steady state to restore per LED when its blink finishes.
    pre_blink: Leds,
    blinks: [Option<Blink>; LED_MAX],
}

static STATE: Mutex<RefCell<Option<LedState>>> =
    Mutex::new(RefCell::new(None));

fn with_state<R>(body: impl FnOnce(&mut LedState) -> R) -> R {
    critical_section::with(|cs| {
        let mut slot = STATE.borrow_ref_mut(cs);
        match slot.as_mut() {
            Some(state) => body(state),
            None => panic!("led component not initialized"),
        }
    })
}

/// Init hook: takes this task's identity and the pin writer, and turns
/// everything off.
pub fn init(config: Config) {
    let task = kern::self_task_id();
    for index in 0..LED_MAX as u8 {
        (config.write)(index, false);
    }
    critical_section::with(|cs| {
        *STATE.borrow_ref_mut(cs) = Some(LedState {
            task,
            write: config.write,
            lit: Leds::empty(),
            pre_blink: Leds::empty(),
            blinks: [None; LED_MAX],
        });
    });
}

/// Event handler: the only event this task receives is its own wakeup.
pub fn handler(event: EventId) {
    assert_eq!(event, EVT_UPDATE);
    update();
}

/// Forces `leds` steadily on, cancelling any blink in progress on them.
pub fn set(leds: Leds) {
    ringbuf_entry!(Trace::Steady {
        leds: leds.bits(),
        lit: true
    });
    steady(leds, true);
}

/// Forces `leds` steadily off, cancelling any blink in progress on them.
pub fn clr(leds: Leds) {
    ringbuf_entry!(Trace::Steady {
        leds: leds.bits(),
        lit: false
    });
    steady(leds, false);
}

/// Toggles the steady state of `leds`, cancelling any blink in progress.
pub fn toggle(leds: Leds) {
    with_state(|s| {
        for (index, bit) in each_led(leds) {
            let lit = !s.lit.contains(bit);
            s.blinks[index] = None;
            s.pre_blink.remove(bit);
            s.lit.set(bit, lit);
            (s.write)(index as u8, lit);
        }
    })
}

/// The LEDs currently commanded lit.
pub fn get_state() -> Leds {
    with_state(|s| s.lit)
}

/// Blinks `leds`: `count` cycles (0 = until further notice) of `period_ms`
/// each, lit for `duty_pct` percent of every cycle. When a counted blink
/// finishes, the LED returns to the steady state it had before blinking.
///
/// Degenerate duty cycles degrade to steady state: 0 percent (or a zero
/// period) is [`clr`], 100 or more is [`set`].
pub fn blink(leds: Leds, count: u8, duty_pct: u8, period_ms: u16) {
    if leds.is_empty() {
        return;
    }
    if duty_pct == 0 || period_ms == 0 {
        clr(leds);
        return;
    }
    if duty_pct >= 100 {
        set(leds);
        return;
    }

    ringbuf_entry!(Trace::Blink {
        leds: leds.bits(),
        count
    });

    let now = kern::now_ms();
    let task = with_state(|s| {
        for (index, bit) in each_led(leds) {
            // Keep the original steady state across nested blink requests:
            // only the first one on a steady LED records it.
            if s.blinks[index].is_none() {
                s.pre_blink.set(bit, s.lit.contains(bit));
            }
            s.blinks[index] = Some(Blink {
                left: count,
                forever: count == 0,
                duty_pct,
                period_ms,
                next: now,
                lit: false,
            });
        }
        s.task
    });

    // First edge is due immediately; cancel any armed wakeup and let the
    // dispatcher call update() straight away.
    kern::timer_delete(task, EVT_UPDATE);
    kern::event_set(task, EVT_UPDATE);
}

fn steady(leds: Leds, lit: bool) {
    with_state(|s| {
        for (index, bit) in each_led(leds) {
            s.blinks[index] = None;
            s.pre_blink.remove(bit);
            s.lit.set(bit, lit);
            (s.write)(index as u8, lit);
        }
    })
}

fn each_led(leds: Leds) -> impl Iterator<Item = (usize, Leds)> {
    (0..LED_MAX).filter_map(move |index| {
        let bit = Leds::from_bits_truncate(1 << index);
        leds.contains(bit).then_some((index, bit))
    })
}

/// Milliseconds of one blink phase; never zero, so a wakeup always makes
/// progress.
fn phase_ms(pct: u8, period_ms: u16) -> u32 {
    (u32::from(pct) * u32::from(period_ms) / 100).max(1)
}

fn update() {
    let now = kern::now_ms();
    let (task, wait) = with_state(|s| {
        let mut wait: Option<u32> = None;
        for index in 0..LED_MAX {
            let Some(mut b) = s.blinks[index] else {
                continue;
            };
            let bit = Leds::from_bits_truncate(1 << index);

            let this_wait;
            if now >= b.next {
                if b.lit {
                    // Lit phase over; off for the rest of the period.
                    b.lit = false;
                    s.lit.remove(bit);
                    (s.write)(index as u8, false);
                    if !b.forever {
                        b.left -= 1;
                    }
                    this_wait = phase_ms(100 - b.duty_pct, b.period_ms);
                    b.next = now + u64::from(this_wait);
                    s.blinks[index] = Some(b);
                } else if !b.forever && b.left == 0 {
                    // Cycle count exhausted; put the LED back the way the
                    // blink found it.
                    let lit = s.pre_blink.contains(bit);
                    s.blinks[index] = None;
                    s.pre_blink.remove(bit);
                    s.lit.set(bit, lit);
                    (s.write)(index as u8, lit);
                    ringbuf_entry!(Trace::Restore {
                        led: index as u8,
                        lit
                    });
                    continue;
                } else {
                    b.lit = true;
                    s.lit.insert(bit);
                    (s.write)(index as u8, true);
                    this_wait = phase_ms(b.duty_pct, b.period_ms);
                    b.next = now + u64::from(this_wait);
                    s.blinks[index] = Some(b);
                }
            } else {
                this_wait = (b.next - now) as u32;
                s.blinks[index] = Some(b);
            }

            wait = Some(match wait {
                Some(w) => w.min(this_wait),
                None => this_wait,
            });
        }
        (s.task, wait)
    });

    if let Some(wait) = wait {
        kern::timer_update(task, EVT_UPDATE, wait);
    }
}
