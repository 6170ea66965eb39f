// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host demo application.
//!
//! Runs the whole stack on a workstation, with std threads standing in for
//! the board: one thread is the millisecond tick interrupt, another plays
//! the UART receive interrupt off stdin, and the LEDs render as a status
//! line on stdout. Everything above that line -- kernel, LED effects, console
//! -- is the same code a target build would run.
//!
//! Type at it: lines echo back tagged, and the registered commands
//! (`uptime`, `led on`, `led off`) poke the live system.

use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use drv_uart_api::{Config, DataBits, Event, Parity, StopBits, Uart};
use kern::{EventId, TaskDesc, TaskId};
use task_cli as cli;
use task_led as led;
use task_led::Leds;

const TASK_DEMO: TaskId = TaskId(0);

const EVT_BLINK_FAST: EventId = EventId(1);
const EVT_BLINK_SLOW: EventId = EventId(2);

const TICK_MS: u32 = 1;

static TASKS: [TaskDesc; 3] = [
    TaskDesc {
        init: demo_init,
        handler: demo_task,
    },
    TaskDesc {
        init: led_init,
        handler: led::handler,
    },
    TaskDesc {
        init: cli_init,
        handler: cli::handler,
    },
];

fn main() {
    kern::start(&TASKS, idle);
}

fn idle() {
    // A real board would wait for interrupt here.
    thread::sleep(Duration::from_micros(500));
}

// --- demo task: blink fast now, switch to slow after ten seconds ---

fn demo_init() {
    spawn_tick();
    kern::event_set(TASK_DEMO, EVT_BLINK_FAST);
    kern::timer_create(TASK_DEMO, EVT_BLINK_SLOW, 10_000).unwrap();
}

fn demo_task(event: EventId) {
    match event {
        EVT_BLINK_FAST => led::blink(Leds::all(), 0, 50, 300),
        EVT_BLINK_SLOW => led::blink(Leds::all(), 0, 50, 1000),
        _ => panic!("demo task got event {event:?}"),
    }
}

/// The board's tick interrupt.
fn spawn_tick() {
    thread::spawn(|| loop {
        thread::sleep(Duration::from_millis(u64::from(TICK_MS)));
        kern::tick_advance(TICK_MS);
    });
}

// --- LED rendering ---

fn led_init() {
    led::init(led::Config { write: draw_led });
}

static LED_STATE: Mutex<[bool; 8]> = Mutex::new([false; 8]);

fn draw_led(index: u8, lit: bool) {
    let mut leds = LED_STATE.lock().unwrap();
    leds[usize::from(index)] = lit;
    let mut line = String::from("\rleds [");
    for &on in leds.iter() {
        line.push(if on { '#' } else { '.' });
    }
    line.push_str("] ");
    let mut out = io::stdout();
    out.write_all(line.as_bytes()).ok();
    out.flush().ok();
}

// --- console wiring ---

struct StdioUart {
    rx: Mutex<Vec<u8>>,
}

impl Uart for StdioUart {
    fn putc(&self, byte: u8) {
        let mut out = io::stdout();
        out.write_all(&[byte]).ok();
        out.flush().ok();
    }

    fn getc(&self) -> u8 {
        self.rx.lock().unwrap().remove(0)
    }

    fn tx_free(&self) -> usize {
        // Stdout always has room; the console's spillover path never
        // engages on the host.
        usize::MAX
    }

    fn rx_used(&self) -> usize {
        self.rx.lock().unwrap().len()
    }
}

static UART: StdioUart = StdioUart {
    rx: Mutex::new(Vec::new()),
};

static COMMANDS: [cli::Command; 2] = [
    cli::Command {
        name: "uptime",
        run: cmd_uptime,
    },
    cli::Command {
        name: "led",
        run: cmd_led,
    },
];

fn cmd_uptime(_args: &str) {
    let (secs, millis) = kern::now_split();
    write!(cli::Out, "up {secs}.{millis:03}\r\n").ok();
}

fn cmd_led(args: &str) {
    match args.trim() {
        "on" => led::set(Leds::all()),
        "off" => led::clr(Leds::all()),
        _ => cli::print_str("usage: led on|off\r\n"),
    }
}

fn cli_init() {
    cli::init(&UART);
    cli::register_cmds(&COMMANDS);
    uart_open(Config {
        baud_rate: 115_200,
        data_bits: DataBits::Eight,
        stop_bits: StopBits::One,
        parity: Parity::None,
        callback: cli::uart_event,
    });
}

/// The board's UART "open": starts the stdin reader that plays the receive
/// interrupt.
fn uart_open(config: Config) {
    thread::spawn(move || {
        for byte in io::stdin().lock().bytes() {
            let Ok(mut byte) = byte else { break };
            // Terminals hand us newlines; the console speaks CR.
            if byte == b'\n' {
                byte = b'\r';
            }
            UART.rx.lock().unwrap().push(byte);
            (config.callback)(Event::Rxd);
            (config.callback)(Event::Idle);
        }
    });
}
