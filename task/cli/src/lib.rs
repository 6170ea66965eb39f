// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serial console.
//!
//! The console splits across the two execution contexts the kernel gives a
//! driver-facing component:
//!
//! - **Interrupt side** ([`uart_event`], registered as the UART driver's
//!   callback): batches received bytes into small key-chunk messages and
//!   sends them to the console task. A chunk goes out when it fills or when
//!   the line goes idle, so a human typing produces one-byte chunks while a
//!   paste or escape sequence arrives as a batch. The transmit path drains
//!   the spillover FIFO when the driver reports queue space.
//!
//! - **Task side** ([`handler`]): receives one chunk per dispatch. Single
//!   printable bytes accumulate into a line buffer and echo back; DEL rubs
//!   out; CR terminates the line. Multi-byte chunks are noise (escape
//!   sequences, line pastes) and are dropped. A terminated line is matched
//!   against the registered command table by its first word; unmatched lines
//!   echo back as `CMD:<text>`.
//!
//! Output from commands goes through [`print_str`]/[`Out`], which write
//! straight to the UART while it has room and spill into an allocator-backed
//! FIFO (torn down when it drains) while it doesn't.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use core::fmt;
use core::mem;

use arrayvec::ArrayVec;
use critical_section::Mutex;
use drv_uart_api::{Event as UartEvent, Uart};
use fifo::Fifo;
use kern::{EventId, TaskId};
use ringbuf::{ringbuf, ringbuf_entry};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Longest run of received bytes batched into one message.
pub const MAX_KEY_LEN: usize = 7;
/// Line buffer capacity in bytes.
pub const MAX_CMD_LEN: usize = 32;
/// Transmit spillover capacity in bytes.
const TX_BUF_SIZE: usize = 64;

const ASCII_LF: u8 = 0x0A;
const ASCII_CR: u8 = 0x0D;
const ASCII_BACKSPACE: u8 = 0x7F;

fn is_printable(byte: u8) -> bool {
    (32..=127).contains(&byte)
}

fn is_control(byte: u8) -> bool {
    byte <= 31
}

/// Received bytes in flight from the UART interrupt to the console task,
/// laid directly over the message payload.
#[derive(Copy, Clone, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct KeyChunk {
    len: u8,
    val: [u8; MAX_KEY_LEN],
}

impl KeyChunk {
    const EMPTY: Self = Self {
        len: 0,
        val: [0; MAX_KEY_LEN],
    };
}

/// A console command. The first whitespace-separated word of a line selects
/// a command by name; the rest of the line is passed to `run`.
pub struct Command {
    pub name: &'static str,
    pub run: fn(args: &str),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    ChunkSent { len: u8 },
    ChunkDropped,
    Line { len: u8 },
    RxNoise { len: u8 },
}

ringbuf!(Trace, 16, Trace::None);

struct Console {
    task: TaskId,
    uart: &'static dyn Uart,
    /// Interrupt side: bytes accumulating toward the next message.
    chunk: KeyChunk,
    /// Task side: the line being edited.
    line: ArrayVec<u8, MAX_CMD_LEN>,
    /// Transmit spillover; exists only while there is a burst to absorb.
    tx: Option<Fifo>,
    cmds: &'static [Command],
}

static CONSOLE: Mutex<RefCell<Option<Console>>> =
    Mutex::new(RefCell::new(None));

fn with_console<R>(body: impl FnOnce(&mut Console) -> R) -> R {
    critical_section::with(|cs| {
        let mut slot = CONSOLE.borrow_ref_mut(cs);
        match slot.as_mut() {
            Some(console) => body(console),
            None => panic!("console not initialized"),
        }
    })
}

/// Init hook. The board opens the UART with `uart_event` as its callback and
/// hands the byte interface here.
pub fn init(uart: &'static dyn Uart) {
    let task = kern::self_task_id();
    critical_section::with(|cs| {
        *CONSOLE.borrow_ref_mut(cs) = Some(Console {
            task,
            uart,
            chunk: KeyChunk::EMPTY,
            line: ArrayVec::new(),
            tx: None,
            cmds: &[],
        });
    });
}

/// Installs the command table. Replaces any previous table.
pub fn register_cmds(cmds: &'static [Command]) {
    with_console(|c| c.cmds = cmds);
}

/// Event handler: the console is woken only by message delivery. One chunk
/// per dispatch; a spurious wakeup with an empty queue is tolerated.
pub fn handler(event: EventId) {
    assert_eq!(event, EventId::MSG);
    let Some(msg) = kern::msg_recv(kern::self_task_id()) else {
        return;
    };
    let Ok(chunk) = KeyChunk::read_from_bytes(msg.bytes()) else {
        return;
    };
    drop(msg);

    if let Some(line) = with_console(|c| rx_key(c, &chunk)) {
        process_line(&line);
    }
}

/// UART driver callback. Interrupt context.
pub fn uart_event(event: UartEvent) {
    match event {
        UartEvent::Rxd => with_console(|c| {
            let uart = c.uart;
            for _ in 0..uart.rx_used() {
                let byte = uart.getc();
                let at = usize::from(c.chunk.len);
                c.chunk.val[at] = byte;
                c.chunk.len += 1;
                if usize::from(c.chunk.len) == MAX_KEY_LEN {
                    flush_chunk(c);
                }
            }
        }),
        UartEvent::Idle => with_console(|c| {
            if c.chunk.len > 0 {
                flush_chunk(c);
            }
        }),
        UartEvent::Txd => with_console(|c| {
            let uart = c.uart;
            loop {
                let Some(fifo) = c.tx.as_mut() else { break };
                if uart.tx_free() == 0 {
                    break;
                }
                match fifo.get() {
                    Some(byte) => uart.putc(byte),
                    None => {
                        // Burst absorbed; give the storage back.
                        c.tx = None;
                        break;
                    }
                }
            }
        }),
        UartEvent::Overflow | UartEvent::ParityError => {}
    }
}

/// Hands the accumulated chunk to the console task. If the allocator is
/// exhausted the keystrokes are dropped; there is nowhere to put them.
fn flush_chunk(c: &mut Console) {
    match kern::msg_alloc(mem::size_of::<KeyChunk>() as u16) {
        Some(mut msg) => {
            msg.bytes_mut().copy_from_slice(c.chunk.as_bytes());
            kern::msg_send(msg, c.task);
            ringbuf_entry!(Trace::ChunkSent { len: c.chunk.len });
        }
        None => ringbuf_entry!(Trace::ChunkDropped),
    }
    c.chunk.len = 0;
}

/// Line editing. Returns the finished line when CR lands on a non-empty
/// buffer.
fn rx_key(
    c: &mut Console,
    chunk: &KeyChunk,
) -> Option<ArrayVec<u8, MAX_CMD_LEN>> {
    if usize::from(chunk.len) != 1 {
        // Escape sequences and paste bursts; not line input.
        ringbuf_entry!(Trace::RxNoise { len: chunk.len });
        return None;
    }
    let byte = chunk.val[0];

    if is_printable(byte) {
        if byte != ASCII_BACKSPACE {
            if c.line.len() < c.line.capacity() {
                c.line.push(byte);
                putc(c, byte);
            }
        } else if !c.line.is_empty() {
            putc(c, byte);
            c.line.pop();
        }
    } else if is_control(byte) {
        putc(c, byte);
        if byte == ASCII_CR {
            putc(c, ASCII_LF);
            if !c.line.is_empty() {
                return Some(mem::take(&mut c.line));
            }
        }
    }
    None
}

/// Runs a finished line: first word picks a registered command; anything
/// else echoes back tagged, so an unconfigured console still shows signs of
/// life.
fn process_line(line: &[u8]) {
    ringbuf_entry!(Trace::Line {
        len: line.len() as u8
    });
    let Ok(text) = core::str::from_utf8(line) else {
        return;
    };
    let mut parts = text.trim_start().splitn(2, ' ');
    let name = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim_start();

    let cmds = with_console(|c| c.cmds);
    if let Some(cmd) = cmds.iter().find(|cmd| cmd.name == name) {
        (cmd.run)(args);
        return;
    }

    print_str("CMD:");
    print_str(text);
    print_str("\r\n");
}

/// One byte out: straight to the UART while it has room, else into the
/// spillover FIFO. A full FIFO blocks on the wire for one byte, which is the
/// console's documented overload policy.
fn putc(c: &mut Console, byte: u8) {
    let uart = c.uart;
    match c.tx.as_mut() {
        None => {
            if uart.tx_free() > 0 {
                uart.putc(byte);
            } else {
                let mut fifo = Fifo::with_capacity(TX_BUF_SIZE);
                let _ = fifo.put(byte);
                c.tx = Some(fifo);
            }
        }
        Some(fifo) => {
            if fifo.is_full() {
                while uart.tx_free() == 0 {}
                if let Some(oldest) = fifo.get() {
                    uart.putc(oldest);
                }
            }
            let _ = fifo.put(byte);
        }
    }
}

/// Prints one byte through the console's transmit path.
pub fn print_char(byte: u8) {
    with_console(|c| putc(c, byte));
}

/// Prints a string through the console's transmit path.
pub fn print_str(s: &str) {
    with_console(|c| {
        for &byte in s.as_bytes() {
            putc(c, byte);
        }
    })
}

/// `core::fmt` adapter over the console output, for command handlers:
/// `write!(cli::Out, "...")`.
pub struct Out;

impl fmt::Write for Out {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print_str(s);
        Ok(())
    }
}
