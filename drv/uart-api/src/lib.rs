// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UART driver interface.
//!
//! BSPs own the actual peripheral -- registers, clocks, pin muxing, the
//! open/close lifecycle -- and expose it to components through this crate: a
//! [`Config`] handed to the BSP's open routine, an [`Event`] callback fired
//! from the BSP's interrupt handler, and the non-blocking byte interface
//! [`Uart`].
//!
//! The callback runs in interrupt context. Clients react by moving bytes
//! between the hardware queues and their own state, typically finishing by
//! posting an event or sending a message to their task; anything longer
//! belongs in the task handler.

#![no_std]

/// Conditions a driver reports to its client callback, from interrupt
/// context.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// Received bytes are waiting; drain with [`Uart::getc`].
    Rxd,
    /// Transmit queue space opened up; refill with [`Uart::putc`].
    Txd,
    /// The receive queue overflowed and bytes were lost.
    Overflow,
    /// A byte arrived with a parity error and was dropped.
    ParityError,
    /// The line went idle after receive activity.
    Idle,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataBits {
    Seven,
    Eight,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Static port configuration a client hands to the BSP's open routine.
#[derive(Clone, Debug)]
pub struct Config {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Invoked from the driver's interrupt handler as conditions arise.
    pub callback: fn(Event),
}

/// Non-blocking byte interface implemented by BSP UART drivers.
///
/// Implementations are shared with interrupt context, so every method takes
/// `&self`; drivers serialize internally (the hardware queues typically make
/// the methods single-register accesses anyway).
pub trait Uart: Sync {
    /// Queues one byte for transmit. Call only when [`tx_free`](Self::tx_free)
    /// reports room; what happens to excess bytes is the driver's business,
    /// and no flow control happens here.
    fn putc(&self, byte: u8);

    /// Takes the oldest received byte. Call only when
    /// [`rx_used`](Self::rx_used) reports data.
    fn getc(&self) -> u8;

    /// Transmit queue slots currently free.
    fn tx_free(&self) -> usize;

    /// Received bytes currently waiting.
    fn rx_used(&self) -> usize;
}
