//! Implementation of the Brotocol single-wire bus protocol.
//!
//! Brotocol addresses one of many slave devices sharing a single open-drain
//! line and delivers a small fixed-width payload to it, using only edge
//! timing. A [`Master`] drives a full address + data exchange synchronously;
//! a [`Slave`] reconstructs the frame from bus edges and timer expiries,
//! acknowledging each field it accepts by holding the line low.
//!
//! The physical line is abstracted behind the [`Bus`], [`Delay`] and
//! [`WaitTimer`] traits in the [`bus`] module. The [`sim`] module (enabled by
//! default) provides an in-process line with a virtual clock, used by the
//! integration tests and the `brotocol` command line tool.

use core::time::Duration;

pub mod bus;
pub mod symbol;

mod error;
mod master;
mod slave;

#[cfg(feature = "sim")]
pub mod sim;

pub use bus::{Bus, Delay, Level, WaitTimer};
pub use error::{Field, InitError, InvalidValue, Nack, TransmitError};
pub use master::Master;
pub use slave::{Phase, Slave};

/// Width of the address field in bits.
pub const ADDRESS_BITS: u8 = 5;

/// Width of the data field in bits.
pub const DATA_BITS: u8 = 1;

/// Default duration of one protocol time unit.
///
/// All symbol timings are integer multiples of this.
pub const TIME_UNIT: Duration = Duration::from_millis(10);

/// Highest address representable in [`ADDRESS_BITS`] bits.
pub const MAX_ADDRESS: u8 = (1 << ADDRESS_BITS) - 1;

/// Highest payload representable in [`DATA_BITS`] bits.
pub const MAX_DATA: u8 = (1 << DATA_BITS) - 1;
