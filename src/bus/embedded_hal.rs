//! [`Bus`] implementation over `embedded-hal` digital pins.

use core::time::Duration;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::bus::{Bus, Delay, Level};

/// An open-drain line driven through an `embedded-hal` pin.
///
/// The pin must be configured as an open-drain output with an external
/// pull-up, so that setting it high stops driving and releases the line.
/// Together with a blocking delay provider this is everything a
/// [`crate::Master`] needs.
///
/// No [`crate::bus::WaitTimer`] implementation is possible over the
/// blocking `embedded-hal` traits; slave platforms wire their own hardware
/// timer and edge interrupt to the [`crate::Slave`] entry points.
pub struct OpenDrainPin<P, D> {
	pin: P,
	delay: D,
}

impl<P, D> OpenDrainPin<P, D> {
	/// Wrap a pin and a delay provider.
	pub fn new(pin: P, delay: D) -> Self {
		Self { pin, delay }
	}

	/// Consume the wrapper to get the pin and delay provider back.
	pub fn into_inner(self) -> (P, D) {
		(self.pin, self.delay)
	}
}

impl<P, D, E> Bus for OpenDrainPin<P, D>
where
	P: InputPin<Error = E> + OutputPin<Error = E>,
{
	type Error = E;

	fn drive_low(&mut self) -> Result<(), Self::Error> {
		self.pin.set_low()
	}

	fn release(&mut self) -> Result<(), Self::Error> {
		self.pin.set_high()
	}

	fn level(&mut self) -> Result<Level, Self::Error> {
		Ok(if self.pin.is_low()? {
			Level::Low
		} else {
			Level::High
		})
	}
}

impl<P, D> Delay for OpenDrainPin<P, D>
where
	D: DelayUs<u32>,
{
	fn delay(&mut self, duration: Duration) {
		self.delay.delay_us(duration.as_micros() as u32);
	}
}
