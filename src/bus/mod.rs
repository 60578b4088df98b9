//! Traits to drive the shared open-drain line from different platforms.

use core::time::Duration;

#[cfg(feature = "embedded-hal")]
pub mod embedded_hal;

/// The electrical level of the bus line.
///
/// Low is actively driven by pulling the line to ground.
/// High is the released state, produced by an external pull-up when no party drives.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Level {
	Low,
	High,
}

/// Access to the shared open-drain line.
///
/// Implementations control a single pin: driving it low, releasing it to
/// high impedance, and sampling its current level. Both [`crate::Master`]
/// and [`crate::Slave`] are generic over this trait.
pub trait Bus {
	/// The error type returned when the line cannot be driven or sampled.
	///
	/// These are hardware failures, reported distinctly from protocol nacks.
	type Error;

	/// Actively pull the line to ground.
	fn drive_low(&mut self) -> Result<(), Self::Error>;

	/// Release the line to high impedance, letting the pull-up (or another
	/// driver) determine the level.
	fn release(&mut self) -> Result<(), Self::Error>;

	/// Sample the current level of the line.
	fn level(&mut self) -> Result<Level, Self::Error>;
}

/// Blocking delay, used by the master only.
pub trait Delay {
	/// Block for at least the given duration.
	fn delay(&mut self, duration: Duration);
}

/// One-shot asynchronous timer, used by the slave only.
///
/// The platform must call [`crate::Slave::on_wait_timer_expired`] exactly
/// once per arm, after the given duration has elapsed. Arming while a
/// previous arm is still pending replaces its deadline; only one expiry is
/// ever outstanding.
///
/// The platform must also deliver [`crate::Slave::on_bus_level_changed`] on
/// every edge of the line, with two exceptions matching open-drain pin
/// hardware that cannot watch edges while driving: no level events are
/// delivered while the slave itself holds the line low, and the edge caused
/// by the slave's own release is not delivered either.
pub trait WaitTimer {
	/// Arm the timer to expire once, after the given duration.
	fn arm(&mut self, duration: Duration);
}
