use core::time::Duration;

use crate::bus::{Bus, Delay, Level};
use crate::error::{Field, InvalidValue, Nack, TransmitError};
use crate::symbol::{self, Shape};
use crate::TIME_UNIT;

/// Master side of the protocol.
///
/// Owns the line for the duration of each [`Self::transmit`] call and drives
/// a full address + data exchange synchronously, blocking on the bus
/// driver's delay primitive. Exactly one master may be active on a line.
pub struct Master<B> {
	bus: B,
	time_unit: Duration,
	wave: String,
}

impl<B> core::fmt::Debug for Master<B>
where
	B: core::fmt::Debug,
{
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Master")
			.field("bus", &self.bus)
			.field("time_unit", &self.time_unit)
			.finish_non_exhaustive()
	}
}

impl<B> Master<B>
where
	B: Bus + Delay,
{
	/// Create a master with the default time unit of [`TIME_UNIT`].
	pub fn new(bus: B) -> Self {
		Self::with_time_unit(bus, TIME_UNIT)
	}

	/// Create a master with a custom time unit.
	///
	/// Every device on the line must be configured with the same time unit.
	pub fn with_time_unit(bus: B, time_unit: Duration) -> Self {
		Self {
			bus,
			time_unit,
			wave: String::new(),
		}
	}

	/// Get a reference to the underlying bus driver.
	pub fn bus(&self) -> &B {
		&self.bus
	}

	/// Consume the master to get ownership of the bus driver.
	pub fn into_bus(self) -> B {
		self.bus
	}

	/// The configured time unit.
	pub fn time_unit(&self) -> Duration {
		self.time_unit
	}

	/// Transmit one frame: an address followed by a data payload, each
	/// acknowledged by the addressed slave.
	///
	/// Values are checked against their field widths before any bus
	/// activity. A missing acknowledgment aborts the exchange at that point
	/// and is reported as [`TransmitError::Nack`]; the master never retries
	/// on its own.
	pub fn transmit(&mut self, address: u8, data: u8) -> Result<(), TransmitError<B::Error>> {
		InvalidValue::check(Field::Address, address)?;
		InvalidValue::check(Field::Data, data)?;

		log::debug!("transmitting address {:#04x}, data {:#04x}", address, data);
		self.wave.clear();
		let result = self.transmit_frame(address, data);
		if !self.wave.is_empty() {
			log::debug!("line activity: {}", self.wave);
		}
		result
	}

	fn transmit_frame(&mut self, address: u8, data: u8) -> Result<(), TransmitError<B::Error>> {
		self.send_shape(symbol::START)?;
		self.send_field(Field::Address, address)?;
		self.send_field(Field::Data, data)?;
		log::debug!("frame acknowledged");
		Ok(())
	}

	/// Send all bits of a field, least significant first, then query the
	/// acknowledgment for it.
	fn send_field(&mut self, field: Field, value: u8) -> Result<(), TransmitError<B::Error>> {
		for bit in 0..field.bits() {
			self.send_shape(Shape::bit((value >> bit) & 1 == 1))?;
		}
		self.ack_query(field)
	}

	fn send_shape(&mut self, shape: Shape) -> Result<(), TransmitError<B::Error>> {
		self.bus.drive_low().map_err(TransmitError::Driver)?;
		self.wait(shape.low)?;
		self.bus.release().map_err(TransmitError::Driver)?;
		self.wait(shape.high)?;
		Ok(())
	}

	/// Emit the ack query shape and sample the line at the midpoint of the
	/// slot. An acknowledging slave holds the line low across the midpoint;
	/// a high sample means rejection and aborts the transmission.
	fn ack_query(&mut self, field: Field) -> Result<(), TransmitError<B::Error>> {
		self.bus.drive_low().map_err(TransmitError::Driver)?;
		self.wait(symbol::ACK_QUERY_LOW)?;
		self.bus.release().map_err(TransmitError::Driver)?;
		self.wait(symbol::ACK_SAMPLE_DELAY)?;
		if self.bus.level().map_err(TransmitError::Driver)? == Level::High {
			log::debug!("no acknowledgment for the {} field", field);
			return Err(Nack { field }.into());
		}
		self.wait(symbol::BIT_PERIOD - symbol::ACK_QUERY_LOW - symbol::ACK_SAMPLE_DELAY)?;
		Ok(())
	}

	/// Block for the given number of time units, one unit at a time.
	///
	/// With debug logging enabled the line is sampled after every unit and
	/// rendered into the waveform trace, including levels produced by an
	/// acknowledging slave.
	fn wait(&mut self, units: u32) -> Result<(), TransmitError<B::Error>> {
		for _ in 0..units {
			self.bus.delay(self.time_unit);
			if log::log_enabled!(log::Level::Debug) {
				self.wave.push(match self.bus.level().map_err(TransmitError::Driver)? {
					Level::Low => '_',
					Level::High => '-',
				});
			}
		}
		Ok(())
	}
}
