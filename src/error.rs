use crate::{ADDRESS_BITS, DATA_BITS};

/// The frame field a value or acknowledgment belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Field {
	Address,
	Data,
}

/// An error that can occur during a master transmission.
#[derive(Debug)]
pub enum TransmitError<E> {
	/// An input value does not fit its configured field width.
	///
	/// Reported before any bus activity takes place.
	InvalidValue(InvalidValue),

	/// The addressed slave did not acknowledge a field.
	Nack(Nack),

	/// The bus driver failed to perform a requested action.
	Driver(E),
}

/// An error that can occur while setting up a slave.
#[derive(Debug)]
pub enum InitError<E> {
	/// The configured own address does not fit the address width.
	InvalidValue(InvalidValue),

	/// The bus driver failed to release the line.
	Driver(E),
}

/// A value does not fit the configured width of its field.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidValue {
	pub field: Field,
	pub actual: u8,
	pub max: u8,
}

/// The addressed slave left the line high during an acknowledgment window.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Nack {
	pub field: Field,
}

impl Field {
	/// The width of this field in bits.
	pub fn bits(self) -> u8 {
		match self {
			Self::Address => ADDRESS_BITS,
			Self::Data => DATA_BITS,
		}
	}

	/// The highest value representable in this field.
	pub fn max(self) -> u8 {
		(1 << self.bits()) - 1
	}
}

impl InvalidValue {
	/// Check that a value fits the given field.
	pub fn check(field: Field, actual: u8) -> Result<(), Self> {
		if actual <= field.max() {
			Ok(())
		} else {
			Err(Self {
				field,
				actual,
				max: field.max(),
			})
		}
	}
}

impl<E> std::error::Error for TransmitError<E> where E: std::fmt::Debug + std::fmt::Display {}
impl<E> std::error::Error for InitError<E> where E: std::fmt::Debug + std::fmt::Display {}
impl std::error::Error for InvalidValue {}
impl std::error::Error for Nack {}

impl<E> From<InvalidValue> for TransmitError<E> {
	fn from(other: InvalidValue) -> Self {
		Self::InvalidValue(other)
	}
}

impl<E> From<Nack> for TransmitError<E> {
	fn from(other: Nack) -> Self {
		Self::Nack(other)
	}
}

impl<E> From<InvalidValue> for InitError<E> {
	fn from(other: InvalidValue) -> Self {
		Self::InvalidValue(other)
	}
}

impl std::fmt::Display for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Address => write!(f, "address"),
			Self::Data => write!(f, "data"),
		}
	}
}

impl<E> std::fmt::Display for TransmitError<E>
where
	E: std::fmt::Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidValue(e) => write!(f, "{}", e),
			Self::Nack(e) => write!(f, "{}", e),
			Self::Driver(e) => write!(f, "bus driver error: {}", e),
		}
	}
}

impl<E> std::fmt::Display for InitError<E>
where
	E: std::fmt::Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidValue(e) => write!(f, "{}", e),
			Self::Driver(e) => write!(f, "bus driver error: {}", e),
		}
	}
}

impl std::fmt::Display for InvalidValue {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} out of range: {:#04x} does not fit {} bit(s), maximum is {:#04x}",
			self.field,
			self.actual,
			self.field.bits(),
			self.max
		)
	}
}

impl std::fmt::Display for Nack {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "no acknowledgment for the {} field", self.field)
	}
}
