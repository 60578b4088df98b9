//! The symbol timing grammar of the protocol.
//!
//! Every protocol element is a timed low/high waveform on the line,
//! expressed in integer multiples of the configured time unit. All bit
//! symbols occupy [`BIT_PERIOD`] units; the value is encoded in the duty
//! cycle. The Start symbol is distinguishable by its low phase outlasting
//! any bit symbol.

/// A waveform shape: a driven-low phase followed by a released-high phase.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Shape {
	/// Driven-low duration in time units.
	pub low: u32,
	/// Released duration in time units.
	pub high: u32,
}

impl Shape {
	/// The shape encoding the given bit value.
	pub fn bit(value: bool) -> Self {
		if value {
			BIT_ONE
		} else {
			BIT_ZERO
		}
	}

	/// Total duration of the shape in time units.
	pub fn period(self) -> u32 {
		self.low + self.high
	}
}

/// The Start symbol opening every frame.
pub const START: Shape = Shape { low: 18, high: 2 };

/// A bit of value 1: long low, short high.
pub const BIT_ONE: Shape = Shape { low: 8, high: 2 };

/// A bit of value 0: short low, long high.
pub const BIT_ZERO: Shape = Shape { low: 2, high: 8 };

/// Duration of every bit symbol, and of the ack query slot.
pub const BIT_PERIOD: u32 = 10;

/// The master's side of an acknowledgment slot: a short driven pulse, then
/// the line is released so the addressed slave can hold it low.
pub const ACK_QUERY_LOW: u32 = 2;

/// Units between the master's release and its sample of the ack window,
/// placing the sample at the midpoint of the slot.
pub const ACK_SAMPLE_DELAY: u32 = BIT_CHECKPOINT - ACK_QUERY_LOW;

/// How long an acknowledging slave holds the line low, measured from the
/// start of the ack slot. Equal to the long-low bit shape, so the master's
/// midpoint sample is guaranteed to read low.
pub const ACK_HOLD: u32 = BIT_ONE.low;

/// The slave's bit-value checkpoint: a receiver that still reads low this
/// far into a bit symbol infers the long-low shape.
pub const BIT_CHECKPOINT: u32 = BIT_PERIOD / 2;

/// How long the slave waits on a falling edge while idle before treating
/// the low phase as a candidate Start symbol. Longer than any bit low,
/// shorter than the Start low.
pub const START_WAIT: u32 = 15;
