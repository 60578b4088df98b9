use core::time::Duration;

use crate::bus::{Bus, Level, WaitTimer};
use crate::error::{Field, InitError, InvalidValue};
use crate::symbol;
use crate::TIME_UNIT;

/// Decoding phase of a [`Slave`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
	/// Waiting for a Start symbol.
	Idle,
	/// Accumulating address bits.
	Address,
	/// Accumulating data bits.
	Data,
	/// Frame complete, holding the final acknowledgment.
	Done,
}

/// Slave side of the protocol.
///
/// A slave never blocks and never initiates traffic. The platform invokes
/// [`Self::on_bus_level_changed`] on every edge of the line and
/// [`Self::on_wait_timer_expired`] once per armed timer; both handlers
/// mutate the receiver state and return immediately. When a frame addressed
/// to this device completes, the decoded payload is passed to the handler
/// supplied at construction, after the receiver has already reset to
/// [`Phase::Idle`].
///
/// Any protocol violation silently discards the partial frame and returns
/// the receiver to [`Phase::Idle`]; a shared line is expected to carry
/// noise, and partial frames are not actionable.
pub struct Slave<B, T, F> {
	bus: B,
	timer: T,
	on_frame: F,
	own_address: u8,
	time_unit: Duration,
	phase: Phase,
	address: u8,
	data: u8,
	current_bit: u8,
	waiting: bool,
	acking: bool,
	sampled_at_wait_end: Level,
}

impl<B, T, F> core::fmt::Debug for Slave<B, T, F> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Slave")
			.field("own_address", &self.own_address)
			.field("phase", &self.phase)
			.finish_non_exhaustive()
	}
}

impl<B, T, F> Slave<B, T, F>
where
	B: Bus,
	T: WaitTimer,
	F: FnMut(u8),
{
	/// Create a slave answering to the given address, with the default time
	/// unit of [`TIME_UNIT`].
	///
	/// The payload handler is required; pass `|_| {}` to discard payloads.
	/// The line is released as part of construction.
	pub fn new(bus: B, timer: T, own_address: u8, on_frame: F) -> Result<Self, InitError<B::Error>> {
		Self::with_time_unit(bus, timer, own_address, on_frame, TIME_UNIT)
	}

	/// Create a slave with a custom time unit.
	///
	/// Every device on the line must be configured with the same time unit.
	pub fn with_time_unit(
		bus: B,
		timer: T,
		own_address: u8,
		on_frame: F,
		time_unit: Duration,
	) -> Result<Self, InitError<B::Error>> {
		InvalidValue::check(Field::Address, own_address)?;
		let mut slave = Self {
			bus,
			timer,
			on_frame,
			own_address,
			time_unit,
			phase: Phase::Idle,
			address: 0,
			data: 0,
			current_bit: 0,
			waiting: false,
			acking: false,
			sampled_at_wait_end: Level::High,
		};
		slave.reset().map_err(InitError::Driver)?;
		Ok(slave)
	}

	/// The address this slave answers to.
	pub fn own_address(&self) -> u8 {
		self.own_address
	}

	/// The current decoding phase.
	pub fn phase(&self) -> Phase {
		self.phase
	}

	/// The configured time unit.
	pub fn time_unit(&self) -> Duration {
		self.time_unit
	}

	/// Discard any partial frame, return to [`Phase::Idle`] and release the
	/// line.
	///
	/// An armed timer is not cancelled; its eventual expiry only performs
	/// bookkeeping.
	pub fn reset(&mut self) -> Result<(), B::Error> {
		self.phase = Phase::Idle;
		self.address = 0;
		self.data = 0;
		self.current_bit = 0;
		self.waiting = false;
		self.acking = false;
		self.sampled_at_wait_end = Level::High;
		self.bus.release()
	}

	/// Handle an edge on the line.
	///
	/// `level` is the level the line transitioned to. Errors are hardware
	/// failures from the bus driver; protocol violations are handled
	/// internally by resetting.
	pub fn on_bus_level_changed(&mut self, level: Level) -> Result<(), B::Error> {
		match self.phase {
			Phase::Idle => self.process_idle(level),
			Phase::Address => self.process_field(level, Field::Address),
			Phase::Data => self.process_field(level, Field::Data),
			// Nothing but the final timer expiry is expected in Done.
			Phase::Done => self.reset(),
		}
	}

	/// Handle the expiry of the wait timer armed by an earlier event.
	///
	/// Records the line level at the deadline, ends an acknowledgment hold
	/// if one is in progress, and delivers the payload once a completed
	/// frame's final hold has elapsed.
	pub fn on_wait_timer_expired(&mut self) -> Result<(), B::Error> {
		self.sampled_at_wait_end = self.bus.level()?;
		self.waiting = false;
		if self.acking {
			self.bus.release()?;
			self.acking = false;
		}
		if self.phase == Phase::Done {
			let data = self.data;
			self.reset()?;
			log::debug!("frame received, data {:#04x}", data);
			// State is back to Idle before the handler runs, so a handler
			// that triggers new bus activity cannot corrupt the decode.
			(self.on_frame)(data);
		}
		Ok(())
	}

	fn process_idle(&mut self, level: Level) -> Result<(), B::Error> {
		match level {
			Level::Low if !self.waiting => {
				// Falling edge of a candidate Start symbol.
				self.wait(symbol::START_WAIT);
				Ok(())
			},
			// Spurious re-trigger while already timing a candidate.
			Level::Low => self.reset(),
			Level::High if !self.waiting => {
				if self.sampled_at_wait_end == Level::Low {
					// The low phase outlasted the wait: Start confirmed.
					log::trace!("start symbol detected");
					self.phase = Phase::Address;
					Ok(())
				} else {
					self.reset()
				}
			},
			// Rising edge before the wait elapsed: too short for a Start.
			Level::High => self.reset(),
		}
	}

	fn process_field(&mut self, level: Level, field: Field) -> Result<(), B::Error> {
		match level {
			// A falling edge while the checkpoint is still pending.
			Level::Low if self.waiting => self.reset(),
			Level::Low => {
				if self.current_bit < field.bits() {
					// Start of a bit symbol; decide its value at the midpoint.
					self.wait(symbol::BIT_CHECKPOINT);
					Ok(())
				} else {
					self.field_complete(field)
				}
			},
			Level::High => self.finish_bit(field),
		}
	}

	/// All bits of a field have been received and the master has opened the
	/// acknowledgment slot.
	fn field_complete(&mut self, field: Field) -> Result<(), B::Error> {
		match field {
			Field::Address => {
				if self.address == self.own_address {
					log::debug!("address {:#04x} matched, acknowledging", self.address);
					self.ack()?;
					self.current_bit = 0;
					self.phase = Phase::Data;
					Ok(())
				} else {
					// Not for this device.
					log::trace!("ignoring frame addressed to {:#04x}", self.address);
					self.reset()
				}
			},
			Field::Data => {
				self.ack()?;
				self.phase = Phase::Done;
				Ok(())
			},
		}
	}

	/// Hold the line low across the master's midpoint sample of the ack
	/// slot. The timer expiry releases the hold.
	fn ack(&mut self) -> Result<(), B::Error> {
		self.acking = true;
		self.bus.drive_low()?;
		self.wait(symbol::ACK_HOLD);
		Ok(())
	}

	/// A rising edge ends the low phase of a bit symbol; its position
	/// relative to the checkpoint determines the bit value.
	fn finish_bit(&mut self, field: Field) -> Result<(), B::Error> {
		if self.waiting {
			// The edge preempted the checkpoint: short low shape, bit
			// value 0. The accumulator already holds a zero there. The
			// checkpoint timer is left to fire; its expiry only records
			// the line level.
			self.current_bit += 1;
			Ok(())
		} else if self.sampled_at_wait_end == Level::Low {
			// Still low at the checkpoint: long low shape, bit value 1.
			match field {
				Field::Address => self.address |= 1 << self.current_bit,
				Field::Data => self.data |= 1 << self.current_bit,
			}
			self.current_bit += 1;
			Ok(())
		} else {
			// The checkpoint saw the line high, yet no rising edge was
			// delivered in between.
			self.reset()
		}
	}

	fn wait(&mut self, units: u32) {
		self.waiting = true;
		self.timer.arm(self.time_unit * units);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::{assert, let_assert};
	use std::cell::RefCell;
	use std::rc::Rc;

	struct LineState {
		level: Level,
		drive_lows: usize,
		releases: usize,
	}

	/// A line whose level is scripted by the test. Driving low pulls the
	/// level low; releasing leaves the level to the test script.
	#[derive(Clone)]
	struct FakeLine(Rc<RefCell<LineState>>);

	impl FakeLine {
		fn new() -> Self {
			Self(Rc::new(RefCell::new(LineState {
				level: Level::High,
				drive_lows: 0,
				releases: 0,
			})))
		}

		fn set_level(&self, level: Level) {
			self.0.borrow_mut().level = level;
		}

		fn drive_lows(&self) -> usize {
			self.0.borrow().drive_lows
		}
	}

	impl Bus for FakeLine {
		type Error = core::convert::Infallible;

		fn drive_low(&mut self) -> Result<(), Self::Error> {
			let mut state = self.0.borrow_mut();
			state.drive_lows += 1;
			state.level = Level::Low;
			Ok(())
		}

		fn release(&mut self) -> Result<(), Self::Error> {
			self.0.borrow_mut().releases += 1;
			Ok(())
		}

		fn level(&mut self) -> Result<Level, Self::Error> {
			Ok(self.0.borrow().level)
		}
	}

	#[derive(Clone)]
	struct FakeTimer(Rc<RefCell<Vec<Duration>>>);

	impl FakeTimer {
		fn new() -> Self {
			Self(Rc::new(RefCell::new(Vec::new())))
		}

		fn armed(&self) -> Vec<Duration> {
			self.0.borrow().clone()
		}
	}

	impl WaitTimer for FakeTimer {
		fn arm(&mut self, duration: Duration) {
			self.0.borrow_mut().push(duration);
		}
	}

	type TestSlave = Slave<FakeLine, FakeTimer, Box<dyn FnMut(u8)>>;

	fn setup(own_address: u8) -> (TestSlave, FakeLine, FakeTimer, Rc<RefCell<Vec<u8>>>) {
		let line = FakeLine::new();
		let timer = FakeTimer::new();
		let received = Rc::new(RefCell::new(Vec::new()));
		let sink = received.clone();
		let slave = Slave::new(
			line.clone(),
			timer.clone(),
			own_address,
			Box::new(move |data| sink.borrow_mut().push(data)) as Box<dyn FnMut(u8)>,
		)
		.unwrap();
		(slave, line, timer, received)
	}

	/// Expire the pending timer with the line at the given level.
	fn expire(slave: &mut TestSlave, line: &FakeLine, level: Level) {
		line.set_level(level);
		slave.on_wait_timer_expired().unwrap();
	}

	/// Replay the edges and expiries a well-formed Start symbol produces.
	fn feed_start(slave: &mut TestSlave, line: &FakeLine) {
		slave.on_bus_level_changed(Level::Low).unwrap();
		expire(slave, line, Level::Low);
		slave.on_bus_level_changed(Level::High).unwrap();
	}

	/// Replay one bit symbol as seen from the slave.
	fn feed_bit(slave: &mut TestSlave, line: &FakeLine, bit: bool) {
		slave.on_bus_level_changed(Level::Low).unwrap();
		if bit {
			// Checkpoint fires while the line is still low, then the edge.
			expire(slave, line, Level::Low);
			slave.on_bus_level_changed(Level::High).unwrap();
		} else {
			// The edge preempts the checkpoint; the timer fires afterwards.
			slave.on_bus_level_changed(Level::High).unwrap();
			expire(slave, line, Level::High);
		}
	}

	/// Replay an acknowledgment slot for a matching slave: the falling edge
	/// opens the slot and the hold elapses with the line still low.
	fn feed_ack_window(slave: &mut TestSlave, line: &FakeLine) {
		slave.on_bus_level_changed(Level::Low).unwrap();
		expire(slave, line, Level::Low);
	}

	fn assert_fresh(slave: &TestSlave) {
		assert!(slave.phase == Phase::Idle);
		assert!(slave.address == 0);
		assert!(slave.data == 0);
		assert!(slave.current_bit == 0);
		assert!(!slave.waiting);
		assert!(!slave.acking);
		assert!(slave.sampled_at_wait_end == Level::High);
	}

	#[test]
	fn rejects_own_address_out_of_range() {
		let line = FakeLine::new();
		let timer = FakeTimer::new();
		let_assert!(
			Err(InitError::InvalidValue(e)) =
				Slave::new(line, timer, 0x20, Box::new(|_| {}) as Box<dyn FnMut(u8)>)
		);
		assert!(e.field == Field::Address);
	}

	#[test]
	fn detects_a_start_symbol() {
		let (mut slave, line, timer, _) = setup(0x0b);

		feed_start(&mut slave, &line);

		assert!(slave.phase() == Phase::Address);
		assert!(timer.armed() == vec![TIME_UNIT * symbol::START_WAIT]);
	}

	#[test]
	fn too_short_start_resets() {
		let (mut slave, line, _, _) = setup(0x0b);

		slave.on_bus_level_changed(Level::Low).unwrap();
		// Rising edge before the wait elapsed.
		slave.on_bus_level_changed(Level::High).unwrap();

		assert_fresh(&slave);
		// The superseded timer still fires later; only bookkeeping happens.
		expire(&mut slave, &line, Level::High);
		assert!(slave.phase() == Phase::Idle);
	}

	#[test]
	fn spurious_retrigger_while_timing_a_start_resets() {
		let (mut slave, _, _, _) = setup(0x0b);

		slave.on_bus_level_changed(Level::Low).unwrap();
		slave.on_bus_level_changed(Level::Low).unwrap();

		assert_fresh(&slave);
	}

	#[test]
	fn rising_edge_without_a_candidate_start_resets() {
		let (mut slave, _, _, _) = setup(0x0b);

		slave.on_bus_level_changed(Level::High).unwrap();

		assert_fresh(&slave);
	}

	#[test]
	fn receives_a_frame_and_delivers_the_payload() {
		let (mut slave, line, timer, received) = setup(0x0b);

		feed_start(&mut slave, &line);
		// 0x0b least significant bit first.
		for bit in [true, true, false, true, false] {
			feed_bit(&mut slave, &line, bit);
		}
		feed_ack_window(&mut slave, &line);
		assert!(slave.phase() == Phase::Data);
		assert!(received.borrow().is_empty());

		feed_bit(&mut slave, &line, true);
		feed_ack_window(&mut slave, &line);

		assert!(*received.borrow() == vec![1]);
		assert_fresh(&slave);
		// Two acknowledgments were driven.
		assert!(line.drive_lows() == 2);
		// The ack holds were armed for the full hold duration.
		assert!(timer.armed().contains(&(TIME_UNIT * symbol::ACK_HOLD)));
	}

	#[test]
	fn delivers_a_zero_payload() {
		let (mut slave, line, _, received) = setup(0x03);

		feed_start(&mut slave, &line);
		for bit in [true, true, false, false, false] {
			feed_bit(&mut slave, &line, bit);
		}
		feed_ack_window(&mut slave, &line);
		feed_bit(&mut slave, &line, false);
		feed_ack_window(&mut slave, &line);

		assert!(*received.borrow() == vec![0]);
		assert_fresh(&slave);
	}

	#[test]
	fn ignores_a_frame_for_another_address() {
		let (mut slave, line, _, received) = setup(0x05);

		feed_start(&mut slave, &line);
		for bit in [true, true, false, true, false] {
			feed_bit(&mut slave, &line, bit);
		}
		// Falling edge of the ack slot: the address does not match.
		slave.on_bus_level_changed(Level::Low).unwrap();

		assert!(received.borrow().is_empty());
		// The slave never acknowledged.
		assert!(line.drive_lows() == 0);
		assert_fresh(&slave);
	}

	#[test]
	fn falling_edge_while_checkpoint_pending_resets() {
		let (mut slave, line, _, received) = setup(0x0b);

		feed_start(&mut slave, &line);
		feed_bit(&mut slave, &line, true);
		slave.on_bus_level_changed(Level::Low).unwrap();
		slave.on_bus_level_changed(Level::Low).unwrap();

		assert!(received.borrow().is_empty());
		assert_fresh(&slave);
	}

	#[test]
	fn checkpoint_high_without_an_edge_resets() {
		let (mut slave, line, _, _) = setup(0x0b);

		feed_start(&mut slave, &line);
		slave.on_bus_level_changed(Level::Low).unwrap();
		// The checkpoint samples high, then a rising edge arrives anyway.
		expire(&mut slave, &line, Level::High);
		slave.on_bus_level_changed(Level::High).unwrap();

		assert_fresh(&slave);
	}

	#[test]
	fn unexpected_event_in_done_resets() {
		let (mut slave, line, _, received) = setup(0x0b);

		feed_start(&mut slave, &line);
		for bit in [true, true, false, true, false] {
			feed_bit(&mut slave, &line, bit);
		}
		feed_ack_window(&mut slave, &line);
		feed_bit(&mut slave, &line, true);
		// Falling edge of the data ack slot moves to Done.
		slave.on_bus_level_changed(Level::Low).unwrap();
		assert!(slave.phase() == Phase::Done);

		// An edge before the hold elapsed is a violation.
		slave.on_bus_level_changed(Level::High).unwrap();

		assert!(received.borrow().is_empty());
		assert_fresh(&slave);
	}

	#[test]
	fn a_reset_slave_accepts_the_next_frame() {
		let (mut slave, line, _, received) = setup(0x01);

		// A noise pulse, then a clean frame.
		slave.on_bus_level_changed(Level::Low).unwrap();
		slave.on_bus_level_changed(Level::High).unwrap();
		expire(&mut slave, &line, Level::High);

		feed_start(&mut slave, &line);
		for bit in [true, false, false, false, false] {
			feed_bit(&mut slave, &line, bit);
		}
		feed_ack_window(&mut slave, &line);
		feed_bit(&mut slave, &line, true);
		feed_ack_window(&mut slave, &line);

		assert!(*received.borrow() == vec![1]);
	}
}
