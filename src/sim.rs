//! In-process simulation of the shared open-drain line.
//!
//! The simulated [`Line`] connects a blocking master to an event-driven
//! slave inside one thread, with a virtual clock: time advances only inside
//! the master port's delays, during which level events and timer expiries
//! are dispatched to the attached slave at their exact virtual instants.
//! Used by the integration tests and the `brotocol` command line tool.

use core::convert::Infallible;
use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{Bus, Delay, Level, WaitTimer};
use crate::Slave;

/// An event delivered to the attached slave.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
	/// The line transitioned to the given level.
	LevelChanged(Level),
	/// The armed wait timer expired.
	TimerExpired,
}

struct Inner {
	master_low: bool,
	slave_low: bool,
	level: Level,
	now: Duration,
	timer_deadline: Option<Duration>,
	listener: Option<Box<dyn FnMut(Event)>>,
}

impl Inner {
	fn line_level(&self) -> Level {
		if self.master_low || self.slave_low {
			Level::Low
		} else {
			Level::High
		}
	}
}

/// A simulated open-drain line.
///
/// The level is low whenever either side drives, high otherwise. Cloning
/// yields another handle to the same line.
#[derive(Clone)]
pub struct Line {
	inner: Rc<RefCell<Inner>>,
}

impl Line {
	/// Create a released line with the virtual clock at zero.
	pub fn new() -> Self {
		Self {
			inner: Rc::new(RefCell::new(Inner {
				master_low: false,
				slave_low: false,
				level: Level::High,
				now: Duration::ZERO,
				timer_deadline: None,
				listener: None,
			})),
		}
	}

	/// The master's handle to the line.
	pub fn master_port(&self) -> MasterPort {
		MasterPort { line: self.clone() }
	}

	/// The slave's handle to the line.
	pub fn slave_port(&self) -> SlavePort {
		SlavePort { line: self.clone() }
	}

	/// The slave's one-shot wait timer.
	pub fn slave_timer(&self) -> SlaveTimer {
		SlaveTimer { line: self.clone() }
	}

	/// Attach a slave built on this line's ports to the event dispatch,
	/// replacing any previous listener.
	pub fn attach_slave<F>(&self, slave: Rc<RefCell<Slave<SlavePort, SlaveTimer, F>>>)
	where
		F: FnMut(u8) + 'static,
	{
		self.subscribe(move |event| {
			let mut slave = slave.borrow_mut();
			let result = match event {
				Event::LevelChanged(level) => slave.on_bus_level_changed(level),
				Event::TimerExpired => slave.on_wait_timer_expired(),
			};
			match result {
				Ok(()) => (),
				Err(infallible) => match infallible {},
			}
		});
	}

	/// Register a raw event listener, replacing any previous one.
	pub fn subscribe<L>(&self, listener: L)
	where
		L: FnMut(Event) + 'static,
	{
		self.inner.borrow_mut().listener = Some(Box::new(listener));
	}

	/// Elapsed virtual time.
	pub fn elapsed(&self) -> Duration {
		self.inner.borrow().now
	}

	/// The current level of the line.
	pub fn level(&self) -> Level {
		self.inner.borrow().level
	}

	/// Call the listener with no borrow of the line state held, so that
	/// handlers may freely use the ports and timer.
	fn dispatch(&self, event: Event) {
		let listener = self.inner.borrow_mut().listener.take();
		if let Some(mut listener) = listener {
			listener(event);
			self.inner.borrow_mut().listener = Some(listener);
		}
	}

	fn set_master_drive(&self, low: bool) {
		let event = {
			let mut inner = self.inner.borrow_mut();
			inner.master_low = low;
			let level = inner.line_level();
			if level == inner.level {
				None
			} else {
				inner.level = level;
				Some(Event::LevelChanged(level))
			}
		};
		if let Some(event) = event {
			self.dispatch(event);
		}
	}

	/// Edges caused by the slave's own drive or release are not delivered
	/// back to it: the hardware pin leaves its edge-interrupt mode while
	/// driving and clears the pending edge on release.
	fn set_slave_drive(&self, low: bool) {
		let mut inner = self.inner.borrow_mut();
		inner.slave_low = low;
		inner.level = inner.line_level();
	}
}

impl Default for Line {
	fn default() -> Self {
		Self::new()
	}
}

/// The master side of a simulated [`Line`].
///
/// Its blocking delay advances the virtual clock and dispatches slave
/// events that fall due.
#[derive(Clone)]
pub struct MasterPort {
	line: Line,
}

impl Bus for MasterPort {
	type Error = Infallible;

	fn drive_low(&mut self) -> Result<(), Self::Error> {
		self.line.set_master_drive(true);
		Ok(())
	}

	fn release(&mut self) -> Result<(), Self::Error> {
		self.line.set_master_drive(false);
		Ok(())
	}

	fn level(&mut self) -> Result<Level, Self::Error> {
		Ok(self.line.inner.borrow().level)
	}
}

impl Delay for MasterPort {
	fn delay(&mut self, duration: Duration) {
		let mut remaining = duration;
		loop {
			let fire = {
				let mut inner = self.line.inner.borrow_mut();
				match inner.timer_deadline {
					Some(deadline) if deadline.saturating_sub(inner.now) <= remaining => {
						remaining -= deadline.saturating_sub(inner.now);
						inner.now = inner.now.max(deadline);
						inner.timer_deadline = None;
						true
					},
					_ => {
						inner.now += remaining;
						false
					},
				}
			};
			if !fire {
				break;
			}
			self.line.dispatch(Event::TimerExpired);
			if remaining.is_zero() {
				break;
			}
		}
	}
}

/// The slave side of a simulated [`Line`].
#[derive(Clone)]
pub struct SlavePort {
	line: Line,
}

impl Bus for SlavePort {
	type Error = Infallible;

	fn drive_low(&mut self) -> Result<(), Self::Error> {
		self.line.set_slave_drive(true);
		Ok(())
	}

	fn release(&mut self) -> Result<(), Self::Error> {
		self.line.set_slave_drive(false);
		Ok(())
	}

	fn level(&mut self) -> Result<Level, Self::Error> {
		Ok(self.line.inner.borrow().level)
	}
}

/// The slave's one-shot timer on a simulated [`Line`].
///
/// Arming replaces any pending deadline, like the single hardware timer it
/// stands in for.
#[derive(Clone)]
pub struct SlaveTimer {
	line: Line,
}

impl WaitTimer for SlaveTimer {
	fn arm(&mut self, duration: Duration) {
		let mut inner = self.line.inner.borrow_mut();
		inner.timer_deadline = Some(inner.now + duration);
	}
}
