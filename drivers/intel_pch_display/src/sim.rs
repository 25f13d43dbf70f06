//! Simulated register bank and deterministic timing for tests.

use crate::control::Mmio;
use core::time::Duration;
use embedded_hal::{blocking::delay::DelayUs, timer::CountDown};
use std::collections::BTreeMap;
use void::Void;

#[derive(Default)]
pub struct Regs {
	pub mmio: BTreeMap<u32, u32>,
	/// Registers behind the VLV sideband.
	pub dpio: BTreeMap<u32, u32>,
}

impl Regs {
	pub fn get(&self, reg: u32) -> u32 {
		self.mmio.get(&reg).copied().unwrap_or(0)
	}
}

type ReadHook = Box<dyn FnMut(&Regs, u32) -> u32>;
type WriteHook = Box<dyn FnMut(&mut Regs, u32)>;

#[derive(Default)]
pub struct SimMmio {
	pub regs: Regs,
	pub writes: Vec<(u32, u32)>,
	reads: BTreeMap<u32, usize>,
	read_hooks: BTreeMap<u32, ReadHook>,
	write_hooks: BTreeMap<u32, WriteHook>,
}

impl SimMmio {
	pub fn new() -> Self {
		let _ = env_logger::builder().is_test(true).try_init();
		Self::default()
	}

	pub fn set(&mut self, reg: u32, value: u32) -> &mut Self {
		self.regs.mmio.insert(reg, value);
		self
	}

	pub fn get(&self, reg: u32) -> u32 {
		self.regs.get(reg)
	}

	/// The hook receives the stored value and returns what the read observes.
	pub fn on_read(&mut self, reg: u32, f: impl FnMut(&Regs, u32) -> u32 + 'static) {
		self.read_hooks.insert(reg, Box::new(f));
	}

	/// The hook runs after the value has been stored.
	pub fn on_write(&mut self, reg: u32, f: impl FnMut(&mut Regs, u32) + 'static) {
		self.write_hooks.insert(reg, Box::new(f));
	}

	pub fn reads(&self, reg: u32) -> usize {
		self.reads.get(&reg).copied().unwrap_or(0)
	}

	pub fn writes_to(&self, reg: u32) -> Vec<u32> {
		self.writes
			.iter()
			.filter(|(r, _)| *r == reg)
			.map(|(_, v)| *v)
			.collect()
	}

	/// Index into `writes` of the first write to `reg`.
	pub fn first_write(&self, reg: u32) -> Option<usize> {
		self.writes.iter().position(|(r, _)| *r == reg)
	}
}

impl Mmio for SimMmio {
	fn load(&mut self, offset: u32) -> u32 {
		*self.reads.entry(offset).or_default() += 1;
		let v = self.regs.get(offset);
		match self.read_hooks.get_mut(&offset) {
			Some(f) => f(&self.regs, v),
			None => v,
		}
	}

	fn store(&mut self, offset: u32, value: u32) {
		self.writes.push((offset, value));
		self.regs.mmio.insert(offset, value);
		if let Some(f) = self.write_hooks.get_mut(&offset) {
			f(&mut self.regs, value);
		}
	}
}

/// Every `wait()` is one tick. A timeout of n milliseconds expires after n ticks.
#[derive(Default)]
pub struct TickTimer {
	remaining: u128,
	pub started: Vec<Duration>,
	pub ticks: usize,
}

impl CountDown for TickTimer {
	type Time = Duration;

	fn start<T: Into<Duration>>(&mut self, duration: T) {
		let d = duration.into();
		self.remaining = d.as_millis();
		self.started.push(d);
	}

	fn wait(&mut self) -> nb::Result<(), Void> {
		self.ticks += 1;
		if self.remaining == 0 {
			Ok(())
		} else {
			self.remaining -= 1;
			Err(nb::Error::WouldBlock)
		}
	}
}

#[derive(Default)]
pub struct RecordingDelay {
	pub calls: Vec<u32>,
}

impl RecordingDelay {
	pub fn total(&self) -> u64 {
		self.calls.iter().map(|&us| u64::from(us)).sum()
	}
}

impl DelayUs<u32> for RecordingDelay {
	fn delay_us(&mut self, us: u32) {
		self.calls.push(us);
	}
}
