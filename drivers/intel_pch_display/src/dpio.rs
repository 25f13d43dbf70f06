//! # VLV DPIO sideband
//!
//! The DPIO PLL and PHY registers are only reachable through a packet interface in the
//! display MMIO space. A transaction waits for the busy bit to clear, latches the target
//! address (and data for writes), then sends a packet carrying the opcode.

use crate::{
	control::{wait_for, Mmio},
	error::Error,
	pipe::VLV_DISPLAY_BASE,
};
use core::time::Duration;
use embedded_hal::timer::CountDown;

reg! {
	Packet @ VLV_DISPLAY_BASE + 0x2100;
	opcode set_opcode [(try 23:16)] Opcode
	port set_port [(15:8)] u8
	byte_enable set_byte_enable [(7:4)] u8
	busy set_busy [0] bool
}

bit2enum! {
	try Opcode
	Read 0
	Write 1
}

pub const DATA: u32 = VLV_DISPLAY_BASE + 0x2104;
pub const ADDRESS: u32 = VLV_DISPLAY_BASE + 0x2108;

reg! {
	Reset @ VLV_DISPLAY_BASE + 0x2110;
	deasserted set_deasserted [0] bool
}

const DPIO_PORT: u8 = 0x12;

impl Packet {
	fn new(opcode: Opcode) -> Self {
		let mut p = Self::default();
		p.set_opcode(opcode)
			.set_port(DPIO_PORT)
			.set_byte_enable(0xf);
		p
	}
}

/// Sideband register offsets of one DPLL.
#[derive(Clone, Copy, Debug)]
pub struct DpllRegs {
	pub divider: u32,
	pub reference_clock: u32,
	pub loop_filter: u32,
	pub enable_dclkp: u32,
	pub cml_tline: u32,
}

pub const DPLL_A: DpllRegs = DpllRegs {
	divider: 0x800c,
	reference_clock: 0x8014,
	loop_filter: 0x8048,
	enable_dclkp: 0x801c,
	cml_tline: 0x804c,
};

pub const DPLL_B: DpllRegs = DpllRegs {
	divider: 0x802c,
	reference_clock: 0x8034,
	loop_filter: 0x8068,
	enable_dclkp: 0x803c,
	cml_tline: 0x806c,
};

/// A sideband transaction context borrowing the MMIO space and an alarm.
pub struct Sideband<'a, M, T> {
	pub control: &'a mut M,
	pub timer: &'a mut T,
	pub timeout: Duration,
}

impl<'a, M, T> Sideband<'a, M, T>
where
	M: Mmio,
	T: CountDown<Time = Duration>,
{
	pub fn new(control: &'a mut M, timer: &'a mut T, timeout: Duration) -> Self {
		Self {
			control,
			timer,
			timeout,
		}
	}

	fn wait_idle(&mut self) -> Result<(), Error> {
		wait_for(
			&mut *self.control,
			&mut *self.timer,
			self.timeout,
			Packet::REG,
			1,
			0,
		)
		.map_err(|e| {
			log::error!("timeout waiting for sideband busy bit to clear");
			e
		})
	}

	pub fn read(&mut self, reg: u32) -> Result<u32, Error> {
		self.wait_idle()?;
		self.control.store(ADDRESS, reg);
		self.control
			.store(Packet::REG, Packet::new(Opcode::Read).as_raw());
		self.wait_idle()?;
		let v = self.control.load(DATA);
		log::trace!("DPIO {:#06x} -> {:#010x}", reg, v);
		Ok(v)
	}

	pub fn write(&mut self, reg: u32, value: u32) -> Result<(), Error> {
		self.wait_idle()?;
		self.control.store(ADDRESS, reg);
		self.control.store(DATA, value);
		self.control
			.store(Packet::REG, Packet::new(Opcode::Write).as_raw());
		log::trace!("DPIO {:#06x} <- {:#010x}", reg, value);
		Ok(())
	}

	pub fn update(&mut self, reg: u32, f: impl FnOnce(u32) -> u32) -> Result<(), Error> {
		let v = self.read(reg)?;
		self.write(reg, f(v))
	}

	/// Write a sequence of registers, stopping at the first failure.
	pub fn write_all(&mut self, values: &[(u32, u32)]) -> Result<(), Error> {
		values.iter().try_for_each(|&(r, v)| self.write(r, v))
	}
}
