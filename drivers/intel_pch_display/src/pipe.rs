//! # CPU display pipe

use crate::{
	control::{wait_for, Mmio},
	fdi::FdiLinkState,
};
use core::time::Duration;
use embedded_hal::timer::CountDown;

reg! {
	Config
	enable set_enable [31] bool
	state set_state [30] bool
	bits_per_color set_bits_per_color [(try 7:5)] BitsPerColor
}

bit2enum! {
	try BitsPerColor
	B8 0b000
	B10 0b001
	B6 0b010
	B12 0b011
}

reg! {
	DataM
	tu_size set_tu_size [(30:25)] u8
	value set_value [(23:0)] u32
}

reg! {
	DataN
	value set_value [(23:0)] u32
}

reg! {
	PanelFitterControl
	enable set_enable [31] bool
}

reg! {
	PipeProtect
	key set_key [(31:16)] u16
}

/// Unlocks the VLV pipe registers.
const PROTECT_KEY: u16 = 0xabcd;

/// VLV moves the display engine registers up by this amount.
pub const VLV_DISPLAY_BASE: u32 = 0x180000;

/// HTOTAL, HBLANK, HSYNC, VTOTAL, VBLANK and VSYNC.
pub const TIMINGS: [u32; 6] = [0x60000, 0x60004, 0x60008, 0x6000c, 0x60010, 0x60014];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pipe {
	A,
	B,
}

impl Pipe {
	pub const ALL: [Self; 2] = [Self::A, Self::B];

	pub(crate) fn index(&self) -> usize {
		match self {
			Self::A => 0,
			Self::B => 1,
		}
	}

	pub(crate) fn offset(&self) -> u32 {
		0x1000 * self.index() as u32
	}

	impl_reg!(0x70008 Config load_config store_config);
	impl_reg!(0x60030 DataM load_data_m store_data_m);
	impl_reg!(0x60034 DataN load_data_n store_data_n);
	impl_reg!(0x60040 DataN load_link_m store_link_m);
	impl_reg!(0x60044 DataN load_link_n store_link_n);

	fn panel_fitter(&self) -> u32 {
		0x68080 + 0x800 * self.index() as u32
	}

	pub fn load_panel_fitter(&self, control: &mut impl Mmio) -> PanelFitterControl {
		PanelFitterControl::from_raw(control.load(self.panel_fitter()))
	}

	pub fn store_panel_fitter(&self, control: &mut impl Mmio, value: PanelFitterControl) {
		control.store(self.panel_fitter(), value.as_raw())
	}

	pub fn store_panel_fitter_window_size(&self, control: &mut impl Mmio, value: u32) {
		control.store(0x68074 + 0x800 * self.index() as u32, value)
	}

	/// VLV only.
	fn protect(&self) -> u32 {
		VLV_DISPLAY_BASE + 0x61204 + 0x100 * self.index() as u32
	}
}

/// A pipe behind the VLV display base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VlvPipe(pub Pipe);

impl VlvPipe {
	fn offset(&self) -> u32 {
		VLV_DISPLAY_BASE + self.0.offset()
	}

	impl_reg!(0x70008 Config load_config store_config);
}

/// Write the FDI data and link M/N values into the pipe.
pub fn set_m_n(control: &mut impl Mmio, pipe: Pipe, state: &FdiLinkState) {
	let mut m = DataM::default();
	m.set_tu_size((state.tu - 1) as u8).set_value(state.gmch_m);
	pipe.store_data_m(control, m);
	let mut n = DataN::default();
	n.set_value(state.gmch_n);
	pipe.store_data_n(control, n);
	let mut n = DataN::default();
	n.set_value(state.link_m);
	pipe.store_link_m(control, n);
	n.set_value(state.link_n);
	pipe.store_link_n(control, n);
	log::debug!("pipe {:?} M/N: {:?}", pipe, state);
}

pub fn set_enable(control: &mut impl Mmio, pipe: Pipe, enable: bool) {
	let mut c = pipe.load_config(control);
	c.set_enable(enable);
	pipe.store_config(control, c);
}

/// Stop the pipe and its panel fitter. A pipe that keeps running is only logged.
pub fn disable<T>(control: &mut impl Mmio, timer: &mut T, timeout: Duration, pipe: Pipe)
where
	T: CountDown<Time = Duration>,
{
	let mut c = pipe.load_config(control);
	if c.enable() {
		c.set_enable(false);
		pipe.store_config(control, c);
		if wait_for(control, timer, timeout, 0x70008 + pipe.offset(), 1 << 30, 0).is_err() {
			log::error!("pipe {:?} did not stop", pipe);
		}
	}
	pipe.store_panel_fitter(control, PanelFitterControl::default());
	pipe.store_panel_fitter_window_size(control, 0);
}

/// Remove or restore the VLV pipe register write protection.
pub fn set_protect(control: &mut impl Mmio, pipe: Pipe, protect: bool) {
	let reg = pipe.protect();
	let mut p = PipeProtect::from_raw(control.load(reg));
	p.set_key(if protect { 0 } else { PROTECT_KEY });
	control.store(reg, p.as_raw());
}

/// Bits per color of the pipe, 8 if the field holds a reserved value.
pub fn bits_per_color(control: &mut impl Mmio, pipe: Pipe) -> BitsPerColor {
	pipe.load_config(control)
		.bits_per_color()
		.unwrap_or(BitsPerColor::B8)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::sim::{SimMmio, TickTimer};

	#[test]
	fn m_n_registers() {
		let mut mmio = SimMmio::new();
		let state = FdiLinkState {
			lanes: 2,
			tu: 64,
			gmch_m: 0x123456,
			gmch_n: 0x654321,
			link_m: 148_500,
			link_n: 270_000,
			port_mult: 1,
		};
		set_m_n(&mut mmio, Pipe::B, &state);
		assert_eq!(mmio.get(0x61030), (63 << 25) | 0x123456);
		assert_eq!(mmio.get(0x61034), 0x654321);
		assert_eq!(mmio.get(0x61040), 148_500);
		assert_eq!(mmio.get(0x61044), 270_000);
	}

	#[test]
	fn protect_keeps_low_half() {
		let mut mmio = SimMmio::new();
		mmio.set(0x1e1304, 0x0000_1234);
		set_protect(&mut mmio, Pipe::B, false);
		assert_eq!(mmio.get(0x1e1304), 0xabcd_1234);
		set_protect(&mut mmio, Pipe::B, true);
		assert_eq!(mmio.get(0x1e1304), 0x0000_1234);
	}

	#[test]
	fn disable_waits_for_state() {
		let mut mmio = SimMmio::new();
		mmio.set(0x71008, 1 << 31 | 1 << 30);
		mmio.set(0x68880, 1 << 31);
		// The state bit clears after three polls.
		let mut polls = 0;
		mmio.on_read(0x71008, move |_, v| {
			polls += 1;
			if polls > 3 {
				v & !(1 << 30)
			} else {
				v
			}
		});
		let mut timer = TickTimer::default();
		disable(&mut mmio, &mut timer, Duration::from_millis(50), Pipe::B);
		assert_eq!(mmio.writes_to(0x71008), [1 << 30]);
		assert_eq!(timer.ticks, 2);
		assert_eq!(mmio.get(0x68880), 0);
		assert_eq!(mmio.writes_to(0x68874), [0]);
	}

	#[test]
	fn reserved_bpc() {
		let mut mmio = SimMmio::new();
		mmio.set(0x70008, 0b111 << 5);
		assert_eq!(bits_per_color(&mut mmio, Pipe::A), BitsPerColor::B8);
		mmio.set(0x70008, 0b001 << 5);
		assert_eq!(bits_per_color(&mut mmio, Pipe::A), BitsPerColor::B10);
	}
}
