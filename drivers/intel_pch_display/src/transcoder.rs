//! # PCH transcoder
//!
//! The transcoder receives the FDI stream on the PCH side and drives the port. It runs with
//! its own copy of the pipe timings.

use crate::{
	control::{wait_for, Mmio},
	error::Error,
	pipe::{self, BitsPerColor, TIMINGS},
	Pipe,
};
use core::time::Duration;
use embedded_hal::timer::CountDown;

reg! {
	Config
	enable set_enable [31] bool
	state set_state [30] bool
	bits_per_color set_bits_per_color [(try 7:5)] BitsPerColor
}

reg! {
	DpControl
	output_enable set_output_enable [31] bool
	port_select set_port_select [(30:29)] u8
}

const STATE: u32 = 1 << 30;

/// Distance between the pipe timing registers and their transcoder copies.
const TIMING_DELTA: u32 = 0xe0000 - 0x60000;

impl Pipe {
	impl_reg!(0xf0008 Config load_transcoder store_transcoder);
	impl_reg!(0xe0300 DpControl load_transcoder_dp store_transcoder_dp);

	fn transcoder(&self) -> u32 {
		0xf0008 + self.offset()
	}
}

/// Copy HTOTAL through VSYNC from the CPU pipe.
pub fn copy_timings(control: &mut impl Mmio, pipe: Pipe) {
	for reg in TIMINGS {
		let v = control.load(reg + pipe.offset());
		control.store(reg + TIMING_DELTA + pipe.offset(), v);
	}
}

/// Clear the DisplayPort data and link M/N values. Only DP outputs use them.
pub fn clear_m_n(control: &mut impl Mmio, pipe: Pipe) {
	for reg in [0xe0030, 0xe0034, 0xe0040, 0xe0044] {
		control.store(reg + pipe.offset(), 0);
	}
}

/// Enable the transcoder with the pipe's pixel depth and wait for it to report enabled.
///
/// Never reaching the enabled state is a hard failure.
pub fn enable<T>(
	control: &mut impl Mmio,
	timer: &mut T,
	timeout: Duration,
	pipe: Pipe,
) -> Result<(), Error>
where
	T: CountDown<Time = Duration>,
{
	let mut c = pipe.load_transcoder(control);
	c.set_bits_per_color(pipe::bits_per_color(control, pipe))
		.set_enable(true);
	pipe.store_transcoder(control, c);
	wait_for(control, timer, timeout, pipe.transcoder(), STATE, STATE).map_err(|e| {
		log::error!("transcoder {:?} did not enable", pipe);
		e
	})
}

/// Disable the transcoder and its DisplayPort output. A transcoder that stays on is only
/// logged.
pub fn disable<T>(control: &mut impl Mmio, timer: &mut T, timeout: Duration, pipe: Pipe)
where
	T: CountDown<Time = Duration>,
{
	let mut c = pipe.load_transcoder(control);
	if c.enable() {
		c.set_enable(false);
		pipe.store_transcoder(control, c);
		if wait_for(control, timer, timeout, pipe.transcoder(), STATE, 0).is_err() {
			log::error!("transcoder {:?} did not disable", pipe);
		}
	}
	let mut dp = pipe.load_transcoder_dp(control);
	dp.set_output_enable(false).set_port_select(0);
	pipe.store_transcoder_dp(control, dp);
}
