//! # Display PLLs
//!
//! SNB drives PCH ports from one of two PCH DPLLs, programmed through plain MMIO. VLV has a
//! DPLL per pipe whose dividers and analog settings live behind the DPIO sideband.

use crate::{
	config::{Config, Delays},
	control::{wait_for, Mmio},
	divider::{snb, vlv, DividerSolution, NotFound},
	dpio::{self, DpllRegs, Sideband},
	error::Error,
	pipe::{self, VLV_DISPLAY_BASE},
	port::{Port, PortDriver, PortKind, PortNumber, PortType},
	Display, Model, Pipe,
};
use core::time::Duration;
use embedded_hal::{blocking::delay::DelayUs, timer::CountDown};

reg! {
	DrefControl @ 0xc6200;
	ssc_source set_ssc_source [(12:11)] u8
	nonspread_source set_nonspread_source [(10:9)] u8
}

const DREF_SOURCE_ENABLE: u8 = 0b10;

reg! {
	PchDpll
	vco_enable set_vco_enable [31] bool
	high_speed set_high_speed [30] bool
	lvds_mode set_lvds_mode [27] bool
	dac_mode set_dac_mode [26] bool
	p set_p [(24:16)] u16
	ssc_enable set_ssc_enable [14] bool
	ssc_phase_enable set_ssc_phase_enable [13] bool
	pulse_phase set_pulse_phase [(12:9)] u8
}

reg! {
	Fp
	cb_tune set_cb_tune [(23:22)] u8
	n set_n [(21:16)] u8
	m1 set_m1 [(13:8)] u8
	m2 set_m2 [(5:0)] u8
}

reg! {
	DpllSelect @ 0xc7000;
	transcoder_b_enable set_transcoder_b_enable [7] bool
	transcoder_b_dpll_b set_transcoder_b_dpll_b [4] bool
	transcoder_a_enable set_transcoder_a_enable [3] bool
	transcoder_a_dpll_b set_transcoder_a_dpll_b [0] bool
}

/// Charge pump auto-tuning is allowed while `M1 < CB_TUNE_FACTOR * N`.
const CB_TUNE_FACTOR: u32 = 21;

reg! {
	VlvDpll
	vco_enable set_vco_enable [31] bool
	dpio_reference set_dpio_reference [29] bool
	lock set_lock [15] bool
}

const VLV_LOCK: u32 = 1 << 15;

/// Control words written before the sideband programming, per pipe.
const VLV_DPLL_INIT: [u32; 2] = [0x7000_2000, 0x7000_6000];

impl Pipe {
	fn pch_dpll(&self) -> u32 {
		0xc6014 + 4 * self.index() as u32
	}

	fn pch_fp(&self) -> u32 {
		0xc6040 + 8 * self.index() as u32
	}

	pub fn load_pch_dpll(&self, control: &mut impl Mmio) -> PchDpll {
		PchDpll::from_raw(control.load(self.pch_dpll()))
	}

	pub fn store_pch_dpll(&self, control: &mut impl Mmio, value: PchDpll) {
		control.store(self.pch_dpll(), value.as_raw())
	}

	fn vlv_dpll(&self) -> u32 {
		VLV_DISPLAY_BASE + 0x6014 + 4 * self.index() as u32
	}

	pub fn load_vlv_dpll(&self, control: &mut impl Mmio) -> VlvDpll {
		VlvDpll::from_raw(control.load(self.vlv_dpll()))
	}

	pub fn store_vlv_dpll(&self, control: &mut impl Mmio, value: VlvDpll) {
		control.store(self.vlv_dpll(), value.as_raw())
	}

	fn dpio_regs(&self) -> DpllRegs {
		match self {
			Self::A => dpio::DPLL_A,
			Self::B => dpio::DPLL_B,
		}
	}
}

/// Enable the PCH spread and non-spread reference sources.
pub fn enable_reference_clock(control: &mut impl Mmio, delay: &mut impl DelayUs<u32>, delays: &Delays) {
	let mut d = DrefControl::from_raw(control.load(DrefControl::REG));
	d.set_nonspread_source(DREF_SOURCE_ENABLE)
		.set_ssc_source(DREF_SOURCE_ENABLE);
	control.store(DrefControl::REG, d.as_raw());
	// posting read
	control.load(DrefControl::REG);
	delay.delay_us(delays.dref_settle);
}

/// Find dividers for a PCH port. Also returns the pixel multiplier.
pub fn snb_dividers(port: &Port, dclk: u32, config: &Config) -> Result<(DividerSolution, u32), Error> {
	// Only the integrated HDMI encoder and the DAC are driven from the PCH DPLL.
	let max = match port.port_type {
		PortType::Digital if port.is_hdmi() => 225_000,
		PortType::Analog => 350_000,
		_ => {
			log::error!("{:?} {:?} on the PCH DPLL is not supported", port.port_type, port.kind);
			return Err(Error::UnsupportedConfiguration);
		}
	};
	if !(25_000..=max).contains(&dclk) {
		log::error!("dot clock {} kHz out of range for {:?}", dclk, port.port_type);
		return Err(Error::UnsupportedClock { clock: dclk });
	}
	// Pixel multiplication is not used on the PCH ports.
	let mult = 1;
	let dclk = dclk * mult;
	// External sources are locked to the dot clock and allow no error.
	let (ref_freq, target_error) = if port.clock_source {
		(dclk, 0)
	} else {
		(snb::REF_FREQ, snb::LIMITS.target_error)
	};
	match snb::LIMITS.solve(dclk, ref_freq, port.target(), max, target_error) {
		Ok(s) => Ok((s, mult)),
		Err(NotFound) if config.default_dividers_on_failure => {
			log::warn!("no dividers for {} kHz, using 640x480 defaults", dclk);
			Ok((DividerSolution::snb_default(), mult))
		}
		Err(NotFound) => {
			log::error!("clock {} kHz could not be programmed", dclk);
			Err(Error::UnsupportedClock { clock: dclk })
		}
	}
}

/// Program the FP divider and control word, then enable the VCO.
pub fn snb_enable_dpll(
	control: &mut impl Mmio,
	delay: &mut impl DelayUs<u32>,
	delays: &Delays,
	pipe: Pipe,
	port: &Port,
	s: &DividerSolution,
) {
	let mut fp = Fp::default();
	fp.set_n(s.n as u8).set_m1(s.m1 as u8).set_m2(s.m2 as u8);
	if s.m1 < CB_TUNE_FACTOR * s.n {
		fp.set_cb_tune(0b11);
	}
	control.store(pipe.pch_fp(), fp.as_raw());

	let mut c = PchDpll::default();
	c.set_p(s.packed as u16);
	if port.port_type == PortType::Lvds {
		c.set_lvds_mode(true);
		if let Some(phase) = port.pulse_phase() {
			c.set_ssc_enable(true)
				.set_ssc_phase_enable(true)
				.set_pulse_phase(phase);
		}
	} else {
		c.set_dac_mode(true);
	}
	if port.port_type == PortType::Digital {
		c.set_high_speed(true);
	}
	// Everything but the enable bit first.
	pipe.store_pch_dpll(control, c);
	let mut c = pipe.load_pch_dpll(control);
	c.set_vco_enable(true);
	pipe.store_pch_dpll(control, c);
	log::debug!("PCH DPLL {:?}: fp {:#x} control {:#x}", pipe, fp.as_raw(), c.as_raw());
	delay.delay_us(delays.dpll_settle);
}

/// Route the pipe's DPLL to its transcoder and apply the pixel multiplier.
pub fn snb_select_dpll(
	control: &mut impl Mmio,
	delay: &mut impl DelayUs<u32>,
	delays: &Delays,
	pipe: Pipe,
	mult: u32,
) {
	let mut sel = DpllSelect::from_raw(control.load(DpllSelect::REG));
	match pipe {
		Pipe::A if !sel.transcoder_a_enable() => {
			sel.set_transcoder_a_enable(true).set_transcoder_a_dpll_b(false);
		}
		Pipe::B if !sel.transcoder_b_enable() => {
			sel.set_transcoder_b_enable(true).set_transcoder_b_dpll_b(true);
		}
		_ => {}
	}
	control.store(DpllSelect::REG, sel.as_raw());
	delay.delay_us(delays.dpll_select_settle);
	// The multiplier belongs to the DPLL routed above, which is DPLL B for pipe B.
	control.update(pipe.pch_dpll(), |v| v | mult.saturating_sub(1) << 9);
}

/// Unroute and stop the pipe's PCH DPLL.
pub fn snb_disable_dpll(control: &mut impl Mmio, pipe: Pipe) {
	let mut sel = DpllSelect::from_raw(control.load(DpllSelect::REG));
	match pipe {
		Pipe::A => {
			sel.set_transcoder_a_enable(false).set_transcoder_a_dpll_b(false);
		}
		Pipe::B => {
			sel.set_transcoder_b_enable(false).set_transcoder_b_dpll_b(false);
		}
	}
	control.store(DpllSelect::REG, sel.as_raw());
	let mut c = pipe.load_pch_dpll(control);
	c.set_vco_enable(false);
	pipe.store_pch_dpll(control, c);
}

fn vlv_ref_freq(port: &Port) -> u32 {
	match port.kind {
		PortKind::HdmiExternal | PortKind::TvOutExternal => vlv::EXTERNAL_REF_FREQ,
		_ => vlv::REF_FREQ,
	}
}

fn loop_filter(model: Model, port: &Port, dclk: u32) -> u32 {
	match port.kind {
		PortKind::DisplayPort if dclk == vlv::RATE_270 => 0x00d0_000f,
		PortKind::Hdmi if model.is_vlv2_a0() => 0x005f_0051,
		_ => 0x009f_0003,
	}
}

/// The two pipes use opposite internal reference selections for DP and HDMI.
fn reference_clock(pipe: Pipe, port: &Port) -> u32 {
	match (pipe, port.is_display_port()) {
		(Pipe::A, true) | (Pipe::B, false) => 0x0df4_0000,
		(Pipe::A, false) | (Pipe::B, true) => 0x0df7_0000,
	}
}

/// Lane resets, DP lane power and the DPLL analog settings, up to the divider word.
fn configure_dpll<M, T>(
	sb: &mut Sideband<'_, M, T>,
	regs: &DpllRegs,
	port: &Port,
	loop_filter: u32,
	reference: u32,
	divider: u32,
) -> Result<(), Error>
where
	M: Mmio,
	T: CountDown<Time = Duration>,
{
	let dp = port.is_display_port();
	// Lane resets to default, against flicker when HDMI turns off.
	match (port.number, dp) {
		(Some(PortNumber::B), false) => sb.write_all(&[(0x8200, 0x0001_0080), (0x8204, 0x0060_0060)])?,
		(Some(PortNumber::C), false) => sb.write_all(&[(0x8400, 0x0001_0080), (0x8404, 0x0060_0060)])?,
		_ => {}
	}
	// B0 workaround
	match port.number {
		Some(PortNumber::B) => sb.write_all(&[
			(0x8230, 0x0075_0f00),
			(0x82ac, 0x0000_1500),
			(0x82b8, 0x4040_0000),
		])?,
		Some(PortNumber::C) => sb.write_all(&[
			(0x8430, 0x0075_0f00),
			(0x84ac, 0x0000_1500),
			(0x84b8, 0x4040_0000),
		])?,
		None => {}
	}
	// All four DP lanes on.
	match (port.number, dp) {
		(Some(PortNumber::B), true) => sb.write_all(&[
			(0x0200, 0x0001_0080),
			(0x0204, 0x0060_0060),
			(0x0400, 0x0001_0080),
			(0x0404, 0x0060_0060),
		])?,
		(Some(PortNumber::C), true) => sb.write_all(&[
			(0x2600, 0x0001_0080),
			(0x2604, 0x0060_0060),
			(0x2800, 0x0001_0080),
			(0x2804, 0x0060_0060),
		])?,
		_ => {}
	}
	// Fast lock timer off, adaptive clocking and SFR state bypassed.
	sb.write(0x8100, 0x610)?;
	sb.write(regs.loop_filter, loop_filter)?;
	sb.write(regs.reference_clock, reference)?;
	sb.write(regs.divider, divider)?;
	sb.write(regs.enable_dclkp, 0x01c0_0000)?;
	sb.write(regs.cml_tline, 0x8787_1000)
}

fn program_lanes<M, T>(sb: &mut Sideband<'_, M, T>, pipe: Pipe, port: &Port) -> Result<(), Error>
where
	M: Mmio,
	T: CountDown<Time = Duration>,
{
	let lane = match pipe {
		Pipe::A => 0x0010_00c4,
		Pipe::B => 0x0030_00c4,
	};
	if port.is_hdmi() {
		match port.number {
			Some(PortNumber::B) => sb.write_all(&[(0x0220, lane), (0x0420, lane), (0x8220, lane)]),
			Some(PortNumber::C) => sb.write_all(&[(0x2620, lane), (0x2820, lane), (0x8420, lane)]),
			None => Ok(()),
		}
	} else if port.is_display_port() {
		let (l0, l1) = match pipe {
			Pipe::A => (0x0220, 0x0420),
			Pipe::B => (0x2620, 0x2820),
		};
		sb.update(l0, |v| v | 1 << 20)?;
		sb.update(l1, |v| v | 1 << 20)?;
		match port.number {
			Some(PortNumber::B) => sb.write(0x8220, lane),
			_ => sb.write(0x8420, lane),
		}
	} else {
		Ok(())
	}
}

/// Stagger the Tx buffer enables and set the HDMI swing to 1.0V 0dB.
fn tune_tx<M, T>(sb: &mut Sideband<'_, M, T>, port: &Port) -> Result<(), Error>
where
	M: Mmio,
	T: CountDown<Time = Duration>,
{
	let Some(number) = port.number else {
		return Ok(());
	};
	let (stagger, base, clock) = match number {
		PortNumber::B => ([0x0230, 0x0430], 0x8200, 0x0690),
		PortNumber::C => ([0x2630, 0x2830], 0x8400, 0x2a90),
	};
	sb.write_all(&[(stagger[0], 0x0040_0f00), (stagger[1], 0x0054_0f00)])?;
	if port.is_display_port() {
		return Ok(());
	}
	sb.write_all(&[
		// calcinit off
		(base + 0x94, 0),
		(base + 0x90, 0x2b24_5f5f),
		(base + 0x88, 0x5578_b83a),
		(base + 0x8c, 0x0c78_2040),
		// no de-emphasis on the clock lane
		(clock, 0x2b24_7878),
		(base + 0x2c, 0x0003_0000),
		(base + 0x24, 0x0000_2000),
		(base + 0x94, 0x8000_0000),
	])
}

impl<M, D, T> Display<M, D, T>
where
	M: Mmio,
	D: DelayUs<u32>,
	T: CountDown<Time = Duration>,
{
	/// Program and lock the VLV DPLL of `pipe` for `dclk`, which is the link rate for
	/// DisplayPort and the pixel clock otherwise.
	///
	/// Lock and sideband timeouts are logged but do not fail the sequence.
	pub(crate) fn vlv_program_clock(
		&mut self,
		pipe: Pipe,
		port: &Port,
		driver: &mut impl PortDriver,
		dclk: u32,
	) -> Result<(), Error> {
		if port.port_type == PortType::Lvds {
			log::error!("LVDS is not supported on VLV");
			return Err(Error::UnsupportedConfiguration);
		}
		pipe::set_protect(&mut self.control, pipe, false);

		let ref_freq = vlv_ref_freq(port);
		let s = vlv::solve(dclk, ref_freq, port.target()).map_err(|NotFound| {
			log::error!("clock {} kHz could not be programmed", dclk);
			Error::UnsupportedClock { clock: dclk }
		})?;

		let mut c = pipe.load_vlv_dpll(&mut self.control);
		c.set_vco_enable(false);
		pipe.store_vlv_dpll(&mut self.control, c);
		self.delay.delay_us(self.config.delays.dpll_settle);
		// The sideband needs the DPIO reference clock.
		let mut c = pipe.load_vlv_dpll(&mut self.control);
		c.set_dpio_reference(true);
		pipe.store_vlv_dpll(&mut self.control, c);

		let reset = dpio::Reset::from_raw(self.control.load(dpio::Reset::REG));
		if !reset.deasserted() {
			let mut r = dpio::Reset::default();
			self.control.store(dpio::Reset::REG, r.as_raw());
			r.set_deasserted(true);
			self.control.store(dpio::Reset::REG, r.as_raw());
		}

		self.control
			.store(pipe.vlv_dpll(), VLV_DPLL_INIT[pipe.index()]);
		let timeouts = self.config.timeouts;
		if wait_for(
			&mut self.control,
			&mut self.timer,
			timeouts.dpll_lock,
			pipe.vlv_dpll(),
			VLV_LOCK,
			0,
		)
		.is_err()
		{
			log::error!("DPLL {:?} did not unlock", pipe);
		}

		let loop_filter = loop_filter(self.model, port, dclk);
		let reference = reference_clock(pipe, port);
		let mut sb = Sideband::new(&mut self.control, &mut self.timer, timeouts.sideband_busy);
		if let Err(e) = configure_dpll(&mut sb, &pipe.dpio_regs(), port, loop_filter, reference, s.packed) {
			log::error!("DPLL {:?} sideband setup incomplete: {}", pipe, e);
		}

		let mut c = pipe.load_vlv_dpll(&mut self.control);
		c.set_vco_enable(true);
		pipe.store_vlv_dpll(&mut self.control, c);
		if wait_for(
			&mut self.control,
			&mut self.timer,
			timeouts.dpll_lock,
			pipe.vlv_dpll(),
			VLV_LOCK,
			VLV_LOCK,
		)
		.is_err()
		{
			log::error!("DPLL {:?} did not lock", pipe);
		}

		let mut sb = Sideband::new(&mut self.control, &mut self.timer, timeouts.sideband_busy);
		if let Err(e) = program_lanes(&mut sb, pipe, port) {
			log::error!("lane setup for {:?} incomplete: {}", pipe, e);
		}
		if let Err(e) = driver.port_clock(pipe, dclk) {
			log::error!("port clock hook failed: {}", e);
		}
		let mut sb = Sideband::new(&mut self.control, &mut self.timer, timeouts.sideband_busy);
		if let Err(e) = tune_tx(&mut sb, port) {
			log::error!("Tx tuning for {:?} incomplete: {}", pipe, e);
		}

		if port.is_hdmi() {
			let mult = 1u32;
			self.control
				.store(pipe.vlv_dpll() + 8, (mult - 1) | (mult - 1) << 8);
		}
		log::debug!("VLV DPLL {:?}: {} kHz, {:?}", pipe, dclk, s);
		Ok(())
	}

	/// Toggle the VCO of the pipe's VLV DPLL.
	pub(crate) fn vlv_set_dpll(&mut self, pipe: Pipe, enable: bool) {
		let mut c = pipe.load_vlv_dpll(&mut self.control);
		c.set_vco_enable(enable);
		pipe.store_vlv_dpll(&mut self.control, c);
	}
}
