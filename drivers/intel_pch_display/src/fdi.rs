//! # Flexible Display Interface
//!
//! FDI carries pixels from the CPU pipe to the PCH transcoder. The link needs enough lanes
//! for the pixel bandwidth and two M/N ratios that tell the receiver how to recover the pixel
//! clock.

use crate::{
	config::Delays,
	control::Mmio,
	error::Error,
	pipe::{self, BitsPerColor},
	Pipe,
};
use embedded_hal::blocking::delay::DelayUs;

reg! {
	TxControl
	enable set_enable [31] bool
	training set_training [(29:28)] TxTraining
	voltage_emphasis set_voltage_emphasis [(27:22)] u8
	port_width set_port_width [(21:19)] u8
	enhanced_frame set_enhanced_frame [18] bool
	pll_enable set_pll_enable [14] bool
}

bit2enum! {
	TxTraining
	Pattern1 0b00
	Pattern2 0b01
	Idle 0b10
	None 0b11
}

reg! {
	RxControl
	enable set_enable [31] bool
	port_width set_port_width [(21:19)] u8
	bits_per_color set_bits_per_color [(try 18:16)] BitsPerColor
	pll_enable set_pll_enable [13] bool
	training set_training [(9:8)] RxTraining
	enhanced_frame set_enhanced_frame [6] bool
	pcd_clock set_pcd_clock [4] bool
}

// CPT encoding
bit2enum! {
	RxTraining
	Pattern1 0b00
	Pattern2 0b01
	Idle 0b10
	Normal 0b11
}

reg! {
	RxStatus
	symbol_lock set_symbol_lock [9] bool
	bit_lock set_bit_lock [8] bool
}

reg! {
	RxTuSize
	tu_size set_tu_size [(30:25)] u8
}

reg! {
	RxChicken
	phase_sync_pointer set_phase_sync_pointer [0] bool
}

/// Bandwidth of one FDI lane in kHz of pixel octets.
pub const LINK_BW: u32 = 270_000;

/// Only 24-bit pixels are carried.
pub const BPP: u32 = 24;

/// Fixed transfer unit size.
pub const TU_SIZE: u32 = 64;

impl Pipe {
	impl_reg!(0x60100 TxControl load_fdi_tx store_fdi_tx);
	impl_reg!(0xf000c RxControl load_fdi_rx store_fdi_rx);
	impl_reg!(0xf0014 RxStatus load_fdi_rx_iir store_fdi_rx_iir);
	impl_reg!(0xf0018 RxStatus load_fdi_rx_imr store_fdi_rx_imr);
	impl_reg!(0xf0030 RxTuSize load_fdi_rx_tusize store_fdi_rx_tusize);

	fn fdi_rx_chicken(&self) -> u32 {
		0xc200c + 4 * self.index() as u32
	}

	pub fn load_fdi_rx_chicken(&self, control: &mut impl Mmio) -> RxChicken {
		RxChicken::from_raw(control.load(self.fdi_rx_chicken()))
	}

	pub fn store_fdi_rx_chicken(&self, control: &mut impl Mmio, value: RxChicken) {
		control.store(self.fdi_rx_chicken(), value.as_raw())
	}
}

/// Link parameters for one mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FdiLinkState {
	pub lanes: u32,
	pub tu: u32,
	pub gmch_m: u32,
	pub gmch_n: u32,
	pub link_m: u32,
	pub link_n: u32,
	/// Pixel multiplier of the port.
	pub port_mult: u32,
}

/// Shift both values right until they fit in 24 bits.
///
/// Takes 64-bit values since the data ratio product can exceed 32 bits before reduction.
pub fn reduce(mut num: u64, mut den: u64) -> (u32, u32) {
	while num > 0xff_ffff || den > 0xff_ffff {
		num >>= 1;
		den >>= 1;
	}
	(num as u32, den as u32)
}

/// Lanes needed for a pixel clock, with 5% margin for spread spectrum.
///
/// Always one more lane than the bandwidth strictly requires.
pub fn lanes(pixel_clock: u32, bpp: u32, link_bw: u32) -> u32 {
	let bps = u64::from(pixel_clock) * u64::from(bpp) * 21 / 20;
	(bps / (u64::from(link_bw) * 8)) as u32 + 1
}

impl FdiLinkState {
	pub fn compute(bpp: u32, lanes: u32, pixel_clock: u32, link_clock: u32) -> Result<Self, Error> {
		if bpp == 0 || lanes == 0 || pixel_clock == 0 || link_clock == 0 {
			return Err(Error::InvalidArgument);
		}
		let gmch_m = u64::from(bpp) * u64::from(pixel_clock);
		let gmch_n = u64::from(link_clock) * u64::from(lanes) * 8;
		let (gmch_m, gmch_n) = reduce(gmch_m, gmch_n);
		let (link_m, link_n) = reduce(pixel_clock.into(), link_clock.into());
		Ok(Self {
			lanes,
			tu: TU_SIZE,
			gmch_m,
			gmch_n,
			link_m,
			link_n,
			port_mult: 1,
		})
	}
}

/// Set the TU size and lane count, then bring up the RX PLL, the PCD clock and the TX PLL.
pub fn enable_plls(
	control: &mut impl Mmio,
	delay: &mut impl DelayUs<u32>,
	delays: &Delays,
	pipe: Pipe,
	state: &FdiLinkState,
) {
	let width = state.lanes.saturating_sub(1) as u8;
	// Needed for error detection.
	let mut tu = RxTuSize::default();
	tu.set_tu_size((state.tu - 1) as u8);
	pipe.store_fdi_rx_tusize(control, tu);

	let mut rx = pipe.load_fdi_rx(control);
	rx.set_port_width(width)
		.set_bits_per_color(BitsPerColor::B8)
		.set_pll_enable(true);
	pipe.store_fdi_rx(control, rx);
	delay.delay_us(delays.fdi_rx_pll_warmup);

	let mut rx = pipe.load_fdi_rx(control);
	rx.set_pcd_clock(true);
	pipe.store_fdi_rx(control, rx);
	delay.delay_us(delays.fdi_pcdclk_switch);

	let mut tx = pipe.load_fdi_tx(control);
	tx.set_port_width(width);
	if !tx.pll_enable() {
		tx.set_pll_enable(true);
		pipe.store_fdi_tx(control, tx);
		delay.delay_us(delays.fdi_tx_pll_warmup);
	}
	log::debug!("FDI {:?}: {} lanes", pipe, state.lanes);
}

/// Turn both sides of the link off and leave them ready for pattern 1.
pub fn disable(control: &mut impl Mmio, delay: &mut impl DelayUs<u32>, delays: &Delays, pipe: Pipe) {
	let mut tx = pipe.load_fdi_tx(control);
	tx.set_enable(false);
	pipe.store_fdi_tx(control, tx);
	delay.delay_us(delays.fdi_disable_settle);

	let mut rx = pipe.load_fdi_rx(control);
	rx.set_enable(false);
	pipe.store_fdi_rx(control, rx);
	delay.delay_us(delays.fdi_disable_settle);

	// Clock pointer off after the link is down.
	let mut c = pipe.load_fdi_rx_chicken(control);
	c.set_phase_sync_pointer(false);
	pipe.store_fdi_rx_chicken(control, c);

	let mut tx = pipe.load_fdi_tx(control);
	tx.set_training(TxTraining::Pattern1);
	pipe.store_fdi_tx(control, tx);
	let mut rx = pipe.load_fdi_rx(control);
	rx.set_training(RxTraining::Pattern1)
		.set_bits_per_color(pipe::bits_per_color(control, pipe));
	pipe.store_fdi_rx(control, rx);
	delay.delay_us(delays.fdi_disable_settle);
}

/// Switch RX back to the raw clock and stop both PLLs.
pub fn disable_plls(
	control: &mut impl Mmio,
	delay: &mut impl DelayUs<u32>,
	delays: &Delays,
	pipe: Pipe,
) {
	let mut rx = pipe.load_fdi_rx(control);
	rx.set_pcd_clock(false);
	pipe.store_fdi_rx(control, rx);

	let mut tx = pipe.load_fdi_tx(control);
	tx.set_pll_enable(false);
	pipe.store_fdi_tx(control, tx);
	delay.delay_us(delays.fdi_disable_settle);

	let mut rx = pipe.load_fdi_rx(control);
	rx.set_pll_enable(false);
	pipe.store_fdi_rx(control, rx);
	delay.delay_us(delays.fdi_disable_settle);
}

/// Per-pipe link state. `pending` is computed during a mode set and only becomes `live` once
/// the transcoder reports enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct FdiLink {
	pub pending: FdiLinkState,
	pub live: FdiLinkState,
}

impl FdiLink {
	pub fn commit(&mut self) {
		self.live = self.pending;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::sim::{RecordingDelay, SimMmio};
	use proptest::prelude::*;

	#[test]
	fn pll_bring_up() {
		let mut mmio = SimMmio::new();
		let mut delay = RecordingDelay::default();
		let state = FdiLinkState::compute(BPP, 2, 148_500, LINK_BW).unwrap();
		enable_plls(&mut mmio, &mut delay, &Delays::default(), Pipe::A, &state);
		assert_eq!(mmio.get(0xf0030), 63 << 25);
		assert_eq!(mmio.writes_to(0xf000c), [1 << 19 | 1 << 13, 1 << 19 | 1 << 13 | 1 << 4]);
		assert_eq!(mmio.writes_to(0x60100), [1 << 19 | 1 << 14]);
		assert_eq!(delay.calls, [200, 200, 100]);
	}

	#[test]
	fn tx_pll_already_running() {
		let mut mmio = SimMmio::new();
		let mut delay = RecordingDelay::default();
		mmio.set(0x61100, 1 << 14);
		let state = FdiLinkState::compute(BPP, 1, 65_000, LINK_BW).unwrap();
		enable_plls(&mut mmio, &mut delay, &Delays::default(), Pipe::B, &state);
		assert!(mmio.writes_to(0x61100).is_empty());
		assert_eq!(delay.calls, [200, 200]);
	}

	#[test]
	fn teardown_resets_training() {
		let mut mmio = SimMmio::new();
		let mut delay = RecordingDelay::default();
		let d = Delays::default();
		mmio.set(0x60100, 1 << 31 | 0b11 << 28 | 1 << 14);
		mmio.set(0xf000c, 1 << 31 | 0b11 << 8 | 1 << 13 | 1 << 4);
		mmio.set(0xc200c, 1);
		mmio.set(0x70008, 0b001 << 5);
		disable(&mut mmio, &mut delay, &d, Pipe::A);
		assert_eq!(mmio.get(0x60100), 1 << 14);
		assert_eq!(mmio.get(0xf000c), 0b001 << 16 | 1 << 13 | 1 << 4);
		assert_eq!(mmio.get(0xc200c), 0);
		disable_plls(&mut mmio, &mut delay, &d, Pipe::A);
		assert_eq!(mmio.get(0x60100), 0);
		assert_eq!(mmio.get(0xf000c), 0b001 << 16);
		assert_eq!(delay.calls, [100; 5]);
	}

	#[test]
	fn full_hd() {
		let lanes = lanes(148_500, BPP, LINK_BW);
		assert_eq!(lanes, 2);
		let s = FdiLinkState::compute(BPP, lanes, 148_500, LINK_BW).unwrap();
		assert_eq!((s.gmch_m, s.gmch_n), (3_564_000, 4_320_000));
		assert_eq!((s.link_m, s.link_n), (148_500, 270_000));
		assert_eq!(s.tu, 64);
	}

	#[test]
	fn lane_count() {
		assert_eq!(lanes(25_000, BPP, LINK_BW), 1);
		assert_eq!(lanes(85_714, BPP, LINK_BW), 1);
		assert_eq!(lanes(85_715, BPP, LINK_BW), 2);
		assert_eq!(lanes(350_000, BPP, LINK_BW), 5);
	}

	#[test]
	fn reduce_shifts_both() {
		assert_eq!(reduce(0x0200_0000, 0x100), (0x80_0000, 0x40));
		assert_eq!(reduce(0xff_ffff, 0xff_ffff), (0xff_ffff, 0xff_ffff));
		assert_eq!(reduce(0x1_0000_0000, 0x20_0000), (0x80_0000, 0x1000));
	}

	#[test]
	fn zero_rejected() {
		assert_eq!(
			FdiLinkState::compute(BPP, 0, 148_500, LINK_BW),
			Err(Error::InvalidArgument)
		);
		assert_eq!(
			FdiLinkState::compute(BPP, 2, 0, LINK_BW),
			Err(Error::InvalidArgument)
		);
	}

	#[test]
	fn commit_copies_pending() {
		let mut link = FdiLink::default();
		link.pending = FdiLinkState::compute(BPP, 2, 148_500, LINK_BW).unwrap();
		assert_eq!(link.live, FdiLinkState::default());
		link.commit();
		assert_eq!(link.live, link.pending);
	}

	proptest! {
		#[test]
		fn fits_24_bits(
			bpp in 1u32..=48,
			lanes in 1u32..=8,
			pclk in 1u32..=u32::MAX / 48,
			link in 1u32..=u32::MAX / 64,
		) {
			let a = FdiLinkState::compute(bpp, lanes, pclk, link).unwrap();
			let b = FdiLinkState::compute(bpp, lanes, pclk, link).unwrap();
			prop_assert_eq!(a, b);
			for v in [a.gmch_m, a.gmch_n, a.link_m, a.link_n] {
				prop_assert!(v <= 0xff_ffff);
			}
		}

		#[test]
		fn reduce_is_stable(num in any::<u64>(), den in any::<u64>()) {
			let r = reduce(num, den);
			prop_assert!(r.0 <= 0xff_ffff && r.1 <= 0xff_ffff);
			prop_assert_eq!(reduce(r.0.into(), r.1.into()), r);
		}
	}
}
