//! Delays, timeouts and retry counts used during a mode set.
//!
//! Most delays are longer than the documented hardware minimum. They were widened to work
//! around link failures seen on real boards and must not be reduced to the documented values.

use core::time::Duration;

/// Fixed waits, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delays {
	/// After unmasking the FDI RX lock bits. Documentation has no requirement.
	pub fdi_imr_settle: u32,
	/// After enabling FDI TX and RX for pattern 1. Documented: 10 (CPU) / 25 (PCH).
	pub fdi_rx_warmup: u32,
	/// Between writing a voltage-swing preset and sampling the lock status. Documented: 32.
	pub fdi_lock_poll: u32,
	/// After switching both sides to pattern 2.
	pub fdi_pattern2_settle: u32,
	/// One idle pattern after leaving training mode.
	pub fdi_idle_pattern: u32,
	/// After enabling the FDI RX PLL. Documented: 25.
	pub fdi_rx_pll_warmup: u32,
	/// After switching FDI RX from raw clock to PCD clock.
	pub fdi_pcdclk_switch: u32,
	/// After enabling the FDI TX PLL. Documented: 10.
	pub fdi_tx_pll_warmup: u32,
	/// After changing the FDI enable and PLL bits on teardown.
	pub fdi_disable_settle: u32,
	/// After enabling the PCH reference clock sources. Documented: 1.
	pub dref_settle: u32,
	/// After enabling a DPLL. Documented: 50.
	pub dpll_settle: u32,
	/// After routing a DPLL to a transcoder.
	pub dpll_select_settle: u32,
}

/// Alarm durations for status polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
	pub transcoder_enable: Duration,
	pub transcoder_disable: Duration,
	pub pipe_state: Duration,
	pub dpll_lock: Duration,
	pub sideband_busy: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
	pub delays: Delays,
	pub timeouts: Timeouts,
	/// Retry DisplayPort training once at 1.62 GHz after it failed at 2.7 GHz.
	pub dp_rate_fallback: bool,
	/// Program the 640x480@60 dividers instead of failing when no divider solution exists
	/// for the requested clock.
	pub default_dividers_on_failure: bool,
}

impl Default for Delays {
	fn default() -> Self {
		Self {
			fdi_imr_settle: 150,
			fdi_rx_warmup: 150,
			fdi_lock_poll: 500,
			fdi_pattern2_settle: 150,
			fdi_idle_pattern: 1000,
			fdi_rx_pll_warmup: 200,
			fdi_pcdclk_switch: 200,
			fdi_tx_pll_warmup: 100,
			fdi_disable_settle: 100,
			dref_settle: 200,
			dpll_settle: 150,
			dpll_select_settle: 10,
		}
	}
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			transcoder_enable: Duration::from_millis(100),
			transcoder_disable: Duration::from_millis(100),
			pipe_state: Duration::from_millis(50),
			dpll_lock: Duration::from_millis(200),
			sideband_busy: Duration::from_millis(100),
		}
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			delays: Default::default(),
			timeouts: Default::default(),
			dp_rate_fallback: true,
			default_dividers_on_failure: false,
		}
	}
}
