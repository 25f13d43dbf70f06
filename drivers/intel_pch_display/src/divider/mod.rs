//! # PLL divider search
//!
//! Finds integer M/N/P dividers that synthesize a pixel clock from a reference clock. All
//! frequencies are in kHz.
//!
//! The search is exhaustive over small, generation-specific tables. Both generations follow
//! the same shape: fix P2 from the port type and clock, enumerate the remaining dividers,
//! reject out-of-range VCO frequencies and keep the candidate with the smallest error.

pub mod snb;
pub mod vlv;

/// No divider combination meets the error threshold.
///
/// Callers either fall back to a known-good default mode or fail the mode set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotFound;

/// Port classes that select divider tables and P2 rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
	Analog,
	Lvds { dual_channel: bool },
	Hdmi,
	DisplayPort,
}

/// Dividers for one pixel clock.
///
/// For SNB `m1`, `m2` and `n` are register values (the hardware adds 2), `p1` and `p2` are
/// the actual divisors and `packed` is the DPLL P field. For VLV all five are actual values
/// and `packed` is the sideband M/K/N/P word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DividerSolution {
	pub m1: u32,
	pub m2: u32,
	pub n: u32,
	pub p1: u32,
	pub p2: u32,
	/// VCO frequency the search validated.
	pub vco: u32,
	/// Frequency error in the generation's unit: parts per ten thousand on SNB, ppm of the
	/// data rate on VLV.
	pub error: u32,
	pub packed: u32,
}

pub(crate) fn gcd(mut a: u32, mut b: u32) -> u32 {
	while b != 0 {
		(a, b) = (b, a % b);
	}
	a
}
