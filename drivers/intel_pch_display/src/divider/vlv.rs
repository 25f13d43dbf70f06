//! Valleyview DPIO PLL dividers.
//!
//! `vco = (ref / N) * M1 * M2`, `fastclk = vco / (P1 * P2)` and the PLL output is
//! `2 * fastclk`, compared against a data rate of ten times the pixel clock.

use super::{gcd, DividerSolution, NotFound, Target};
use core::ops::RangeInclusive;

/// Maximum accepted error in ppm of the data rate.
pub const TARGET_ERROR: u32 = 5000;

/// Internal reference clock.
pub const REF_FREQ: u32 = 100_000;

/// Reference clock of external HDMI and TV encoders.
pub const EXTERNAL_REF_FREQ: u32 = 27_000;

pub const POST_DIV_SEL: u32 = 1;

/// DisplayPort link rates in kHz.
pub const RATE_162: u32 = 162_000;
pub const RATE_270: u32 = 270_000;

pub struct Limits {
	pub ref_freq: u32,
	pub m1: RangeInclusive<u32>,
	pub m2: RangeInclusive<u32>,
	pub n: RangeInclusive<u32>,
	pub p1: RangeInclusive<u32>,
	pub p2: RangeInclusive<u32>,
	pub vco: RangeInclusive<u32>,
}

macro_rules! limits {
	($($ref:literal $m2:expr, $n:expr, $p2:expr, $vco:expr;)*) => {
		[$(Limits {
			ref_freq: $ref,
			m1: 2..=3,
			m2: $m2,
			n: $n,
			p1: 2..=3,
			p2: $p2,
			vco: $vco,
		},)*]
	};
}

pub static DAC_LIMITS: [Limits; 6] = limits! {
	19_200 2..=255, 1..=10, 2..=20, 4_000_000..=6_000_000;
	27_000 2..=255, 1..=10, 2..=20, 4_000_000..=6_000_000;
	96_000 11..=156, 1..=7, 2..=20, 4_000_000..=6_000_000;
	100_000 11..=156, 1..=7, 2..=20, 4_000_000..=6_000_000;
	120_000 2..=255, 1..=10, 2..=20, 4_000_000..=6_000_000;
	135_000 2..=255, 1..=10, 2..=20, 4_000_000..=6_000_000;
};

pub static HDMI_LIMITS: [Limits; 6] = limits! {
	19_200 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	27_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	96_000 11..=156, 1..=7, 2..=20, 4_000_000..=6_000_000;
	100_000 11..=156, 1..=7, 2..=20, 4_000_000..=6_000_000;
	120_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	135_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
};

pub static DP_LIMITS: [Limits; 6] = limits! {
	19_200 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	27_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	96_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	100_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	120_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
	135_000 11..=156, 1..=7, 1..=20, 4_000_000..=5_994_000;
};

/// Look up the limit row for a port class and reference clock.
///
/// There is no VLV table for LVDS.
pub fn limits(target: Target, ref_freq: u32) -> Option<&'static Limits> {
	let table: &'static [Limits; 6] = match target {
		Target::Analog => &DAC_LIMITS,
		Target::Hdmi => &HDMI_LIMITS,
		Target::DisplayPort => &DP_LIMITS,
		Target::Lvds { .. } => return None,
	};
	table.iter().find(|l| l.ref_freq == ref_freq)
}

/// Fixed DisplayPort dividers as `(m1, m2, n, p1, p2)`.
fn dp_fixed(link_rate: u32, ref_freq: u32) -> Option<(u32, u32, u32, u32, u32)> {
	Some(match (link_rate, ref_freq) {
		(RATE_270, 27_000) => (2, 100, 1, 2, 2),
		(RATE_270, 96_000) => (3, 75, 4, 2, 2),
		(RATE_270, 100_000) => (2, 27, 1, 2, 2),
		(RATE_162, 27_000) => (2, 90, 1, 3, 2),
		(RATE_162, 96_000) => (2, 76, 3, 3, 2),
		(RATE_162, 100_000) => (3, 81, 5, 3, 2),
		_ => return None,
	})
}

fn is_reserved_p2(p2: u32) -> bool {
	matches!(p2, 11 | 13 | 15 | 17 | 19) || p2 >= 21
}

/// Pack dividers into the sideband M/K/N/P divider word.
pub fn pack(m1: u32, m2: u32, n: u32, p1: u32, p2: u32) -> u32 {
	let mut v = 0x0100_0800;
	v |= 0x7000_0000 & (POST_DIV_SEL << 28);
	v |= 0x00e0_0000 & (p1 << 21);
	v |= 0x001f_0000 & (p2 << 16);
	v |= 0x0000_f000 & (n << 12);
	v |= 0x0000_0700 & (m1 << 8);
	v |= 0x0000_00ff & m2;
	v
}

fn solution(m1: u32, m2: u32, n: u32, p1: u32, p2: u32, ref_freq: u32, error: u32) -> DividerSolution {
	DividerSolution {
		m1,
		m2,
		n,
		p1,
		p2,
		vco: ref_freq / n * m1 * m2,
		error,
		packed: pack(m1, m2, n, p1, p2),
	}
}

impl Limits {
	/// For DisplayPort `dclk` is the link rate and only the fixed divider table is used.
	pub fn solve(&self, dclk: u32, target: Target) -> Result<DividerSolution, NotFound> {
		let ref_freq = self.ref_freq;

		if target == Target::DisplayPort {
			let Some((m1, m2, n, p1, p2)) = dp_fixed(dclk, ref_freq) else {
				log::error!("no DP dividers for {} kHz at {} kHz reference", dclk, ref_freq);
				return Err(NotFound);
			};
			return Ok(solution(m1, m2, n, p1, p2, ref_freq, 0));
		}

		let analog = target == Target::Analog;
		let data_rate = u64::from(dclk) * 10;

		let mut min_error = u64::from(TARGET_ERROR);
		let mut freq_error_min = 10_000;
		let mut least_error_mod = 10_000;
		let mut best = None;

		for m1 in self.m1.clone() {
			for m2 in self.m2.clone() {
				for n in self.n.clone() {
					let update_rate = ref_freq / n;
					if !(19_200..=135_000).contains(&update_rate) {
						continue;
					}
					let vco = update_rate * m1 * m2;
					if !self.vco.contains(&vco) {
						continue;
					}

					for p1 in self.p1.clone() {
						for p2 in self.p2.clone() {
							if is_reserved_p2(p2) {
								continue;
							}

							let fastclk = vco / (p1 * p2);
							let fastclk_max = if analog { 2_650_000 } else { 1_804_800 };
							if fastclk < 124_800 || fastclk > fastclk_max {
								continue;
							}

							let actual = u64::from(fastclk) * 2;
							let actual_max = if analog { 3_500_000 } else { 1_804_800 };
							if actual < 249_600 || actual > actual_max {
								continue;
							}

							let mut error = actual.abs_diff(data_rate);
							if error > 9000 {
								continue;
							}
							let error_mod = error;

							let factor = if data_rate >= 1_290_000 {
								u64::from(gcd(error as u32, actual as u32))
							} else {
								1
							};
							error /= factor;
							let reduced_rate = data_rate / factor;
							if error > 4294 {
								continue;
							}

							let error = 1_000_000 * error / reduced_rate;
							if error > u64::from(TARGET_ERROR) {
								continue;
							}

							if error < min_error {
								best = Some((m1, m2, n, p1, p2, error));
								freq_error_min = error;
								least_error_mod = error_mod;
								min_error = error;
							} else if error == freq_error_min && error_mod <= least_error_mod {
								// Later candidates with an equal or smaller unreduced error
								// replace the current one.
								best = Some((m1, m2, n, p1, p2, error));
								least_error_mod = error_mod;
								min_error = error;
							}
						}
					}
				}
			}
		}

		let Some((m1, m2, n, p1, p2, error)) = best else {
			log::error!("no VLV dividers for {} kHz", dclk);
			return Err(NotFound);
		};
		let s = solution(m1, m2, n, p1, p2, ref_freq, error as u32);
		log::debug!("VLV dividers for {} kHz at {} kHz reference: {:?}", dclk, ref_freq, s);
		Ok(s)
	}
}

/// Look up the limits for `target` and search.
pub fn solve(dclk: u32, ref_freq: u32, target: Target) -> Result<DividerSolution, NotFound> {
	limits(target, ref_freq).ok_or(NotFound)?.solve(dclk, target)
}

#[cfg(test)]
mod test {
	use super::*;
	use proptest::prelude::*;

	fn output(s: &DividerSolution, ref_freq: u32) -> u64 {
		let vco = ref_freq / s.n * s.m1 * s.m2;
		u64::from(vco / (s.p1 * s.p2)) * 2
	}

	#[test]
	fn dp_fixed_table() {
		let s = solve(RATE_270, 100_000, Target::DisplayPort).unwrap();
		assert_eq!((s.m1, s.m2, s.n, s.p1, s.p2), (2, 27, 1, 2, 2));
		assert_eq!(s.error, 0);
		assert_eq!(s.vco, 5_400_000);
		let s = solve(RATE_162, 100_000, Target::DisplayPort).unwrap();
		assert_eq!((s.m1, s.m2, s.n, s.p1, s.p2), (3, 81, 5, 3, 2));
		let s = solve(RATE_162, 27_000, Target::DisplayPort).unwrap();
		assert_eq!((s.m1, s.m2, s.n, s.p1, s.p2), (2, 90, 1, 3, 2));
		let s = solve(RATE_270, 96_000, Target::DisplayPort).unwrap();
		assert_eq!((s.m1, s.m2, s.n, s.p1, s.p2), (3, 75, 4, 2, 2));
	}

	#[test]
	fn dp_unsupported() {
		assert_eq!(solve(216_000, 100_000, Target::DisplayPort), Err(NotFound));
		assert_eq!(solve(RATE_270, 19_200, Target::DisplayPort), Err(NotFound));
	}

	#[test]
	fn no_lvds_table() {
		assert!(limits(Target::Lvds { dual_channel: false }, REF_FREQ).is_none());
		assert!(limits(Target::Hdmi, 50_000).is_none());
		assert_eq!(
			solve(65_000, REF_FREQ, Target::Lvds { dual_channel: false }),
			Err(NotFound)
		);
	}

	#[test]
	fn packing() {
		assert_eq!(pack(2, 27, 1, 2, 2), 0x1142_1a1b);
		assert_eq!(pack(3, 81, 5, 3, 2), 0x1162_5b51);
	}

	#[test]
	fn hdmi_1080p() {
		let s = solve(148_500, REF_FREQ, Target::Hdmi).unwrap();
		assert_eq!(output(&s, REF_FREQ), 1_485_000);
		assert_eq!(s.error, 0);
		assert_eq!((s.m1, s.m2, s.n, s.p1, s.p2), (3, 99, 5, 2, 4));
	}

	#[test]
	fn tie_break_prefers_last_equal_candidate() {
		// 100 MHz has several exact solutions. Each later one with equal error wins.
		let s = solve(100_000, REF_FREQ, Target::Hdmi).unwrap();
		assert_eq!(s.error, 0);
		let mut exact = Vec::new();
		let l = limits(Target::Hdmi, REF_FREQ).unwrap();
		for m1 in l.m1.clone() {
			for m2 in l.m2.clone() {
				for n in l.n.clone() {
					for p1 in l.p1.clone() {
						for p2 in l.p2.clone() {
							let c = solution(m1, m2, n, p1, p2, REF_FREQ, 0);
							if !is_reserved_p2(p2)
								&& (19_200..=135_000).contains(&(REF_FREQ / n))
								&& l.vco.contains(&c.vco)
								&& output(&c, REF_FREQ) == 1_000_000
								&& c.vco / (p1 * p2) >= 124_800
							{
								exact.push((m1, m2, n, p1, p2));
							}
						}
					}
				}
			}
		}
		assert!(exact.len() > 1);
		assert_eq!(exact.last(), Some(&(s.m1, s.m2, s.n, s.p1, s.p2)));
	}

	#[test]
	fn too_fast_for_hdmi() {
		// Output is capped at 1.8048 GHz for digital ports.
		assert_eq!(solve(300_000, REF_FREQ, Target::Hdmi), Err(NotFound));
		assert!(solve(300_000, REF_FREQ, Target::Analog).is_ok());
	}

	proptest! {
		#[test]
		fn within_tolerance(dclk in 25_000u32..=180_000, analog in any::<bool>()) {
			let target = if analog { Target::Analog } else { Target::Hdmi };
			if let Ok(s) = solve(dclk, REF_FREQ, target) {
				let l = limits(target, REF_FREQ).unwrap();
				prop_assert!(s.error <= TARGET_ERROR);
				prop_assert!(l.vco.contains(&s.vco));
				prop_assert!(!is_reserved_p2(s.p2));
				let diff = output(&s, REF_FREQ).abs_diff(u64::from(dclk) * 10);
				prop_assert!(diff <= 9000);
				prop_assert_eq!(s.packed, pack(s.m1, s.m2, s.n, s.p1, s.p2));
			}
		}
	}
}
