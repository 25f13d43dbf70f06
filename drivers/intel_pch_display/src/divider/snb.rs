//! Sandy Bridge PCH DPLL dividers.
//!
//! `M = 5 * (M1 + 2) + (M2 + 2)`, `dot = ref * M / ((N + 2) * P1 * P2)`.

use super::{DividerSolution, NotFound, Target};
use core::ops::RangeInclusive;

/// PCH reference clock.
pub const REF_FREQ: u32 = 120_000;

/// Above this dot clock non-LVDS ports switch to the fast P2 divisor.
pub const P2_DOT_LIMIT: u32 = 225_000;

pub struct Limits {
	pub dot: RangeInclusive<u32>,
	pub m: RangeInclusive<u32>,
	pub n: RangeInclusive<u32>,
	pub p1: RangeInclusive<u32>,
	pub p2_fast: u32,
	pub p2_slow: u32,
	pub lvds_p2_fast: u32,
	pub lvds_p2_slow: u32,
	pub vco: RangeInclusive<u32>,
	/// Register values, i.e. minus 2.
	pub m1: RangeInclusive<u32>,
	/// Register values, i.e. minus 2.
	pub m2: RangeInclusive<u32>,
	/// In parts per ten thousand.
	pub target_error: u32,
}

pub const LIMITS: Limits = Limits {
	dot: 25_000..=350_000,
	m: 79..=127,
	n: 3..=8,
	p1: 1..=8,
	p2_fast: 5,
	p2_slow: 10,
	lvds_p2_fast: 14,
	lvds_p2_slow: 14,
	vco: 1_760_000..=3_510_000,
	m1: 12..=22,
	m2: 5..=9,
	target_error: 48,
};

impl DividerSolution {
	/// 640x480@60, used when no solution exists for the requested clock.
	pub const fn snb_default() -> Self {
		Self {
			m1: 0x11,
			m2: 0x8,
			n: 0x3,
			p1: 2,
			p2: LIMITS.p2_slow,
			vco: 0,
			error: 0,
			packed: 0x2,
		}
	}
}

/// Search with the table's default error threshold.
pub fn solve(
	dclk: u32,
	ref_freq: u32,
	target: Target,
	max_fp: u32,
) -> Result<DividerSolution, NotFound> {
	LIMITS.solve(dclk, ref_freq, target, max_fp, LIMITS.target_error)
}

impl Limits {
	/// Returns the P2 divisor and the value of the P2 select bit.
	fn p2(&self, dclk: u32, target: Target, max_fp: u32) -> (u32, u32) {
		match target {
			Target::Lvds { dual_channel: true } => (self.lvds_p2_fast, 1),
			Target::Lvds {
				dual_channel: false,
			} => (self.lvds_p2_slow, 0),
			_ if dclk > max_fp => (self.p2_fast, 1),
			_ => (self.p2_slow, 0),
		}
	}

	pub fn solve(
		&self,
		dclk: u32,
		ref_freq: u32,
		target: Target,
		max_fp: u32,
		target_error: u32,
	) -> Result<DividerSolution, NotFound> {
		let (p2, p2_select) = self.p2(dclk, target, max_fp);
		let dclk_10000 = u64::from(dclk) * 10_000;

		let mut min_error = 100_000;
		let mut best = None;

		'search: for n in self.n.clone() {
			for m in self.m.clone() {
				for p1 in self.p1.clone() {
					let pdiv = p2 * p1;
					let target_vco = dclk.saturating_mul(pdiv);
					if !self.vco.contains(&target_vco) {
						continue;
					}

					let actual = u64::from(ref_freq) * u64::from(m) / u64::from(n * pdiv);
					if actual == 0 {
						continue;
					}
					let error = (10_000 - (dclk_10000 / actual) as i64).unsigned_abs();
					if error < min_error {
						best = Some((n, m, p1, target_vco));
						min_error = error;
					}
					if min_error == 0 {
						break 'search;
					}
				}
			}
		}

		let (n, m, p1, vco) = best.ok_or(NotFound)?;
		if min_error > u64::from(target_error) {
			log::debug!("no SNB dividers for {} kHz, min error {}", dclk, min_error);
			return Err(NotFound);
		}

		let Some((m1, m2)) = self.split_m(m) else {
			log::debug!("M1, M2 not found for M == {}", m);
			return Err(NotFound);
		};

		let solution = DividerSolution {
			m1,
			m2,
			n: n - 2,
			p1,
			p2,
			vco,
			error: min_error as u32,
			packed: (1 << (p1 - 1)) | (p2_select << 8),
		};
		log::debug!("SNB dividers for {} kHz: {:?}", dclk, solution);
		Ok(solution)
	}

	/// Find register values for M1 and M2 such that `5 * (M1 + 2) + (M2 + 2) == m`.
	pub fn split_m(&self, m: u32) -> Option<(u32, u32)> {
		for m1 in self.m1.start() + 2..=self.m1.end() + 2 {
			for m2 in self.m2.start() + 2..=self.m2.end() + 2 {
				if m1 * 5 + m2 == m {
					return Some((m1 - 2, m2 - 2));
				}
			}
		}
		None
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use proptest::prelude::*;

	fn reconstruct(s: &DividerSolution, ref_freq: u32) -> u64 {
		let m = 5 * (s.m1 + 2) + (s.m2 + 2);
		u64::from(ref_freq) * u64::from(m) / u64::from((s.n + 2) * s.p1 * s.p2)
	}

	#[test]
	fn full_hd_analog() {
		let s = solve(148_500, REF_FREQ, Target::Analog, 350_000).unwrap();
		assert!(s.error <= 48);
		assert_eq!(s.error, 0);
		assert_eq!((s.n, s.m1, s.m2, s.p1, s.p2), (2, 16, 7, 2, 10));
		assert_eq!(s.packed, 0x2);
		assert_eq!(reconstruct(&s, REF_FREQ), 148_500);
	}

	#[test]
	fn fast_p2_above_max_fp() {
		let s = solve(300_000, REF_FREQ, Target::Hdmi, 225_000).unwrap();
		assert_eq!(s.p2, 5);
		assert_eq!(s.packed >> 8, 1);
	}

	#[test]
	fn lvds_p2() {
		let s = solve(
			65_000,
			REF_FREQ,
			Target::Lvds {
				dual_channel: false,
			},
			P2_DOT_LIMIT,
		)
		.unwrap();
		assert_eq!(s.p2, 14);
		assert_eq!(s.packed >> 8, 0);
		let s = solve(
			130_000,
			REF_FREQ,
			Target::Lvds { dual_channel: true },
			P2_DOT_LIMIT,
		)
		.unwrap();
		assert_eq!(s.p2, 14);
		assert_eq!(s.packed >> 8, 1);
	}

	#[test]
	fn out_of_range() {
		assert_eq!(solve(0, REF_FREQ, Target::Analog, 350_000), Err(NotFound));
		assert_eq!(solve(1_000, REF_FREQ, Target::Analog, 350_000), Err(NotFound));
	}

	#[test]
	fn pixel_clock_as_reference() {
		// Only M == N * P1 * P2 is acceptable.
		let s = LIMITS
			.solve(148_500, 148_500, Target::Analog, 350_000, 0)
			.unwrap();
		assert_eq!(s.error, 0);
		assert_eq!((s.n, s.m1, s.m2, s.p1), (2, 12, 8, 2));
	}

	#[test]
	fn split_m_bounds() {
		assert_eq!(LIMITS.split_m(99), Some((16, 7)));
		// Smallest representable M is 5 * 14 + 7
		assert_eq!(LIMITS.split_m(76), None);
		assert_eq!(LIMITS.split_m(77), Some((12, 5)));
		assert_eq!(LIMITS.split_m(5 * 24 + 11), Some((22, 9)));
		assert_eq!(LIMITS.split_m(5 * 24 + 12), None);
	}

	#[test]
	fn default_mode() {
		let s = DividerSolution::snb_default();
		assert_eq!((s.m1, s.m2, s.n, s.packed), (0x11, 0x8, 0x3, 0x2));
	}

	proptest! {
		#[test]
		fn within_tolerance(dclk in 25_000u32..=350_000, hdmi in any::<bool>()) {
			let (target, max_fp) = if hdmi {
				(Target::Hdmi, 225_000)
			} else {
				(Target::Analog, 350_000)
			};
			if let Ok(s) = solve(dclk, REF_FREQ, target, max_fp) {
				prop_assert!(s.error <= LIMITS.target_error);
				prop_assert!(LIMITS.vco.contains(&s.vco));
				prop_assert_eq!(s.vco, dclk * s.p1 * s.p2);
				let actual = reconstruct(&s, REF_FREQ);
				let error = (10_000 - (u64::from(dclk) * 10_000 / actual) as i64).unsigned_abs();
				prop_assert_eq!(error, u64::from(s.error));
				prop_assert!(LIMITS.m1.contains(&s.m1));
				prop_assert!(LIMITS.m2.contains(&s.m2));
			}
		}
	}
}
