//! Host implementations of the timing traits.

use core::time::Duration;
use embedded_hal::{blocking::delay::DelayUs, timer};
use std::time::Instant;
use void::Void;

pub struct HalTimer {
	instant: Instant,
	duration: Duration,
}

impl HalTimer {
	pub fn new(duration: Duration) -> Self {
		Self {
			instant: Instant::now(),
			duration,
		}
	}
}

impl Default for HalTimer {
	fn default() -> Self {
		Self::new(Duration::ZERO)
	}
}

impl timer::CountDown for HalTimer {
	type Time = Duration;

	fn start<T: Into<Duration>>(&mut self, duration: T) {
		self.instant = Instant::now();
		self.duration = duration.into();
	}

	fn wait(&mut self) -> nb::Result<(), Void> {
		if self.instant.elapsed() < self.duration {
			std::thread::yield_now();
			Err(nb::Error::WouldBlock)
		} else {
			Ok(())
		}
	}
}

/// Busy-waiting microsecond delay.
#[derive(Default)]
pub struct HalDelay;

impl DelayUs<u32> for HalDelay {
	fn delay_us(&mut self, us: u32) {
		let end = Instant::now() + Duration::from_micros(us.into());
		while Instant::now() < end {
			core::hint::spin_loop();
		}
	}
}
