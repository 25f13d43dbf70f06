use core::fmt;

/// Failures of a mode-set step.
///
/// Link-training lock failures are not represented here: they are logged and the
/// sequence continues with a degraded link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
	/// A required parameter is missing or zero. Returned before touching any register.
	InvalidArgument,
	/// No divider combination produces the requested clock within tolerance, or the
	/// clock is outside what the port can drive.
	UnsupportedClock { clock: u32 },
	/// A status bit never reached the expected value before the alarm expired.
	HardwareTimeout { register: u32 },
	/// The port type, pixel depth or link rate has no implementation on this generation.
	UnsupportedConfiguration,
}

impl Error {
	/// Negative status code as returned to the mode-set caller. Success is 0.
	pub fn code(&self) -> i32 {
		match self {
			Self::InvalidArgument => -22,
			Self::UnsupportedClock { .. } => -34,
			Self::UnsupportedConfiguration => -95,
			Self::HardwareTimeout { .. } => -110,
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidArgument => f.write_str("invalid argument"),
			Self::UnsupportedClock { clock } => write!(f, "unsupported clock {} kHz", clock),
			Self::HardwareTimeout { register } => {
				write!(f, "timeout waiting on register {:#07x}", register)
			}
			Self::UnsupportedConfiguration => f.write_str("unsupported configuration"),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Status code for a step result, 0 on success.
pub fn status<T>(result: &Result<T, Error>) -> i32 {
	match result {
		Ok(_) => 0,
		Err(e) => e.code(),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn codes_are_negative_and_distinct() {
		let all = [
			Error::InvalidArgument,
			Error::UnsupportedClock { clock: 1 },
			Error::HardwareTimeout { register: 0xf0008 },
			Error::UnsupportedConfiguration,
		];
		for (i, a) in all.iter().enumerate() {
			assert!(a.code() < 0);
			for b in &all[i + 1..] {
				assert_ne!(a.code(), b.code());
			}
		}
		assert_eq!(status(&Ok::<(), Error>(())), 0);
		assert_eq!(status::<()>(&Err(Error::InvalidArgument)), -22);
	}
}
