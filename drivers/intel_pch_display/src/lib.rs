//! # Intel PCH display bring-up
//!
//! Clock synthesis and FDI link bring-up for Sandy Bridge (SNB) and Valleyview (VLV)
//! integrated graphics.
//!
//! Register documentation can be found at https://01.org/linuxgraphics/documentation
//! (vol3 "Display Registers" for SNB, the VLV display and DPIO chapters for VLV).
//!
//! ## Supported devices
//!
//! - HD Graphics 2000/3000 (Sandy Bridge, PCH-routed ports only)
//! - HD Graphics for Atom E3800 (Valleyview)

#![cfg_attr(not(any(feature = "std", test)), no_std)]

macro_rules! reg {
	(@INTERNAL $fn:ident $setfn:ident [$bit:literal] $ty:ty) => {
		#[allow(dead_code)]
		pub fn $fn(&self) -> $ty {
			self.0 & const { 1 << $bit } != 0
		}

		#[allow(dead_code)]
		pub fn $setfn(&mut self, enable: $ty) -> &mut Self {
			self.0 &= const { !(1 << $bit) };
			self.0 |= u32::from(enable) << $bit;
			self
		}
	};
	(@INTERNAL $fn:ident $setfn:ident [(try $high:literal:$low:literal)] $ty:ty) => {
		#[allow(dead_code)]
		pub fn $fn(&self) -> Option<$ty> {
			const MASK: u32 = (1 << ($high - $low + 1)) - 1;
			<$ty>::try_from((self.0 >> $low) & MASK).ok()
		}

		#[allow(dead_code)]
		pub fn $setfn(&mut self, value: $ty) -> &mut Self {
			const MASK: u32 = (1 << ($high - $low + 1)) - 1;
			self.0 &= const { !(MASK << $low) };
			self.0 |= ((value as u32) & MASK) << $low;
			self
		}
	};
	(@INTERNAL $fn:ident $setfn:ident [($high:literal:$low:literal)] $ty:ty) => {
		#[allow(dead_code)]
		#[track_caller]
		pub fn $fn(&self) -> $ty {
			const MASK: u32 = (1 << ($high - $low + 1)) - 1;
			use $crate::PanicFrom;
			<$ty>::panic_from((self.0 >> $low) & MASK)
		}

		#[allow(dead_code)]
		pub fn $setfn(&mut self, value: $ty) -> &mut Self {
			const MASK: u32 = (1 << ($high - $low + 1)) - 1;
			self.0 &= const { !(MASK << $low) };
			self.0 |= ((value as u32) & MASK) << $low;
			self
		}
	};
	{
		$name:ident @ $address:expr;
		$($fn:ident $setfn:ident [$param:tt] $ty:ty)*
	} => {
		reg! {
			$name
			$($fn $setfn [$param] $ty)*
		}

		impl $name {
			pub const REG: u32 = $address;
		}
	};
	{
		$name:ident
		$($fn:ident $setfn:ident [$param:tt] $ty:ty)*
	} => {
		#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
		pub struct $name(u32);

		impl $name {
			#[allow(dead_code)]
			pub fn from_raw(n: u32) -> Self {
				Self(n)
			}

			#[allow(dead_code)]
			pub fn as_raw(&self) -> u32 {
				self.0
			}

			$(reg!(@INTERNAL $fn $setfn [$param] $ty);)*
		}
	};
}

/// Per-instance register accessors. The instance type must provide `offset()`.
macro_rules! impl_reg {
	($address:literal $ty:ident $load:ident $store:ident) => {
		#[allow(dead_code)]
		pub fn $load(&self, control: &mut impl $crate::control::Mmio) -> $ty {
			$ty::from_raw(control.load($address + self.offset()))
		}

		#[allow(dead_code)]
		pub fn $store(&self, control: &mut impl $crate::control::Mmio, value: $ty) {
			control.store($address + self.offset(), value.as_raw())
		}
	};
}

/// Conversion from a masked register field that cannot fail for any value the field can hold.
trait PanicFrom<T> {
	fn panic_from(t: T) -> Self;
}

impl PanicFrom<u32> for u8 {
	#[track_caller]
	fn panic_from(t: u32) -> u8 {
		debug_assert!(t <= u32::from(u8::MAX));
		t as u8
	}
}

impl PanicFrom<u32> for u16 {
	#[track_caller]
	fn panic_from(t: u32) -> u16 {
		debug_assert!(t <= u32::from(u16::MAX));
		t as u16
	}
}

impl PanicFrom<u32> for u32 {
	fn panic_from(t: u32) -> u32 {
		t
	}
}

macro_rules! bit2enum {
	{
		$name:ident
		$($variant:ident $val:literal)*
	} => {
		#[derive(Clone, Copy, Debug, PartialEq, Eq)]
		pub enum $name {
			$($variant = $val,)*
		}

		impl $crate::PanicFrom<u32> for $name {
			#[track_caller]
			fn panic_from(value: u32) -> Self {
				match value {
					$($val => Self::$variant,)*
					_ => unreachable!(),
				}
			}
		}
	};
	{
		try $name:ident
		$($variant:ident $val:literal)*
	} => {
		#[derive(Clone, Copy, Debug, PartialEq, Eq)]
		pub enum $name {
			$($variant = $val,)*
		}

		impl TryFrom<u32> for $name {
			type Error = ();

			fn try_from(value: u32) -> Result<Self, Self::Error> {
				match value {
					$($val => Ok(Self::$variant),)*
					_ => Err(()),
				}
			}
		}
	};
}

pub mod config;
pub mod control;
pub mod divider;
pub mod dpio;
pub mod error;
pub mod fdi;
#[cfg(feature = "std")]
pub mod hal;
pub mod pipe;
pub mod pll;
pub mod port;
pub mod sequencer;
pub mod training;
pub mod transcoder;

#[cfg(test)]
mod sim;

pub use config::Config;
pub use control::{Control, Mmio};
pub use error::Error;
pub use pipe::Pipe;
pub use port::{LinkRate, Port, PortDriver, PortKind, PortType};
pub use sequencer::Display;

/// SNB silicon stepping. The FDI voltage-swing presets differ between A and B.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stepping {
	A,
	B,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
	SandyBridge { stepping: Stepping },
	Valleyview { device_id: u16, revision: u8 },
}

impl Model {
	pub fn try_from_pci_id(vendor_id: u16, device_id: u16, revision: u8) -> Option<Self> {
		Some(match (vendor_id, device_id) {
			(0x8086, 0x0102 | 0x0106 | 0x010a | 0x0112 | 0x0116 | 0x0122 | 0x0126) => {
				let stepping = if revision == 0 {
					Stepping::A
				} else {
					Stepping::B
				};
				Self::SandyBridge { stepping }
			}
			(0x8086, 0x0f30..=0x0f33) => Self::Valleyview {
				device_id,
				revision,
			},
			_ => return None,
		})
	}

	/// VLV2 A0 parts share their device ID with later steppings and need an older HDMI
	/// loop filter value.
	fn is_vlv2_a0(&self) -> bool {
		matches!(
			self,
			Self::Valleyview {
				device_id: 0x0f31,
				revision: 2
			}
		)
	}
}
