use crate::error::Error;
use core::{
	ptr::{self, NonNull},
	time::Duration,
};
use embedded_hal::timer::CountDown;

/// 32-bit register access to the display MMIO space.
pub trait Mmio {
	fn load(&mut self, offset: u32) -> u32;

	fn store(&mut self, offset: u32, value: u32);

	/// Read-modify-write helper.
	fn update(&mut self, offset: u32, f: impl FnOnce(u32) -> u32)
	where
		Self: Sized,
	{
		let v = self.load(offset);
		self.store(offset, f(v));
	}
}

impl<M: Mmio + ?Sized> Mmio for &mut M {
	fn load(&mut self, offset: u32) -> u32 {
		(**self).load(offset)
	}

	fn store(&mut self, offset: u32, value: u32) {
		(**self).store(offset, value)
	}
}

/// A mapped BAR 0 (GTTMMADR).
pub struct Control {
	base: NonNull<u8>,
	size: usize,
}

impl Control {
	/// Fails if `base` is not 4-byte aligned or the mapping cannot hold a register.
	///
	/// # Safety
	///
	/// `base` must point to a mapping of the device's register BAR that is at least `size`
	/// bytes large and stays valid for the lifetime of this object.
	pub unsafe fn new(base: NonNull<u8>, size: usize) -> Result<Self, Error> {
		if base.as_ptr() as usize & 3 != 0 || size < 4 {
			log::error!("bad register mapping {:p} ({:#x} bytes)", base, size);
			return Err(Error::InvalidArgument);
		}
		Ok(Self { base, size })
	}

	/// `None` for registers outside the mapping.
	fn address(&self, offset: u32) -> Option<*mut u32> {
		let offset = usize::try_from(offset).ok()?;
		if offset & 3 != 0 || offset.checked_add(4)? > self.size {
			log::error!("register {:#x} out of range", offset);
			return None;
		}
		// SAFETY: the offset is within the mapping, checked above.
		Some(unsafe { self.base.as_ptr().add(offset).cast() })
	}
}

impl Mmio for Control {
	/// Registers outside the mapping read as all ones, like an unclaimed bus cycle.
	fn load(&mut self, offset: u32) -> u32 {
		match self.address(offset) {
			// SAFETY: the address is inside the mapping and aligned.
			Some(a) => unsafe { ptr::read_volatile(a) },
			None => u32::MAX,
		}
	}

	/// Stores outside the mapping are dropped.
	fn store(&mut self, offset: u32, value: u32) {
		if let Some(a) = self.address(offset) {
			// SAFETY: see load
			unsafe { ptr::write_volatile(a, value) }
		}
	}
}

/// Poll `reg` until `reg & mask == expect` or the alarm expires.
pub fn wait_for<T>(
	control: &mut impl Mmio,
	timer: &mut T,
	timeout: Duration,
	reg: u32,
	mask: u32,
	expect: u32,
) -> Result<(), Error>
where
	T: CountDown<Time = Duration>,
{
	timer.start(timeout);
	loop {
		if control.load(reg) & mask == expect {
			return Ok(());
		}
		match timer.wait() {
			Ok(()) => return Err(Error::HardwareTimeout { register: reg }),
			Err(nb::Error::WouldBlock) => {}
			Err(nb::Error::Other(v)) => match v {},
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::sim::{SimMmio, TickTimer};

	#[test]
	fn volatile_access() {
		let mut bar = [0u32; 4];
		let base = NonNull::from(&mut bar).cast();
		// SAFETY: the array outlives the mapping and is 16 bytes large.
		let mut c = unsafe { Control::new(base, 16) }.unwrap();
		c.store(8, 0xdead_beef);
		c.update(8, |v| v & 0xffff);
		assert_eq!(c.load(8), 0xbeef);
		assert_eq!(c.load(0), 0);
		drop(c);
		assert_eq!(bar[2], 0xbeef);
	}

	#[test]
	fn out_of_range() {
		let mut bar = [0u32; 4];
		let base = NonNull::from(&mut bar).cast();
		// SAFETY: see above
		let mut c = unsafe { Control::new(base, 16) }.unwrap();
		assert_eq!(c.load(16), u32::MAX);
		assert_eq!(c.load(u32::MAX), u32::MAX);
		assert_eq!(c.load(2), u32::MAX);
		c.store(16, 1);
		c.store(14, 1);
		drop(c);
		assert_eq!(bar, [0; 4]);
	}

	#[test]
	fn bad_mapping() {
		let mut bar = [0u32; 4];
		let base = NonNull::from(&mut bar).cast::<u8>();
		// SAFETY: see above
		let unaligned = unsafe { NonNull::new_unchecked(base.as_ptr().add(1)) };
		// SAFETY: the mapping is rejected before any access.
		assert!(matches!(unsafe { Control::new(unaligned, 8) }, Err(Error::InvalidArgument)));
		// SAFETY: see above
		assert!(matches!(unsafe { Control::new(base, 3) }, Err(Error::InvalidArgument)));
	}

	#[test]
	fn wait_for_status() {
		let mut mmio = SimMmio::new();
		let mut timer = TickTimer::default();
		mmio.set(0x100, 0b10);
		assert_eq!(wait_for(&mut mmio, &mut timer, Duration::from_millis(5), 0x100, 0b11, 0b10), Ok(()));
		assert_eq!(timer.ticks, 0);
		assert_eq!(
			wait_for(&mut mmio, &mut timer, Duration::from_millis(5), 0x100, 0b11, 0b11),
			Err(Error::HardwareTimeout { register: 0x100 })
		);
		assert_eq!(timer.ticks, 6);
		assert_eq!(timer.started, [Duration::from_millis(5); 2]);
	}
}
