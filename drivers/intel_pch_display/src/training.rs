//! # FDI link training
//!
//! Training runs in two phases. Both sides send pattern 1 until the receiver reports bit lock,
//! then pattern 2 until it reports symbol lock. In each phase the transmitter steps through a
//! fixed list of voltage-swing/pre-emphasis presets until lock is seen. Running out of presets
//! is not fatal: the link is brought up anyway and may show artifacts.
//!
//! The state machine is independent of the register layout. [`TrainingLink`] provides the
//! register accesses, [`FdiTrainer`] implements it for the SNB CPU-to-PCH link.

use crate::{
	config::Delays,
	control::Mmio,
	error::Error,
	fdi::{RxTraining, TxTraining},
	Pipe, Stepping,
};
use embedded_hal::blocking::delay::DelayUs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
	One,
	Two,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lock {
	/// Reported after pattern 1.
	Bit,
	/// Reported after pattern 2.
	Symbol,
}

/// Register accesses of one training link.
pub trait TrainingLink {
	/// Make the lock status bits visible in the interrupt identity register.
	fn unmask_lock_status(&mut self);

	/// Enable the transmitter sending `pattern` with the given preset.
	fn start_tx(&mut self, pattern: Pattern, preset: u8);

	/// Enable the receiver expecting `pattern`.
	fn start_rx(&mut self, pattern: Pattern);

	fn set_preset(&mut self, preset: u8);

	/// Returns whether `lock` was reported, acknowledging it if so.
	fn check_lock(&mut self, lock: Lock) -> bool;

	/// Leave training mode on both sides.
	fn enter_normal(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	Idle,
	RxWarmup,
	TxPattern1,
	RxPattern1,
	PollBitLock(usize),
	TxPattern2,
	RxPattern2,
	PollSymbolLock(usize),
	NormalTraining,
	Done,
	Failed,
}

/// The preset that achieved lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainingAttempt {
	pub index: usize,
	pub preset: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseResult {
	Locked(TrainingAttempt),
	Exhausted { attempts: usize },
}

impl PhaseResult {
	pub fn is_locked(&self) -> bool {
		matches!(self, Self::Locked(_))
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainingOutcome {
	pub bit_lock: PhaseResult,
	pub symbol_lock: PhaseResult,
}

impl TrainingOutcome {
	pub fn is_locked(&self) -> bool {
		self.bit_lock.is_locked() && self.symbol_lock.is_locked()
	}
}

pub struct LinkTrainingEngine {
	presets: &'static [u8],
	delays: Delays,
	state: State,
	bit_lock: Option<PhaseResult>,
	symbol_lock: Option<PhaseResult>,
}

impl LinkTrainingEngine {
	/// `presets` is tried in order. An empty list is rejected.
	pub fn new(presets: &'static [u8], delays: Delays) -> Result<Self, Error> {
		if presets.is_empty() {
			log::error!("no training presets");
			return Err(Error::InvalidArgument);
		}
		Ok(Self {
			presets,
			delays,
			state: State::Idle,
			bit_lock: None,
			symbol_lock: None,
		})
	}

	pub fn state(&self) -> State {
		self.state
	}

	fn outcome(&self) -> Option<TrainingOutcome> {
		Some(TrainingOutcome {
			bit_lock: self.bit_lock?,
			symbol_lock: self.symbol_lock?,
		})
	}

	/// Run one state and move to the next.
	///
	/// `NormalTraining`, `Done` and `Failed` only advance through [`Self::complete`].
	pub fn step(&mut self, link: &mut impl TrainingLink, delay: &mut impl DelayUs<u32>) -> State {
		let next = match self.state {
			State::Idle => State::RxWarmup,
			State::RxWarmup => {
				link.unmask_lock_status();
				delay.delay_us(self.delays.fdi_imr_settle);
				State::TxPattern1
			}
			State::TxPattern1 => {
				link.start_tx(Pattern::One, self.presets[0]);
				State::RxPattern1
			}
			State::RxPattern1 => {
				link.start_rx(Pattern::One);
				delay.delay_us(self.delays.fdi_rx_warmup);
				State::PollBitLock(0)
			}
			State::PollBitLock(i) => match self.poll(link, delay, Lock::Bit, i) {
				Some(r) => {
					self.bit_lock = Some(r);
					State::TxPattern2
				}
				None => State::PollBitLock(i + 1),
			},
			State::TxPattern2 => {
				link.start_tx(Pattern::Two, self.presets[0]);
				State::RxPattern2
			}
			State::RxPattern2 => {
				link.start_rx(Pattern::Two);
				delay.delay_us(self.delays.fdi_pattern2_settle);
				State::PollSymbolLock(0)
			}
			State::PollSymbolLock(i) => match self.poll(link, delay, Lock::Symbol, i) {
				Some(r) => {
					self.symbol_lock = Some(r);
					State::NormalTraining
				}
				None => State::PollSymbolLock(i + 1),
			},
			s @ (State::NormalTraining | State::Done | State::Failed) => s,
		};
		log::trace!("training {:?} -> {:?}", self.state, next);
		self.state = next;
		next
	}

	/// Try preset `i`. Returns the phase result once lock is seen or no presets are left.
	fn poll(
		&mut self,
		link: &mut impl TrainingLink,
		delay: &mut impl DelayUs<u32>,
		lock: Lock,
		i: usize,
	) -> Option<PhaseResult> {
		let preset = self.presets[i];
		link.set_preset(preset);
		delay.delay_us(self.delays.fdi_lock_poll);
		if link.check_lock(lock) {
			log::debug!("{:?} lock with preset {} ({:#04x})", lock, i, preset);
			Some(PhaseResult::Locked(TrainingAttempt { index: i, preset }))
		} else if i + 1 < self.presets.len() {
			None
		} else {
			log::error!("no {:?} lock after {} presets", lock, self.presets.len());
			Some(PhaseResult::Exhausted {
				attempts: self.presets.len(),
			})
		}
	}

	/// Run both training phases from the start, stopping before normal operation.
	pub fn train(
		&mut self,
		link: &mut impl TrainingLink,
		delay: &mut impl DelayUs<u32>,
	) -> TrainingOutcome {
		self.state = State::Idle;
		self.bit_lock = None;
		self.symbol_lock = None;
		while self.step(link, delay) != State::NormalTraining {}
		// Both phases always end with a result.
		self.outcome().unwrap_or(TrainingOutcome {
			bit_lock: PhaseResult::Exhausted { attempts: 0 },
			symbol_lock: PhaseResult::Exhausted { attempts: 0 },
		})
	}

	/// Switch the link to normal operation and wait one idle pattern.
	pub fn complete(&mut self, link: &mut impl TrainingLink, delay: &mut impl DelayUs<u32>) -> State {
		link.enter_normal();
		delay.delay_us(self.delays.fdi_idle_pattern);
		let next = match self.outcome() {
			Some(o) if o.is_locked() => State::Done,
			_ => State::Failed,
		};
		log::trace!("training {:?} -> {:?}", self.state, next);
		self.state = next;
		next
	}
}

/// Voltage-swing/pre-emphasis presets in ascending strength.
pub fn fdi_presets(stepping: Stepping) -> &'static [u8] {
	match stepping {
		// 400mV 0dB, 400mV 6dB, 600mV 3.5dB, 800mV 0dB
		Stepping::A => &[0x38, 0x02, 0x01, 0x00],
		Stepping::B => &[0x00, 0x3a, 0x39, 0x38],
	}
}

/// SNB CPU FDI transmitter to PCH FDI receiver.
pub struct FdiTrainer<'a, M> {
	pub control: &'a mut M,
	pub pipe: Pipe,
	pub lanes: u32,
}

impl<M: Mmio> TrainingLink for FdiTrainer<'_, M> {
	fn unmask_lock_status(&mut self) {
		let mut imr = self.pipe.load_fdi_rx_imr(self.control);
		imr.set_symbol_lock(false).set_bit_lock(false);
		self.pipe.store_fdi_rx_imr(self.control, imr);
	}

	fn start_tx(&mut self, pattern: Pattern, preset: u8) {
		let mut tx = self.pipe.load_fdi_tx(self.control);
		tx.set_port_width((self.lanes - 1) as u8)
			.set_voltage_emphasis(preset)
			.set_training(match pattern {
				Pattern::One => TxTraining::Pattern1,
				Pattern::Two => TxTraining::Pattern2,
			});
		if pattern == Pattern::One {
			tx.set_enable(true);
		}
		self.pipe.store_fdi_tx(self.control, tx);
	}

	fn start_rx(&mut self, pattern: Pattern) {
		let mut rx = self.pipe.load_fdi_rx(self.control);
		rx.set_training(match pattern {
			Pattern::One => RxTraining::Pattern1,
			Pattern::Two => RxTraining::Pattern2,
		});
		if pattern == Pattern::One {
			rx.set_enable(true);
		}
		self.pipe.store_fdi_rx(self.control, rx);
	}

	fn set_preset(&mut self, preset: u8) {
		let mut tx = self.pipe.load_fdi_tx(self.control);
		tx.set_voltage_emphasis(preset);
		self.pipe.store_fdi_tx(self.control, tx);
	}

	fn check_lock(&mut self, lock: Lock) -> bool {
		let iir = self.pipe.load_fdi_rx_iir(self.control);
		log::debug!("FDI_RX_IIR {:#x}", iir.as_raw());
		let locked = match lock {
			Lock::Bit => iir.bit_lock(),
			Lock::Symbol => iir.symbol_lock(),
		};
		if locked {
			// Write 1 to clear
			let mut ack = iir;
			match lock {
				Lock::Bit => ack.set_bit_lock(true),
				Lock::Symbol => ack.set_symbol_lock(true),
			};
			self.pipe.store_fdi_rx_iir(self.control, ack);
		}
		locked
	}

	fn enter_normal(&mut self) {
		let mut tx = self.pipe.load_fdi_tx(self.control);
		tx.set_training(TxTraining::None).set_enhanced_frame(true);
		self.pipe.store_fdi_tx(self.control, tx);

		let mut rx = self.pipe.load_fdi_rx(self.control);
		rx.set_training(RxTraining::Normal).set_enhanced_frame(true);
		self.pipe.store_fdi_rx(self.control, rx);
	}
}
