//! # Mode-set sequencing
//!
//! A mode set programs the clocks in two phases around the pipe enable done by the caller:
//!
//! - pre-pipe: link parameters, reference clocks and (SNB) the FDI PLLs, or (VLV) the DPLL
//!   and DisplayPort link training.
//! - post-pipe: (SNB, PCH ports only) FDI training, PCH DPLL, transcoder timings and the
//!   transcoder enable.
//!
//! The FDI link parameters are double buffered per pipe. The pending state only becomes live
//! once the transcoder reports enabled.

use crate::{
	config::Config,
	control::Mmio,
	error::Error,
	fdi::{self, FdiLink, FdiLinkState},
	pipe::{self, VlvPipe},
	pll,
	port::{LinkRate, Port, PortDriver},
	training::{self, FdiTrainer, LinkTrainingEngine},
	transcoder, Model, Pipe, Stepping,
};
use core::time::Duration;
use embedded_hal::{blocking::delay::DelayUs, timer::CountDown};

/// Display engine of one device.
pub struct Display<M, D, T> {
	pub control: M,
	pub delay: D,
	/// Alarm for status polling.
	pub timer: T,
	pub config: Config,
	pub(crate) model: Model,
	links: [FdiLink; 2],
}

impl<M, D, T> Display<M, D, T>
where
	M: Mmio,
	D: DelayUs<u32>,
	T: CountDown<Time = Duration>,
{
	pub fn new(control: M, delay: D, timer: T, model: Model, config: Config) -> Self {
		log::info!("display engine: {:?}", model);
		Self {
			control,
			delay,
			timer,
			config,
			model,
			links: Default::default(),
		}
	}

	pub fn model(&self) -> Model {
		self.model
	}

	pub fn link(&self, pipe: Pipe) -> &FdiLink {
		&self.links[pipe.index()]
	}

	/// Program everything that must be in place before the pipe is enabled.
	pub fn program_pre_pipe(
		&mut self,
		pipe: Pipe,
		port: &Port,
		driver: &mut impl PortDriver,
		pixel_clock: u32,
	) -> Result<(), Error> {
		if pixel_clock == 0 {
			log::error!("no pixel clock");
			return Err(Error::InvalidArgument);
		}
		match self.model {
			Model::SandyBridge { .. } => self.snb_pre_pipe(pipe, port, pixel_clock),
			Model::Valleyview { .. } => self.vlv_pre_pipe(pipe, port, driver, pixel_clock),
		}
	}

	/// Finish the mode set once the pipe runs.
	pub fn program_post_pipe(&mut self, pipe: Pipe, port: &Port, pixel_clock: u32) -> Result<(), Error> {
		if pixel_clock == 0 {
			log::error!("no pixel clock");
			return Err(Error::InvalidArgument);
		}
		match self.model {
			Model::SandyBridge { stepping } => self.snb_post_pipe(stepping, pipe, port, pixel_clock),
			Model::Valleyview { .. } => Ok(()),
		}
	}

	fn snb_pre_pipe(&mut self, pipe: Pipe, port: &Port, pixel_clock: u32) -> Result<(), Error> {
		let lanes = fdi::lanes(pixel_clock, fdi::BPP, fdi::LINK_BW);
		let state = FdiLinkState::compute(fdi::BPP, lanes, pixel_clock, fdi::LINK_BW)?;
		log::debug!("FDI {:?} pending: {:?}", pipe, state);
		self.links[pipe.index()].pending = state;

		pll::enable_reference_clock(&mut self.control, &mut self.delay, &self.config.delays);
		pipe::set_m_n(&mut self.control, pipe, &state);
		if port.on_pch {
			fdi::enable_plls(
				&mut self.control,
				&mut self.delay,
				&self.config.delays,
				pipe,
				&state,
			);
		}
		Ok(())
	}

	fn snb_post_pipe(
		&mut self,
		stepping: Stepping,
		pipe: Pipe,
		port: &Port,
		pixel_clock: u32,
	) -> Result<(), Error> {
		if !port.on_pch {
			return Ok(());
		}
		let i = pipe.index();
		let lanes = self.links[i].pending.lanes;
		if lanes == 0 {
			log::error!("pipe {:?} has no pending FDI state", pipe);
			return Err(Error::InvalidArgument);
		}

		// Reject the mode before the link is touched.
		let (s, mult) = pll::snb_dividers(port, pixel_clock, &self.config)?;
		let delays = self.config.delays;
		let mut engine = LinkTrainingEngine::new(training::fdi_presets(stepping), delays)?;

		let mut link = FdiTrainer {
			control: &mut self.control,
			pipe,
			lanes,
		};
		if !engine.train(&mut link, &mut self.delay).is_locked() {
			log::warn!("FDI {:?} not locked, continuing", pipe);
		}

		self.links[i].pending.port_mult = mult;
		pll::snb_enable_dpll(&mut self.control, &mut self.delay, &delays, pipe, port, &s);
		pll::snb_select_dpll(&mut self.control, &mut self.delay, &delays, pipe, mult);

		transcoder::copy_timings(&mut self.control, pipe);

		let mut link = FdiTrainer {
			control: &mut self.control,
			pipe,
			lanes,
		};
		engine.complete(&mut link, &mut self.delay);

		transcoder::enable(
			&mut self.control,
			&mut self.timer,
			self.config.timeouts.transcoder_enable,
			pipe,
		)?;
		if !port.is_display_port() {
			transcoder::clear_m_n(&mut self.control, pipe);
		}
		self.links[i].commit();
		log::info!("pipe {:?} running at {} kHz", pipe, pixel_clock);
		Ok(())
	}

	fn vlv_pre_pipe(
		&mut self,
		pipe: Pipe,
		port: &Port,
		driver: &mut impl PortDriver,
		pixel_clock: u32,
	) -> Result<(), Error> {
		if !port.is_display_port() {
			return self.vlv_program_clock(pipe, port, driver, pixel_clock);
		}

		let dpcd = driver.max_link_rate();
		let rate = LinkRate::from_dpcd(dpcd).ok_or_else(|| {
			log::error!("unsupported link rate {:#04x}", dpcd);
			Error::UnsupportedConfiguration
		})?;
		if let Err(e) = driver.pre_link_training(pipe) {
			log::error!("pre link training failed: {}", e);
		}

		self.vlv_program_clock(pipe, port, driver, rate.khz())?;
		let mut result = driver.link_training(pipe, rate);
		if result.is_err() && rate == LinkRate::R270 && self.config.dp_rate_fallback {
			log::warn!("link training at 2.7 GHz failed, retrying at 1.62 GHz");
			self.vlv_program_clock(pipe, port, driver, LinkRate::R162.khz())?;
			result = driver.link_training(pipe, LinkRate::R162);
		}
		if let Err(e) = result {
			log::error!("DisplayPort link training on {:?} failed: {}", pipe, e);
		}
		Ok(())
	}

	/// Turn a pipe and the clocks feeding it on or off. Does nothing if the pipe already is
	/// in the requested state.
	pub fn set_pipe_power(&mut self, pipe: Pipe, on: bool) {
		match self.model {
			Model::SandyBridge { .. } => {
				if pipe.load_config(&mut self.control).enable() == on {
					return;
				}
				if on {
					pipe::set_enable(&mut self.control, pipe, true);
				} else {
					self.snb_disable_pipe(pipe);
				}
			}
			Model::Valleyview { .. } => {
				let vp = VlvPipe(pipe);
				let mut c = vp.load_config(&mut self.control);
				if c.enable() == on {
					return;
				}
				c.set_enable(on);
				if on {
					self.vlv_set_dpll(pipe, true);
					vp.store_config(&mut self.control, c);
				} else {
					vp.store_config(&mut self.control, c);
					self.vlv_set_dpll(pipe, false);
				}
			}
		}
		log::debug!("pipe {:?} power {}", pipe, if on { "on" } else { "off" });
	}

	fn snb_disable_pipe(&mut self, pipe: Pipe) {
		let delays = self.config.delays;
		let timeouts = self.config.timeouts;
		pipe::disable(&mut self.control, &mut self.timer, timeouts.pipe_state, pipe);
		fdi::disable(&mut self.control, &mut self.delay, &delays, pipe);
		transcoder::disable(
			&mut self.control,
			&mut self.timer,
			timeouts.transcoder_disable,
			pipe,
		);
		pll::snb_disable_dpll(&mut self.control, pipe);
		fdi::disable_plls(&mut self.control, &mut self.delay, &delays, pipe);
	}
}
