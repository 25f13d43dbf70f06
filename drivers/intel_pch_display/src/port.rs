//! # Output ports
//!
//! A port is described by the rest of the display stack. Only the properties that affect
//! clock and link programming are modelled here.

use crate::{divider::Target, error::Error, Pipe};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortType {
	Analog,
	Lvds,
	/// HDMI, DVI and DisplayPort.
	Digital,
}

/// The kind of encoder driving the port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
	Hdmi,
	DisplayPort,
	HdmiExternal,
	TvOutExternal,
	Other,
}

/// VLV digital port number. The same numbers select the SDVO/HDMI or DP lanes depending on
/// the port kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortNumber {
	B,
	C,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Port {
	pub port_type: PortType,
	pub kind: PortKind,
	pub number: Option<PortNumber>,
	/// Routed through the PCH transcoder over FDI.
	pub on_pch: bool,
	/// The encoder provides its own clock, so the dividers must be exact.
	pub clock_source: bool,
	/// LVDS spread spectrum pulse phase. Only 4 to 13 is valid.
	pub ssc_pulse_phase: Option<u8>,
	pub dual_channel: bool,
}

impl Port {
	pub fn new(port_type: PortType, kind: PortKind) -> Self {
		Self {
			port_type,
			kind,
			number: None,
			on_pch: true,
			clock_source: false,
			ssc_pulse_phase: None,
			dual_channel: false,
		}
	}

	pub fn is_display_port(&self) -> bool {
		self.kind == PortKind::DisplayPort
	}

	pub fn is_hdmi(&self) -> bool {
		self.kind == PortKind::Hdmi
	}

	/// The divider table class for this port.
	pub fn target(&self) -> Target {
		match self.port_type {
			PortType::Analog => Target::Analog,
			PortType::Lvds => Target::Lvds {
				dual_channel: self.dual_channel,
			},
			PortType::Digital if self.is_display_port() => Target::DisplayPort,
			PortType::Digital => Target::Hdmi,
		}
	}

	/// Valid LVDS pulse phase, if any.
	pub(crate) fn pulse_phase(&self) -> Option<u8> {
		self.ssc_pulse_phase.filter(|p| (4..=13).contains(p))
	}
}

// DPCD MAX_LINK_RATE encoding
bit2enum! {
	try LinkRate
	R162 0x06
	R270 0x0a
}

impl LinkRate {
	/// Link symbol clock in kHz.
	pub fn khz(&self) -> u32 {
		match self {
			Self::R162 => 162_000,
			Self::R270 => 270_000,
		}
	}

	pub fn from_dpcd(value: u8) -> Option<Self> {
		Self::try_from(u32::from(value)).ok()
	}
}

/// Hooks into the encoder driver of a port.
///
/// Hooks an encoder does not need can be left at their defaults.
pub trait PortDriver {
	/// Raw DPCD MAX_LINK_RATE of the sink.
	fn max_link_rate(&mut self) -> u8 {
		0
	}

	fn pre_link_training(&mut self, _pipe: Pipe) -> Result<(), Error> {
		Ok(())
	}

	/// Train the DisplayPort main link.
	fn link_training(&mut self, _pipe: Pipe, _rate: LinkRate) -> Result<(), Error> {
		Ok(())
	}

	/// Called once the DPLL has locked.
	fn port_clock(&mut self, _pipe: Pipe, _dclk: u32) -> Result<(), Error> {
		Ok(())
	}
}

/// Driver for ports without hooks, such as analog outputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl PortDriver for NoHooks {}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn targets() {
		let mut p = Port::new(PortType::Digital, PortKind::DisplayPort);
		assert_eq!(p.target(), Target::DisplayPort);
		p.kind = PortKind::HdmiExternal;
		assert_eq!(p.target(), Target::Hdmi);
		let mut p = Port::new(PortType::Lvds, PortKind::Other);
		p.dual_channel = true;
		assert_eq!(p.target(), Target::Lvds { dual_channel: true });
	}

	#[test]
	fn dpcd_rates() {
		assert_eq!(LinkRate::from_dpcd(0x06), Some(LinkRate::R162));
		assert_eq!(LinkRate::from_dpcd(0x0a), Some(LinkRate::R270));
		assert_eq!(LinkRate::from_dpcd(0x14), None);
		assert_eq!(LinkRate::R270.khz(), 270_000);
	}

	#[test]
	fn pulse_phase_range() {
		let mut p = Port::new(PortType::Lvds, PortKind::Other);
		p.ssc_pulse_phase = Some(3);
		assert_eq!(p.pulse_phase(), None);
		p.ssc_pulse_phase = Some(13);
		assert_eq!(p.pulse_phase(), Some(13));
	}
}
