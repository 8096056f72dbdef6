
use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;

pub mod channel;
pub mod constants;
pub mod decode;
pub mod filters;
pub mod gps_l2cm;
pub mod settings;
pub mod telemetry;
pub mod tracking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalCode {
	GpsL1Ca,
	GpsL2Cm,
}

impl SignalCode {

	pub fn carrier_hz(&self) -> f64 { match self {
		SignalCode::GpsL1Ca => constants::gps::L1_HZ,
		SignalCode::GpsL2Cm => constants::gps::L2_HZ,
	}}

	pub fn chipping_rate(&self) -> f64 { constants::gps::CA_CHIPPING_RATE }

}

impl fmt::Display for SignalCode {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { match self {
		SignalCode::GpsL1Ca => write!(f, "L1CA"),
		SignalCode::GpsL2Cm => write!(f, "L2CM"),
	}}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId {
	pub code: SignalCode,
	pub sat: u16,
}

impl SignalId {

	pub fn new(code:SignalCode, sat:u16) -> Self { Self{ code, sat } }

}

impl fmt::Display for SignalId {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { write!(f, "{} PRN {}", self.code, self.sat) }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
	#[error("ill-formatted {setting} string: {reason}")]
	ConfigParse { setting: &'static str, reason: &'static str },
	#[error("no free channel pair for {0}")]
	ResourceExhausted(SignalId),
	#[error("{0} is not supported by the satellite")]
	CapabilityUnsupported(SignalId),
	#[error("{subsystem} init for {sid} failed")]
	SubsystemInitFailure { sid: SignalId, subsystem: &'static str },
	#[error("a pool for {0} is already registered")]
	RegistryConflict(SignalCode),
	#[error("stale channel handle (slot {index})")]
	StaleHandle { index: usize },
}
