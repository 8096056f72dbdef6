
use log::info;

use crate::{SignalCode, SignalId, TrackingError};

// What the tracking side needs from the decoder channels; message
// processing itself happens upstream
pub trait DecoderChannels {
	fn available(&self, index:usize, sid:SignalId) -> bool;
	fn init(&mut self, index:usize, sid:SignalId) -> Result<(), TrackingError>;
	fn disable(&mut self, index:usize) -> Result<(), TrackingError>;
}

struct DecoderSlot {
	active: bool,
	sid: SignalId,
}

pub struct DecoderPool {
	code: SignalCode,
	slots: Vec<DecoderSlot>,
}

impl DecoderPool {

	pub fn new(code:SignalCode, capacity:usize) -> Self {
		let slots = (0..capacity).map(|_| DecoderSlot {
			active: false,
			sid: SignalId::new(code, 0),
		}).collect();
		Self{ code, slots }
	}

	pub fn code(&self) -> SignalCode { self.code }
	pub fn capacity(&self) -> usize { self.slots.len() }

}

impl DecoderChannels for DecoderPool {

	fn available(&self, index:usize, sid:SignalId) -> bool {
		match self.slots.get(index) {
			Some(slot) => !slot.active && sid.code == self.code
				&& !self.slots.iter().any(|s| s.active && s.sid == sid),
			None => false,
		}
	}

	fn init(&mut self, index:usize, sid:SignalId) -> Result<(), TrackingError> {
		if !self.available(index, sid) {
			return Err(TrackingError::SubsystemInitFailure{ sid, subsystem: "decoder channel" });
		}
		let slot = &mut self.slots[index];
		slot.active = true;
		slot.sid = sid;
		info!("{} decoding on slot {}", sid, index);
		Ok(())
	}

	fn disable(&mut self, index:usize) -> Result<(), TrackingError> {
		match self.slots.get_mut(index) {
			Some(slot) if slot.active => { slot.active = false; Ok(()) },
			_ => Err(TrackingError::StaleHandle{ index }),
		}
	}

}
