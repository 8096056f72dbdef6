
use log::{info, warn};
use serde::Serialize;

use crate::{SignalCode, SignalId, TrackingError};
use crate::settings::TrackingConfig;
use crate::tracking::EplCorrelations;

// Written only by the owning update call; everyone else reads snapshots.
// The *_count fields hold the update_count at which the event last happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommonTrackingState {
	pub carrier_freq: f64,		// [Hz]
	pub code_phase_rate: f64,	// [chips/sec]
	pub code_phase_early: f64,	// [chips]
	pub carrier_phase: f64,		// [cycles]
	pub sample_count: u64,
	pub cn0: f64,				// [dBHz]
	pub tow_ms: Option<u32>,
	pub update_count: u32,		// [ms]
	pub cn0_above_drop_thres_count: u32, pub cn0_below_use_thres_count: u32,
	pub ld_opti_locked_count: u32, pub ld_pess_unlocked_count: u32,
	pub mode_change_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct CorrelationReadout {
	pub cs: EplCorrelations,
	pub sample_count: u64,
	pub code_phase_early: f64,
	pub carrier_phase: f64,
}

pub trait TrackerContext {
	fn correlations_read(&mut self) -> CorrelationReadout;
	// int_ms of zero flushes the pipeline without a parameter change
	fn retune(&mut self, carrier_freq:f64, code_phase_rate:f64, int_ms:u8);
	fn ambiguity_unknown(&mut self);
	fn tow_update(&mut self, tow_ms:Option<u32>, int_ms:u8) -> Option<u32>;
	fn bit_sync_update(&mut self, int_ms:u8, prompt_i:f64);
	fn bit_aligned(&self) -> bool;
	fn correlations_send(&mut self, cs:&EplCorrelations);
	fn timing_count(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerInit {
	pub config: TrackingConfig,
	pub sample_count: u64,
	pub code_phase: f64,		// [chips]
	pub carrier_freq: f64,		// [Hz]
	pub cn0: f64,				// [dBHz]
	pub elevation_deg: i8,
}

pub trait Tracker {
	fn init(&mut self, sid:SignalId, init:&TrackerInit, common:&mut CommonTrackingState, ctx:&mut dyn TrackerContext);
	fn update(&mut self, sid:SignalId, common:&mut CommonTrackingState, ctx:&mut dyn TrackerContext);
	fn disable(&mut self, sid:SignalId, common:&mut CommonTrackingState, ctx:&mut dyn TrackerContext);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelId {
	index: usize,
	generation: u32,
}

impl ChannelId {

	pub fn index(&self) -> usize { self.index }

}

struct TrackerSlot {
	active: bool,
	generation: u32,
	sid: SignalId,
	elevation_deg: i8,
	common: CommonTrackingState,
	tracker: Box<dyn Tracker>,
}

pub struct TrackerPool {
	code: SignalCode,
	slots: Vec<TrackerSlot>,
}

impl TrackerPool {

	pub fn new(code:SignalCode, capacity:usize, factory:impl Fn() -> Box<dyn Tracker>) -> Self {
		let slots = (0..capacity).map(|_| TrackerSlot {
			active: false,
			generation: 0,
			sid: SignalId::new(code, 0),
			elevation_deg: 0,
			common: CommonTrackingState::default(),
			tracker: factory(),
		}).collect();
		Self{ code, slots }
	}

	pub fn code(&self) -> SignalCode { self.code }
	pub fn capacity(&self) -> usize { self.slots.len() }

	pub fn available(&self, index:usize, sid:SignalId) -> bool {
		match self.slots.get(index) {
			Some(slot) => !slot.active && sid.code == self.code && !self.owns(sid),
			None => false,
		}
	}

	fn owns(&self, sid:SignalId) -> bool {
		self.slots.iter().any(|s| s.active && s.sid == sid)
	}

	fn check(&self, id:ChannelId) -> Option<&TrackerSlot> {
		self.slots.get(id.index).filter(|s| s.active && s.generation == id.generation)
	}

	fn check_mut(&mut self, id:ChannelId) -> Option<&mut TrackerSlot> {
		self.slots.get_mut(id.index).filter(|s| s.active && s.generation == id.generation)
	}

	pub fn init(&mut self, index:usize, sid:SignalId, init:&TrackerInit, ctx:&mut dyn TrackerContext) -> Result<ChannelId, TrackingError> {
		if !self.available(index, sid) {
			return Err(TrackingError::SubsystemInitFailure{ sid, subsystem: "tracker channel" });
		}

		let slot = &mut self.slots[index];
		slot.active = true;
		slot.sid = sid;
		slot.elevation_deg = init.elevation_deg;
		slot.common = CommonTrackingState {
			carrier_freq: init.carrier_freq,
			code_phase_rate: sid.code.chipping_rate() * (1.0 + init.carrier_freq / sid.code.carrier_hz()),
			code_phase_early: init.code_phase,
			sample_count: init.sample_count,
			cn0: init.cn0,
			tow_ms: None,
			..Default::default()
		};
		slot.tracker.init(sid, init, &mut slot.common, ctx);
		info!("{} tracking on slot {}", sid, index);
		Ok(ChannelId{ index, generation: slot.generation })
	}

	// No failure return; degradation only shows up in the shared-state counters
	pub fn update(&mut self, id:ChannelId, ctx:&mut dyn TrackerContext) {
		match self.check_mut(id) {
			Some(slot) => {
				let sid = slot.sid;
				slot.tracker.update(sid, &mut slot.common, ctx);
			},
			None => warn!("update on a stale channel handle (slot {})", id.index),
		}
	}

	pub fn disable(&mut self, id:ChannelId, ctx:&mut dyn TrackerContext) -> Result<(), TrackingError> {
		let slot = self.check_mut(id).ok_or(TrackingError::StaleHandle{ index: id.index })?;
		let sid = slot.sid;
		slot.tracker.disable(sid, &mut slot.common, ctx);
		slot.active = false;
		slot.generation = slot.generation.wrapping_add(1);
		info!("{} released slot {}", sid, id.index);
		Ok(())
	}

	pub fn snapshot(&self, id:ChannelId) -> Option<CommonTrackingState> { self.check(id).map(|s| s.common.clone()) }
	pub fn signal_id(&self, id:ChannelId) -> Option<SignalId> { self.check(id).map(|s| s.sid) }
	pub fn elevation_deg(&self, id:ChannelId) -> Option<i8> { self.check(id).map(|s| s.elevation_deg) }

}

#[derive(Default)]
pub struct TrackerRegistry {
	pools: Vec<TrackerPool>,
}

impl TrackerRegistry {

	pub fn new() -> Self { Self{ pools: vec![] } }

	pub fn register(&mut self, pool:TrackerPool) -> Result<(), TrackingError> {
		if self.pools.iter().any(|p| p.code() == pool.code()) {
			return Err(TrackingError::RegistryConflict(pool.code()));
		}
		self.pools.push(pool);
		Ok(())
	}

	pub fn pool(&self, code:SignalCode) -> Option<&TrackerPool> { self.pools.iter().find(|p| p.code() == code) }
	pub fn pool_mut(&mut self, code:SignalCode) -> Option<&mut TrackerPool> { self.pools.iter_mut().find(|p| p.code() == code) }

}


#[cfg(test)]
mod tests {

	use super::*;
	use super::testing::MockContext;
	use crate::constants::gps;

	struct NullTracker;

	impl Tracker for NullTracker {
		fn init(&mut self, _sid:SignalId, _init:&TrackerInit, _common:&mut CommonTrackingState, _ctx:&mut dyn TrackerContext) {}
		fn update(&mut self, _sid:SignalId, common:&mut CommonTrackingState, _ctx:&mut dyn TrackerContext) {
			common.update_count = common.update_count.wrapping_add(1);
		}
		fn disable(&mut self, _sid:SignalId, _common:&mut CommonTrackingState, _ctx:&mut dyn TrackerContext) {}
	}

	fn pool() -> TrackerPool {
		TrackerPool::new(SignalCode::GpsL2Cm, 3, || Box::new(NullTracker))
	}

	fn seed() -> TrackerInit {
		TrackerInit {
			config: TrackingConfig::default(),
			sample_count: 42,
			code_phase: 0.25,
			carrier_freq: 1200.0,
			cn0: 38.0,
			elevation_deg: 55,
		}
	}

	#[test]
	fn init_seeds_the_shared_state() {
		let mut pool = pool();
		let mut ctx = MockContext::new();
		let sid = SignalId::new(SignalCode::GpsL2Cm, 7);
		let id = pool.init(0, sid, &seed(), &mut ctx).unwrap();

		let state = pool.snapshot(id).unwrap();
		assert_eq!(state.sample_count, 42);
		assert!((state.carrier_freq - 1200.0).abs() < 1e-12);
		let expected_rate = gps::CA_CHIPPING_RATE * (1.0 + 1200.0 / gps::L2_HZ);
		assert!((state.code_phase_rate - expected_rate).abs() < 1e-9);
		assert!((state.cn0 - 38.0).abs() < 1e-12);
		assert_eq!(state.tow_ms, None);
		assert_eq!(pool.elevation_deg(id), Some(55));
		assert_eq!(pool.signal_id(id), Some(sid));
	}

	#[test]
	fn one_owner_per_signal() {
		let mut pool = pool();
		let mut ctx = MockContext::new();
		let sid = SignalId::new(SignalCode::GpsL2Cm, 7);
		pool.init(0, sid, &seed(), &mut ctx).unwrap();

		assert!(!pool.available(1, sid));
		assert!(pool.init(1, sid, &seed(), &mut ctx).is_err());
		// A different satellite is still welcome
		assert!(pool.available(1, SignalId::new(SignalCode::GpsL2Cm, 8)));
	}

	#[test]
	fn stale_handle_rejected_after_disable() {
		let mut pool = pool();
		let mut ctx = MockContext::new();
		let sid = SignalId::new(SignalCode::GpsL2Cm, 7);
		let id = pool.init(0, sid, &seed(), &mut ctx).unwrap();

		pool.disable(id, &mut ctx).unwrap();
		assert_eq!(pool.snapshot(id), None);
		assert_eq!(pool.disable(id, &mut ctx), Err(TrackingError::StaleHandle{ index: 0 }));

		// The slot comes back under a new generation; the old handle stays dead
		let id2 = pool.init(0, sid, &seed(), &mut ctx).unwrap();
		assert_ne!(id, id2);
		assert!(pool.snapshot(id2).is_some());
		assert_eq!(pool.snapshot(id), None);
	}

	#[test]
	fn update_ignores_stale_handles() {
		let mut pool = pool();
		let mut ctx = MockContext::new();
		let sid = SignalId::new(SignalCode::GpsL2Cm, 7);
		let id = pool.init(0, sid, &seed(), &mut ctx).unwrap();
		pool.update(id, &mut ctx);
		assert_eq!(pool.snapshot(id).unwrap().update_count, 1);

		pool.disable(id, &mut ctx).unwrap();
		let id2 = pool.init(0, sid, &seed(), &mut ctx).unwrap();
		pool.update(id, &mut ctx);
		assert_eq!(pool.snapshot(id2).unwrap().update_count, 0);
	}

	#[test]
	fn registry_rejects_duplicate_codes() {
		let mut registry = TrackerRegistry::new();
		registry.register(pool()).unwrap();
		assert_eq!(registry.register(pool()), Err(TrackingError::RegistryConflict(SignalCode::GpsL2Cm)));
		assert!(registry.pool(SignalCode::GpsL2Cm).is_some());
		assert!(registry.pool(SignalCode::GpsL1Ca).is_none());
	}

}
