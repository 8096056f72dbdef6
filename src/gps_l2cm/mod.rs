
use log::{debug, error, info, warn};
use num_complex::Complex;

use crate::{SignalCode, SignalId, TrackingError};
use crate::channel::{ChannelId, CommonTrackingState, Tracker, TrackerContext, TrackerInit, TrackerPool};
use crate::constants::gps;
use crate::decode::DecoderChannels;
use crate::settings::{TrackingConfig, CN0_EST_LPF_CUTOFF};
use crate::tracking::{AidedTrackingLoop, EplCorrelations};
use crate::tracking::alias_detect::AliasDetector;
use crate::tracking::cn0::Cn0Estimator;
use crate::tracking::lock_detect::LockDetector;


pub const NUM_GPS_L2CM_TRACKERS:usize = 12;

pub const L2C_ALIAS_DETECT_INTERVAL_MS:u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationCycle {
	Short,
	Long,
}

impl IntegrationCycle {

	fn next(self) -> Self { match self {
		IntegrationCycle::Short => IntegrationCycle::Long,
		IntegrationCycle::Long  => IntegrationCycle::Short,
	}}

}

// The stage fixes int_ms; switching goes through set_stage, never a live resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Initial,
	NavSynced,
}

pub struct GpsL2cmTracker {
	config: TrackingConfig,
	tl: AidedTrackingLoop,
	cs: EplCorrelations,
	cn0_est: Cn0Estimator,
	lock_detect: LockDetector,
	alias_detect: AliasDetector,
	int_ms: u8,
	cycle: IntegrationCycle,
	stage: Stage,
}

impl GpsL2cmTracker {

	pub fn new(config:TrackingConfig) -> Self {
		let l = config.loop_params;
		let int_ms = l.coherent_ms;
		let loop_freq = 1000.0 / int_ms as f64;
		Self {
			tl: AidedTrackingLoop::new(loop_freq,
				0.0, l.code_bw, l.code_zeta, l.code_k, l.carr_to_code,
				0.0, l.carr_bw, l.carr_zeta, l.carr_k, l.carr_fll_aid_gain),
			cs: EplCorrelations::new(),
			cn0_est: Cn0Estimator::new(loop_freq, 0.0, CN0_EST_LPF_CUTOFF, loop_freq),
			lock_detect: LockDetector::new(&config.lock_detect_params),
			alias_detect: AliasDetector::new(L2C_ALIAS_DETECT_INTERVAL_MS / int_ms as u32, (int_ms as f64 - 1.0) * 1e-3),
			int_ms,
			cycle: IntegrationCycle::Short,
			stage: Stage::NavSynced,
			config,
		}
	}

	pub fn carrier_freq(&self) -> f64 { self.tl.carr_freq }
	pub fn code_freq(&self) -> f64 { self.tl.code_freq }
	pub fn int_ms(&self) -> u8 { self.int_ms }
	pub fn cycle(&self) -> IntegrationCycle { self.cycle }
	pub fn stage(&self) -> Stage { self.stage }
	pub fn optimistic_lock(&self) -> bool { self.lock_detect.optimistic() }
	pub fn pessimistic_lock(&self) -> bool { self.lock_detect.pessimistic() }

	fn stage_int_ms(&self, stage:Stage) -> u8 { match stage {
		Stage::Initial => 1,
		Stage::NavSynced => self.config.loop_params.coherent_ms,
	}}

	// Rebuild the accumulator, estimator rates, and alias window for the
	// current int_ms; the cycle machine restarts on a short read
	fn rebuild(&mut self, common:&CommonTrackingState) {
		self.cycle = IntegrationCycle::Short;
		self.cs.clear();
		let loop_freq = 1000.0 / self.int_ms as f64;
		self.cn0_est = Cn0Estimator::new(loop_freq, common.cn0, CN0_EST_LPF_CUTOFF, loop_freq);
		self.alias_detect.reinit(L2C_ALIAS_DETECT_INTERVAL_MS / self.int_ms as u32, (self.int_ms as f64 - 1.0) * 1e-3);
	}

	pub fn set_stage(&mut self, stage:Stage, common:&CommonTrackingState) {
		self.stage = stage;
		self.int_ms = self.stage_int_ms(stage);
		self.rebuild(common);
	}

}

impl Default for GpsL2cmTracker {
	fn default() -> Self { Self::new(TrackingConfig::default()) }
}

impl Tracker for GpsL2cmTracker {

	fn init(&mut self, _sid:SignalId, init:&TrackerInit, common:&mut CommonTrackingState, ctx:&mut dyn TrackerContext) {
		self.config = init.config;
		ctx.ambiguity_unknown();

		// Seeded from a bit-synced L1 parent, so the channel starts at the
		// configured coherent length straight away
		let l = self.config.loop_params;
		self.stage = Stage::NavSynced;
		self.int_ms = l.coherent_ms;

		self.tl = AidedTrackingLoop::new(1000.0 / self.int_ms as f64,
			common.code_phase_rate - gps::CA_CHIPPING_RATE,
			l.code_bw, l.code_zeta, l.code_k, l.carr_to_code,
			common.carrier_freq,
			l.carr_bw, l.carr_zeta, l.carr_k, l.carr_fll_aid_gain);
		self.lock_detect = LockDetector::new(&self.config.lock_detect_params);
		self.rebuild(common);
	}

	fn update(&mut self, sid:SignalId, common:&mut CommonTrackingState, ctx:&mut dyn TrackerContext) {
		let readout = ctx.correlations_read();
		common.sample_count = readout.sample_count;
		common.code_phase_early = readout.code_phase_early;
		common.carrier_phase = readout.carrier_phase;

		let short_cycle = self.int_ms > 1 && self.cycle == IntegrationCycle::Short;

		if short_cycle {
			self.cs = readout.cs;
			self.alias_detect.first(readout.cs.prompt);
		} else if self.int_ms > 1 {
			// End of the long read: fold it into the short one to form the
			// full-interval accumulator
			self.cs.accumulate(&readout.cs);
		} else {
			self.cs = readout.cs;
		}

		let cycle_ms = if self.int_ms == 1 { 1 } else if short_cycle { 1 } else { self.int_ms - 1 };
		common.tow_ms = ctx.tow_update(common.tow_ms, cycle_ms);

		// Alternate between the short and long phases; the correlator
		// pipeline only accepts new loop parameters at the end of the long one
		if self.int_ms > 1 {
			self.cycle = self.cycle.next();
		}

		if short_cycle {
			ctx.retune(common.carrier_freq, common.code_phase_rate, 0);
			return;
		}

		common.update_count = common.update_count.wrapping_add(self.int_ms as u32);

		ctx.bit_sync_update(self.int_ms, self.cs.prompt.re);

		let norm = self.int_ms as f64;
		common.cn0 = self.cn0_est.update(self.cs.prompt.re / norm, self.cs.prompt.im / norm);
		if common.cn0 > self.config.cn0_drop_thres {
			common.cn0_above_drop_thres_count = common.update_count;
		}
		if common.cn0 < self.config.cn0_use_thres {
			// Too faint to trust the carrier phase; cycle slips are likely
			ctx.ambiguity_unknown();
			common.cn0_below_use_thres_count = common.update_count;
		}

		let last_outp = self.lock_detect.pessimistic();
		self.lock_detect.update(self.cs.prompt.re, self.cs.prompt.im, self.int_ms as f64);
		if self.lock_detect.optimistic() {
			common.ld_opti_locked_count = common.update_count;
		}
		if !self.lock_detect.pessimistic() {
			common.ld_pess_unlocked_count = common.update_count;
		}
		if last_outp && !self.lock_detect.pessimistic() {
			info!("{} PLL stress", sid);
			ctx.ambiguity_unknown();
		}

		ctx.correlations_send(&self.cs);

		self.tl.update(&self.cs);
		common.carrier_freq = self.tl.carr_freq;
		common.code_phase_rate = self.tl.code_freq + gps::CA_CHIPPING_RATE;

		// Alias detection needs at least optimistic phase lock
		if self.config.use_alias_detection && self.int_ms > 1
			&& (self.lock_detect.pessimistic() || self.lock_detect.optimistic()) {
			let rem = (self.int_ms - 1) as f64;
			let avg = Complex {
				re: (self.cs.prompt.re - self.alias_detect.first_i()) / rem,
				im: (self.cs.prompt.im - self.alias_detect.first_q()) / rem,
			};
			let err = self.alias_detect.second(avg);
			if err.abs() > 250.0 / self.int_ms as f64 {
				if self.lock_detect.pessimistic() {
					warn!("{} false phase lock detected", sid);
				}
				ctx.ambiguity_unknown();
				common.mode_change_count = common.update_count;

				// Feed the measured error straight into the carrier loop so
				// the next interval starts from the corrected frequency
				self.tl.carr_freq += err;
				self.tl.carr_filt.y = self.tl.carr_freq;
			}
		}

		if self.lock_detect.optimistic() && ctx.bit_aligned() {
			info!("{} synced @ {} ms, {:.1} dBHz", sid, common.update_count, common.cn0);
			common.mode_change_count = common.update_count;
		}

		let next_ms = if self.int_ms > 1 { self.int_ms - 1 } else { self.int_ms };
		ctx.retune(common.carrier_freq, common.code_phase_rate, next_ms);
	}

	fn disable(&mut self, sid:SignalId, _common:&mut CommonTrackingState, _ctx:&mut dyn TrackerContext) {
		debug!("{} tracker released", sid);
	}

}

pub trait SatCapabilities {
	fn l2c_capable(&self, sat:u16) -> bool;
}

// Stand-in until the capability database is wired up
pub struct AllCapable;

impl SatCapabilities for AllCapable {
	fn l2c_capable(&self, _sat:u16) -> bool { true }
}

pub struct BitmaskCapabilities(pub u32);

impl SatCapabilities for BitmaskCapabilities {
	fn l2c_capable(&self, sat:u16) -> bool {
		sat < 32 && (self.0 >> sat) & 1 == 1
	}
}

#[derive(Debug, Clone, Copy)]
pub struct HandoverSource {
	pub sat: u16,
	pub sample_count: u64,
	pub carrier_freq: f64,	// L1 Doppler [Hz]
	pub code_phase: f64,	// initial L2 CM code phase [chips]
	pub cn0: f64,			// [dBHz]
	pub elevation_deg: i8,
}

pub fn l1ca_to_l2cm_handover(
	source:&HandoverSource,
	caps:&dyn SatCapabilities,
	trackers:&mut TrackerPool,
	decoders:&mut dyn DecoderChannels,
	ctx:&mut dyn TrackerContext,
	config:&TrackingConfig,
) -> Result<ChannelId, TrackingError> {
	let sid = SignalId::new(SignalCode::GpsL2Cm, source.sat);

	if !caps.l2c_capable(source.sat) {
		info!("{} is not broadcast by the satellite", sid);
		return Err(TrackingError::CapabilityUnsupported(sid));
	}

	// A tracking slot and a decode slot must be free at the same index
	let index = match (0..trackers.capacity()).find(|&i| trackers.available(i, sid) && decoders.available(i, sid)) {
		Some(i) => i,
		None => {
			warn!("no free channel pair for {}", sid);
			return Err(TrackingError::ResourceExhausted(sid));
		},
	};

	// Doppler scales with the carrier ratio
	let carrier_freq = source.carrier_freq * gps::L2_HZ / gps::L1_HZ;
	debug!("{} handover doppler {:.1} Hz", sid, carrier_freq);

	let init = TrackerInit {
		config: *config,
		sample_count: source.sample_count,
		code_phase: source.code_phase,
		carrier_freq,
		cn0: source.cn0,
		elevation_deg: source.elevation_deg,
	};

	let id = trackers.init(index, sid, &init, ctx)
		.map_err(|e| { error!("tracker channel init for {} failed", sid); e })?;
	info!("{} handover done, tracking on slot {}", sid, index);

	if let Err(e) = decoders.init(index, sid) {
		// The tracking channel stays up; nav data just will not decode
		// until a decoder frees up
		error!("decoder channel init for {} failed: {}", sid, e);
	}

	Ok(id)
}
