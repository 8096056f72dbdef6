
use log::error;
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::TrackingError;
use crate::constants::gps;
use crate::tracking::lock_detect::LockDetectParams;

// (coherent ms, (code bw, zeta, k, carr_to_code), (carr bw, zeta, k, fll_aid_gain))
pub const LOOP_PARAMS_MED:&str = "(20 ms, (1, 0.7, 1, 1200), (13, 0.7, 1, 5))";

// k1, k2, lp, lo
pub const LD_PARAMS:&str = "0.0247, 1.5, 50, 240";
pub const LD_PARAMS_DISABLE:&str = "0.02, 1e-6, 1, 1";

pub const CN0_EST_LPF_CUTOFF:f64 = 5.0;		// [Hz]

const LOOP_PARAMS_SHAPE:&str = r"^\s*\(\s*(\d+)\s*ms\s*,\s*\(([^)]*)\)\s*,\s*\(([^)]*)\)\s*\)\s*$";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopParams {
	pub coherent_ms: u8,
	pub code_bw: f64, pub code_zeta: f64, pub code_k: f64, pub carr_to_code: f64,
	pub carr_bw: f64, pub carr_zeta: f64, pub carr_k: f64, pub carr_fll_aid_gain: f64,
}

// Immutable snapshot consumed once at channel init; never hot-reloaded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
	pub loop_params: LoopParams,
	pub lock_detect_params: LockDetectParams,
	pub cn0_use_thres: f64,
	pub cn0_drop_thres: f64,
	pub use_alias_detection: bool,
}

impl Default for TrackingConfig {
	fn default() -> Self { L2cmTrackSettings::default().snapshot() }
}

fn bad(setting:&'static str, reason:&'static str) -> TrackingError {
	TrackingError::ConfigParse{ setting, reason }
}

fn parse_float(val:&str, setting:&'static str) -> Result<f64, TrackingError> {
	val.trim().parse::<f64>().map_err(|_| bad(setting, "expected a number"))
}

fn parse_bool(val:&str, setting:&'static str) -> Result<bool, TrackingError> {
	match val.trim() {
		"true" | "1" => Ok(true),
		"false" | "0" => Ok(false),
		_ => Err(bad(setting, "expected a boolean")),
	}
}

fn parse_four(group:&str, setting:&'static str) -> Result<[f64; 4], TrackingError> {
	let fields:Vec<&str> = group.split(',').map(|s| s.trim()).collect();
	if fields.len() != 4 { return Err(bad(setting, "expected four comma-separated values")); }
	let mut out = [0.0; 4];
	for (i, f) in fields.iter().enumerate() {
		out[i] = f.parse::<f64>().map_err(|_| bad(setting, "expected a number"))?;
	}
	Ok(out)
}

pub fn parse_loop_params(val:&str) -> Result<LoopParams, TrackingError> {
	let shape = Regex::new(LOOP_PARAMS_SHAPE).expect("loop params pattern");
	let caps = shape.captures(val)
		.ok_or(bad("loop_params", "expected (N ms, (bw, zeta, k, carr_to_code), (bw, zeta, k, fll_aid))"))?;

	let coherent_ms = caps[1].parse::<u8>().map_err(|_| bad("loop_params", "coherent length out of range"))?;
	let code = parse_four(&caps[2], "loop_params")?;
	let carr = parse_four(&caps[3], "loop_params")?;

	if coherent_ms != gps::L2C_COHERENT_INTEGRATION_TIME_MS {
		return Err(bad("loop_params", "coherent integration length must be 20 ms"));
	}

	Ok(LoopParams {
		coherent_ms,
		code_bw: code[0], code_zeta: code[1], code_k: code[2], carr_to_code: code[3],
		carr_bw: carr[0], carr_zeta: carr[1], carr_k: carr[2], carr_fll_aid_gain: carr[3],
	})
}

pub fn parse_lock_detect_params(val:&str) -> Result<LockDetectParams, TrackingError> {
	let fields:Vec<&str> = val.split(',').map(|s| s.trim()).collect();
	if fields.len() != 4 { return Err(bad("lock_detect_params", "expected k1, k2, lp, lo")); }
	let k1 = parse_float(fields[0], "lock_detect_params")?;
	let k2 = parse_float(fields[1], "lock_detect_params")?;
	let lp = fields[2].parse::<u16>().map_err(|_| bad("lock_detect_params", "expected an integer count"))?;
	let lo = fields[3].parse::<u16>().map_err(|_| bad("lock_detect_params", "expected an integer count"))?;
	Ok(LockDetectParams{ k1, k2, lp, lo })
}

// Backing storage for a string setting; always NUL-terminated in the buffer
#[derive(Debug, Clone)]
pub struct SettingString<const N:usize> {
	buf: [u8; N],
}

impl<const N:usize> SettingString<N> {

	pub fn new(initial:&str) -> Self {
		let mut s = Self{ buf: [0u8; N] };
		s.store(initial);
		s
	}

	pub fn store(&mut self, val:&str) {
		self.buf = [0u8; N];
		let n = val.len().min(N - 1);
		self.buf[..n].copy_from_slice(&val.as_bytes()[..n]);
	}

	pub fn as_str(&self) -> &str {
		let end = self.buf.iter().position(|&b| b == 0).unwrap_or(N);
		std::str::from_utf8(&self.buf[..end]).unwrap_or("")
	}

}

pub struct L2cmTrackSettings {
	loop_params_string: SettingString<120>,
	lock_detect_params_string: SettingString<24>,
	loop_params: LoopParams,
	lock_detect_params: LockDetectParams,
	cn0_use_thres: f64,
	cn0_drop_thres: f64,
	use_alias_detection: bool,
}

impl Default for L2cmTrackSettings {
	fn default() -> Self {
		Self {
			loop_params_string: SettingString::new(LOOP_PARAMS_MED),
			lock_detect_params_string: SettingString::new(LD_PARAMS),
			loop_params: parse_loop_params(LOOP_PARAMS_MED).expect("default loop params"),
			lock_detect_params: parse_lock_detect_params(LD_PARAMS).expect("default lock detect params"),
			cn0_use_thres: 31.0,	// [dBHz]
			cn0_drop_thres: 31.0,	// [dBHz]
			use_alias_detection: true,
		}
	}
}

impl L2cmTrackSettings {

	pub fn loop_params(&self) -> LoopParams { self.loop_params }
	pub fn lock_detect_params(&self) -> LockDetectParams { self.lock_detect_params }
	pub fn loop_params_string(&self) -> &str { self.loop_params_string.as_str() }
	pub fn lock_detect_params_string(&self) -> &str { self.lock_detect_params_string.as_str() }

	// A failed parse leaves both the parsed values and the stored string untouched
	pub fn set_loop_params(&mut self, val:&str) -> Result<(), TrackingError> {
		let parsed = parse_loop_params(val).map_err(|e| { error!("{}", e); e })?;
		self.loop_params_string.store(val);
		self.loop_params = parsed;
		Ok(())
	}

	pub fn set_lock_detect_params(&mut self, val:&str) -> Result<(), TrackingError> {
		let parsed = parse_lock_detect_params(val).map_err(|e| { error!("{}", e); e })?;
		self.lock_detect_params_string.store(val);
		self.lock_detect_params = parsed;
		Ok(())
	}

	pub fn set(&mut self, name:&str, val:&str) -> Result<(), TrackingError> {
		match name {
			"loop_params" => self.set_loop_params(val),
			"lock_detect_params" => self.set_lock_detect_params(val),
			"cn0_use" => { self.cn0_use_thres = parse_float(val, "cn0_use")?; Ok(()) },
			"cn0_drop" => { self.cn0_drop_thres = parse_float(val, "cn0_drop")?; Ok(()) },
			"alias_detect" => { self.use_alias_detection = parse_bool(val, "alias_detect")?; Ok(()) },
			_ => Err(bad("l2cm_track", "unrecognized setting name")),
		}
	}

	pub fn snapshot(&self) -> TrackingConfig {
		TrackingConfig {
			loop_params: self.loop_params,
			lock_detect_params: self.lock_detect_params,
			cn0_use_thres: self.cn0_use_thres,
			cn0_drop_thres: self.cn0_drop_thres,
			use_alias_detection: self.use_alias_detection,
		}
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn canonical_loop_params_parse() {
		let l = parse_loop_params("(20 ms, (1, 0.7, 1, 1200), (13, 0.7, 1, 5))").unwrap();
		assert_eq!(l.coherent_ms, 20);
		assert!((l.code_bw - 1.0).abs() < 1e-12);
		assert!((l.code_zeta - 0.7).abs() < 1e-12);
		assert!((l.code_k - 1.0).abs() < 1e-12);
		assert!((l.carr_to_code - 1200.0).abs() < 1e-12);
		assert!((l.carr_bw - 13.0).abs() < 1e-12);
		assert!((l.carr_zeta - 0.7).abs() < 1e-12);
		assert!((l.carr_k - 1.0).abs() < 1e-12);
		assert!((l.carr_fll_aid_gain - 5.0).abs() < 1e-12);
	}

	#[test]
	fn loose_whitespace_is_tolerated() {
		assert!(parse_loop_params("( 20 ms , ( 1 , 0.7 , 1 , 1200 ) , ( 13 , 0.7 , 1 , 5 ) )").is_ok());
	}

	#[test]
	fn wrong_coherent_length_is_rejected_and_prior_value_kept() {
		let mut settings = L2cmTrackSettings::default();
		let before = settings.loop_params();
		let result = settings.set_loop_params("(10 ms, (1, 0.7, 1, 1200), (13, 0.7, 1, 5))");
		assert!(result.is_err());
		assert_eq!(settings.loop_params(), before);
		assert_eq!(settings.loop_params_string(), LOOP_PARAMS_MED);
	}

	#[test]
	fn malformed_loop_params_are_rejected() {
		assert!(parse_loop_params("garbage").is_err());
		assert!(parse_loop_params("(20 ms, (1, 0.7, 1), (13, 0.7, 1, 5))").is_err());
		assert!(parse_loop_params("(20 ms, (1, 0.7, 1, x), (13, 0.7, 1, 5))").is_err());
		assert!(parse_loop_params("(20, (1, 0.7, 1, 1200), (13, 0.7, 1, 5))").is_err());
	}

	#[test]
	fn lock_detect_params_parse() {
		let p = parse_lock_detect_params(LD_PARAMS).unwrap();
		assert!((p.k1 - 0.0247).abs() < 1e-12);
		assert!((p.k2 - 1.5).abs() < 1e-12);
		assert_eq!(p.lp, 50);
		assert_eq!(p.lo, 240);

		let disabled = parse_lock_detect_params(LD_PARAMS_DISABLE).unwrap();
		assert!((disabled.k2 - 1e-6).abs() < 1e-18);

		assert!(parse_lock_detect_params("0.0247, 1.5, 50").is_err());
		assert!(parse_lock_detect_params("0.0247, 1.5, 50, many").is_err());
	}

	#[test]
	fn failed_lock_detect_update_keeps_the_stored_string() {
		let mut settings = L2cmTrackSettings::default();
		assert!(settings.set_lock_detect_params("0.02, 1.4, nope, 1").is_err());
		assert_eq!(settings.lock_detect_params_string(), LD_PARAMS);
		assert!(settings.set_lock_detect_params("0.02, 1.4, 10, 100").is_ok());
		assert_eq!(settings.lock_detect_params_string(), "0.02, 1.4, 10, 100");
	}

	#[test]
	fn setting_string_truncates_at_capacity() {
		let s = SettingString::<8>::new("abcdefghij");
		assert_eq!(s.as_str(), "abcdefg");
		let s = SettingString::<8>::new("abc");
		assert_eq!(s.as_str(), "abc");
	}

	#[test]
	fn string_keyed_set_covers_the_settings_surface() {
		let mut settings = L2cmTrackSettings::default();
		settings.set("cn0_use", "33.5").unwrap();
		settings.set("cn0_drop", "29.0").unwrap();
		settings.set("alias_detect", "false").unwrap();

		let config = settings.snapshot();
		assert!((config.cn0_use_thres - 33.5).abs() < 1e-12);
		assert!((config.cn0_drop_thres - 29.0).abs() < 1e-12);
		assert!(!config.use_alias_detection);

		assert!(settings.set("cn0_use", "loud").is_err());
		assert!(settings.set("no_such_setting", "1").is_err());
	}

}
