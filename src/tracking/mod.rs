
use std::f64::consts;

use num_complex::Complex;
use num_traits::Zero;
use serde::{Serialize, Deserialize};

use crate::filters::{AidedPiFilter, LoopGains, PiFilter};

pub mod alias_detect;
pub mod cn0;
pub mod lock_detect;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EplCorrelations {
	pub early:  Complex<f64>,
	pub prompt: Complex<f64>,
	pub late:   Complex<f64>,
}

impl EplCorrelations {

	pub fn new() -> Self {
		Self{ early: Complex::zero(), prompt: Complex::zero(), late: Complex::zero() }
	}

	pub fn accumulate(&mut self, other:&Self) {
		self.early  += other.early;
		self.prompt += other.prompt;
		self.late   += other.late;
	}

	pub fn clear(&mut self) { *self = Self::new(); }

}

impl Default for EplCorrelations {
	fn default() -> Self { Self::new() }
}

pub fn costas_discriminator(prompt:Complex<f64>) -> f64 {
	if prompt.re == 0.0 { 0.0 } else { (prompt.im / prompt.re).atan() / (2.0 * consts::PI) }
}

pub fn frequency_discriminator(prompt:Complex<f64>, prev:Complex<f64>) -> f64 {
	let dot:f64   = prompt.re*prev.re + prompt.im*prev.im;
	let cross:f64 = prev.re*prompt.im - prompt.re*prev.im;
	cross.atan2(dot) / (2.0 * consts::PI)
}

pub fn dll_discriminator(cs:&EplCorrelations) -> f64 {
	let e:f64 = cs.early.norm();
	let l:f64 = cs.late.norm();
	if e+l == 0.0 { 0.0 } else { 0.5 * (e-l) / (e+l) }
}

/// FLL-aided PLL coupled to the code-delay loop through carr_to_code.
#[derive(Debug, Clone)]
pub struct AidedTrackingLoop {
	pub carr_freq: f64,			// [Hz]
	pub code_freq: f64,			// offset from the nominal chipping rate [chips/sec]
	pub carr_filt: AidedPiFilter,
	pub code_filt: PiFilter,
	carr_to_code: f64,
	prev_prompt: Complex<f64>,
}

impl AidedTrackingLoop {

	pub fn new(loop_freq:f64,
	           code_freq:f64, code_bw:f64, code_zeta:f64, code_k:f64, carr_to_code:f64,
	           carr_freq:f64, carr_bw:f64, carr_zeta:f64, carr_k:f64, carr_fll_aid_gain:f64) -> Self {
		let code_gains = LoopGains::from_bw_zeta_k(code_bw, code_zeta, code_k, loop_freq);
		let carr_gains = LoopGains::from_bw_zeta_k(carr_bw, carr_zeta, carr_k, loop_freq);
		Self {
			carr_freq, code_freq,
			carr_filt: AidedPiFilter::new(carr_freq, carr_gains, carr_fll_aid_gain),
			code_filt: PiFilter::new(code_freq, code_gains),
			carr_to_code,
			prev_prompt: Complex::zero(),
		}
	}

	pub fn update(&mut self, cs:&EplCorrelations) {
		// Carrier update; both discriminator outputs have units of cycles
		let phase_error = costas_discriminator(cs.prompt);
		let freq_error  = frequency_discriminator(cs.prompt, self.prev_prompt);
		self.prev_prompt = cs.prompt;

		self.carr_freq = self.carr_filt.update(phase_error, freq_error);

		// Code update, partially driven by the carrier rate
		let code_error = dll_discriminator(cs);
		self.code_freq = self.code_filt.update(-code_error);
		if self.carr_to_code > 0.0 {
			self.code_freq += self.carr_freq / self.carr_to_code;
		}
	}

}
