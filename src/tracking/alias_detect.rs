
use std::f64::consts;

use num_complex::Complex;

/// Half-cycle false-lock detector: accumulates the rotation between the 1 ms
/// sample opening each long integration and the average of its remainder.
#[derive(Debug, Clone)]
pub struct AliasDetector {
	acc_len: u32,
	dt: f64,
	dot: f64, cross: f64,
	fl_count: u32,
	first_i: f64, first_q: f64,
}

impl AliasDetector {

	pub fn new(acc_len:u32, dt:f64) -> Self {
		Self{ acc_len, dt, dot: 0.0, cross: 0.0, fl_count: 0, first_i: 0.0, first_q: 0.0 }
	}

	pub fn first_i(&self) -> f64 { self.first_i }
	pub fn first_q(&self) -> f64 { self.first_q }

	pub fn first(&mut self, prompt:Complex<f64>) {
		self.first_i = prompt.re;
		self.first_q = prompt.im;
	}

	// Returns the frequency error [Hz] once per full window, otherwise 0
	pub fn second(&mut self, avg:Complex<f64>) -> f64 {
		self.dot   += (self.first_i * avg.re + self.first_q * avg.im) / self.acc_len as f64;
		self.cross += (self.first_i * avg.im - avg.re * self.first_q) / self.acc_len as f64;

		self.fl_count += 1;
		if self.fl_count == self.acc_len {
			let err = self.cross.atan2(self.dot) / (2.0 * consts::PI * self.dt);
			self.fl_count = 0;
			self.dot = 0.0;
			self.cross = 0.0;
			err
		} else {
			0.0
		}
	}

	pub fn reinit(&mut self, acc_len:u32, dt:f64) {
		self.acc_len = acc_len;
		self.dt = dt;
		self.dot = 0.0;
		self.cross = 0.0;
		self.fl_count = 0;
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	fn c(re:f64, im:f64) -> Complex<f64> { Complex{ re, im } }

	#[test]
	fn silent_until_the_window_fills() {
		let mut ad = AliasDetector::new(3, 0.019);
		for _ in 0..2 {
			ad.first(c(1.0, 0.0));
			assert_eq!(ad.second(c(1.0, 0.0)), 0.0);
		}
		ad.first(c(1.0, 0.0));
		// Aligned samples, zero rotation, zero error at the window boundary
		assert!(ad.second(c(1.0, 0.0)).abs() < 1e-12);
	}

	#[test]
	fn quarter_turn_yields_the_expected_error() {
		let dt = 0.019;
		let mut ad = AliasDetector::new(2, dt);
		ad.first(c(1.0, 0.0));
		assert_eq!(ad.second(c(0.0, 1.0)), 0.0);
		ad.first(c(1.0, 0.0));
		let err = ad.second(c(0.0, 1.0));
		let expected = (consts::PI / 2.0) / (2.0 * consts::PI * dt);
		assert!((err - expected).abs() < 1e-9);
	}

	#[test]
	fn half_turn_exceeds_the_false_lock_threshold() {
		let int_ms = 20.0;
		let dt = (int_ms - 1.0) * 1e-3;
		let mut ad = AliasDetector::new(25, dt);
		let mut last = 0.0;
		for _ in 0..25 {
			ad.first(c(1.0, 0.0));
			last = ad.second(c(-1.0, 0.0));
		}
		assert!(last.abs() > 250.0 / int_ms);
		assert!((last.abs() - 1.0 / (2.0 * dt)).abs() < 1e-9);
	}

	#[test]
	fn window_state_clears_after_emission() {
		let mut ad = AliasDetector::new(1, 0.019);
		ad.first(c(1.0, 0.0));
		let first_err = ad.second(c(0.0, 1.0));
		assert!(first_err > 0.0);
		ad.first(c(1.0, 0.0));
		let second_err = ad.second(c(1.0, 0.0));
		assert!(second_err.abs() < 1e-12);
	}

}
