
use std::f64::consts;

/// With the carrier loop closed the prompt signal rides on I and the noise
/// on Q, so Q²/I² low-passed is a noise-to-signal estimate.
#[derive(Debug, Clone)]
pub struct Cn0Estimator { log_bw: f64, alpha: f64, nsr: f64 }

impl Cn0Estimator {

	pub fn new(bw:f64, cn0_0:f64, cutoff_freq:f64, loop_freq:f64) -> Self {
		let log_bw = 10.0 * bw.log10();
		let rc = 1.0 / (2.0 * consts::PI * cutoff_freq);
		let dt = 1.0 / loop_freq;
		Self {
			log_bw,
			alpha: dt / (rc + dt),
			nsr: 10f64.powf((log_bw - cn0_0) / 10.0),
		}
	}

	// Takes the prompt normalized per ms of integration; returns dBHz
	pub fn update(&mut self, i:f64, q:f64) -> f64 {
		let p_s = i * i;
		if p_s > 0.0 {
			let nsr = (q * q) / p_s;
			self.nsr += self.alpha * (nsr - self.nsr);
		}
		self.log_bw - 10.0 * self.nsr.log10()
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use rand_distr::{Distribution, Normal};

	#[test]
	fn first_update_stays_near_the_seed() {
		let mut est = Cn0Estimator::new(50.0, 40.0, 5.0, 50.0);
		let cn0 = est.update(1000.0, 30.0);
		assert!((cn0 - 40.0).abs() < 5.0);
	}

	#[test]
	fn zero_inphase_keeps_the_previous_ratio() {
		let mut est = Cn0Estimator::new(50.0, 40.0, 5.0, 50.0);
		let before = est.update(1000.0, 30.0);
		let after = est.update(0.0, 500.0);
		assert!((before - after).abs() < 1e-12);
	}

	#[test]
	fn stronger_signal_estimates_higher() {
		let mut rng = StdRng::seed_from_u64(1);
		let noise = Normal::new(0.0, 30.0).unwrap();

		let mut strong = Cn0Estimator::new(50.0, 35.0, 5.0, 50.0);
		let mut weak = Cn0Estimator::new(50.0, 35.0, 5.0, 50.0);
		let mut cn0_strong = 0.0;
		let mut cn0_weak = 0.0;
		for _ in 0..200 {
			cn0_strong = strong.update(3000.0 + noise.sample(&mut rng), noise.sample(&mut rng));
			cn0_weak = weak.update(100.0 + noise.sample(&mut rng), noise.sample(&mut rng));
		}
		assert!(cn0_strong > cn0_weak);
		assert!(cn0_strong > 35.0);
	}

}
