
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockDetectParams {
	pub k1: f64, pub k2: f64,
	pub lp: u16, pub lo: u16,
}

#[derive(Debug, Clone)]
pub struct LockDetector {
	k1: f64, k2: f64, lp: u16, lo: u16,
	lpfi: f64, lpfq: f64,
	pcount1: u16, pcount2: u16,
	outo: bool, outp: bool,
}

impl LockDetector {

	pub fn new(params:&LockDetectParams) -> Self {
		Self {
			k1: params.k1, k2: params.k2, lp: params.lp, lo: params.lo,
			lpfi: 0.0, lpfq: 0.0,
			pcount1: 0, pcount2: 0,
			outo: false, outp: false,
		}
	}

	pub fn optimistic(&self) -> bool { self.outo }
	pub fn pessimistic(&self) -> bool { self.outp }

	pub fn update(&mut self, prompt_i:f64, prompt_q:f64, dt_ms:f64) {
		let k = self.k1 * dt_ms;
		self.lpfi += k * (prompt_i.abs() / dt_ms - self.lpfi);
		self.lpfq += k * (prompt_q.abs() / dt_ms - self.lpfq);

		if self.lpfi > self.k2 * self.lpfq {
			// Looks locked; wait before raising the pessimistic indicator
			self.outo = true;
			self.pcount2 = 0;
			if self.pcount1 > self.lp { self.outp = true; } else { self.pcount1 += 1; }
		} else {
			// Looks unlocked; wait before lowering the optimistic indicator
			self.outp = false;
			self.pcount1 = 0;
			if self.pcount2 > self.lo { self.outo = false; } else { self.pcount2 += 1; }
		}
	}

}
