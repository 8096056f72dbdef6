
#[derive(Debug, Clone, Copy)]
pub struct LoopGains { pub pgain: f64, pub igain: f64 }

impl LoopGains {

	pub fn from_bw_zeta_k(bw:f64, zeta:f64, k:f64, loop_freq:f64) -> Self {
		let omega_n = (bw * 8.0 * zeta) / (4.0 * zeta * zeta + 1.0);
		Self {
			pgain: (2.0 * zeta * omega_n) / k,
			igain: (omega_n * omega_n) / (k * loop_freq),
		}
	}

}

#[derive(Debug, Clone)]
pub struct PiFilter { pub pgain: f64, pub igain: f64,
                      pub y: f64,
                      prev_error: f64 }

impl PiFilter {

	pub fn new(y0:f64, gains:LoopGains) -> Self {
		Self{ pgain: gains.pgain, igain: gains.igain, y: y0, prev_error: 0.0 }
	}

	pub fn update(&mut self, error:f64) -> f64 {
		self.y += self.pgain * (error - self.prev_error) + self.igain * error;
		self.prev_error = error;
		self.y
	}

}

#[derive(Debug, Clone)]
pub struct AidedPiFilter { pub pgain: f64, pub igain: f64, pub aiding_igain: f64,
                           pub y: f64,
                           prev_error: f64 }

impl AidedPiFilter {

	pub fn new(y0:f64, gains:LoopGains, aiding_igain:f64) -> Self {
		Self{ pgain: gains.pgain, igain: gains.igain, aiding_igain, y: y0, prev_error: 0.0 }
	}

	pub fn update(&mut self, error:f64, aiding_error:f64) -> f64 {
		self.y += self.pgain * (error - self.prev_error) + self.igain * error + self.aiding_igain * aiding_error;
		self.prev_error = error;
		self.y
	}

}
