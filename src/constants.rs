
pub mod gps {

	pub const L1_HZ:f64 = 1.57542e9;
	pub const L2_HZ:f64 = 1.2276e9;

	pub const CA_CHIPPING_RATE:f64 = 1.023e6;	// [chips/sec]

	pub const L2C_COHERENT_INTEGRATION_TIME_MS:u8 = 20;

}
