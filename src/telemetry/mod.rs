
use std::io::Write;

use serde::{Serialize, Deserialize};

use crate::SignalId;
use crate::tracking::EplCorrelations;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
	pub sid: SignalId,
	pub sample_count: u64,
	pub early_i: f64,  pub early_q: f64,
	pub prompt_i: f64, pub prompt_q: f64,
	pub late_i: f64,   pub late_q: f64,
}

impl CorrelationReport {

	pub fn new(sid:SignalId, sample_count:u64, cs:&EplCorrelations) -> Self {
		Self {
			sid, sample_count,
			early_i:  cs.early.re,  early_q:  cs.early.im,
			prompt_i: cs.prompt.re, prompt_q: cs.prompt.im,
			late_i:   cs.late.re,   late_q:   cs.late.im,
		}
	}

}

pub struct JsonLinesSink<W: Write> {
	dst: W,
}

impl<W: Write> JsonLinesSink<W> {

	pub fn new(dst:W) -> Self { Self{ dst } }

	pub fn publish(&mut self, report:&CorrelationReport) -> std::io::Result<()> {
		serde_json::to_writer(&mut self.dst, report)?;
		self.dst.write_all(b"\n")
	}

	pub fn into_inner(self) -> W { self.dst }

}
