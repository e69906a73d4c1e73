use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{KeyrankService, Result};
use keyrank_domain::{AnalysisSummary, ComboAnalysis, Metadata, SignalScores};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
	#[serde(flatten)]
	pub metadata: Metadata,
	/// Caller-chosen phrases classified alongside the generated combos.
	#[serde(default)]
	pub extra_phrases: Vec<String>,
	/// Signal scores keyed by phrase. Phrases are matched after normalization.
	#[serde(default)]
	pub signals: HashMap<String, SignalScores>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeResponse {
	pub combos: Vec<ComboAnalysis>,
	pub summary: AnalysisSummary,
}

impl KeyrankService {
	pub fn analyze(&self, req: &AnalyzeRequest) -> Result<AnalyzeResponse> {
		let analysis = keyrank_domain::analyze(
			&req.metadata,
			&req.extra_phrases,
			&req.signals,
			&self.cfg.combos,
			&self.cfg.ranking.weights,
		)?;
		let summary = analysis.summary;

		tracing::info!(
			total_generated = summary.total_generated,
			total_retained = summary.total_retained,
			limit_reached = summary.limit_reached,
			ceiling_reached = summary.ceiling_reached,
			can_strengthen_count = summary.can_strengthen_count,
			"Combo analysis finished."
		);

		Ok(AnalyzeResponse { combos: analysis.combos, summary })
	}
}
