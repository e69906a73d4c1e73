use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use keyrank_config::RankingWeights;

use crate::{combo::Combo, strength::Classification};

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 100.0;

/// External 0-100 signals for one combo. Absent entries score zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalScores {
	pub popularity: f64,
	pub opportunity: f64,
	pub trend: f64,
	pub intent: f64,
}
impl SignalScores {
	/// Clamps every signal into 0-100. Non-finite inputs count as zero.
	pub fn clamped(self) -> Self {
		Self {
			popularity: clamp_score(self.popularity),
			opportunity: clamp_score(self.opportunity),
			trend: clamp_score(self.trend),
			intent: clamp_score(self.intent),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboAnalysis {
	#[serde(flatten)]
	pub combo: Combo,
	#[serde(flatten)]
	pub classification: Classification,
	pub tier_points: u8,
	pub signals: SignalScores,
	pub priority_score: f64,
}
impl ComboAnalysis {
	pub fn new(
		combo: Combo,
		classification: Classification,
		signals: SignalScores,
		weights: &RankingWeights,
	) -> Self {
		let signals = signals.clamped();
		let tier_points = classification.tier.points();
		let priority_score = priority_score(tier_points, &signals, weights);

		Self { combo, classification, tier_points, signals, priority_score }
	}
}

#[derive(Debug, Clone)]
pub struct Ranked {
	pub retained: Vec<ComboAnalysis>,
	pub total: usize,
	pub limit_reached: bool,
}

pub fn priority_score(strength: u8, signals: &SignalScores, weights: &RankingWeights) -> f64 {
	let raw = weights.strength * f64::from(strength)
		+ weights.popularity * signals.popularity
		+ weights.opportunity * signals.opportunity
		+ weights.trend * signals.trend
		+ weights.intent * signals.intent;

	clamp_score(raw)
}

/// Score descending, then stronger tier, then longer combo, then canonical text ascending.
pub fn cmp_priority(a: &ComboAnalysis, b: &ComboAnalysis) -> Ordering {
	b.priority_score
		.total_cmp(&a.priority_score)
		.then_with(|| a.classification.tier.cmp_strength(b.classification.tier))
		.then_with(|| b.combo.len().cmp(&a.combo.len()))
		.then_with(|| a.combo.text().cmp(b.combo.text()))
}

/// Sorts by priority and keeps at most `limit` entries. Truncation only bounds fetch volume.
pub fn rank(mut analyses: Vec<ComboAnalysis>, limit: usize) -> Ranked {
	let total = analyses.len();

	analyses.sort_by(cmp_priority);
	analyses.truncate(limit);

	Ranked { retained: analyses, total, limit_reached: total > limit }
}

fn clamp_score(value: f64) -> f64 {
	if value.is_finite() { value.clamp(SCORE_MIN, SCORE_MAX) } else { SCORE_MIN }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_weights_score_a_perfect_combo_at_one_hundred() {
		let signals =
			SignalScores { popularity: 100.0, opportunity: 100.0, trend: 100.0, intent: 100.0 };
		let score = priority_score(100, &signals, &RankingWeights::default());

		assert!((score - 100.0).abs() < 1e-9);
	}

	#[test]
	fn strength_contributes_thirty_percent() {
		let score = priority_score(70, &SignalScores::default(), &RankingWeights::default());

		assert!((score - 21.0).abs() < 1e-9);
	}

	#[test]
	fn out_of_range_signals_are_clamped() {
		let signals = SignalScores {
			popularity: 250.0,
			opportunity: -5.0,
			trend: f64::NAN,
			intent: 100.0,
		}
		.clamped();

		assert_eq!(signals.popularity, 100.0);
		assert_eq!(signals.opportunity, 0.0);
		assert_eq!(signals.trend, 0.0);
		assert_eq!(signals.intent, 100.0);
	}
}
