use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use keyrank_config::{Combos, RankingWeights};

use crate::{
	Error, Result,
	combo::{self, Combo, GenerationLimits},
	priority::{self, ComboAnalysis, SignalScores},
	strength::{self, ProvenanceIndex, StrengthTier},
	token::{self, FieldTokens},
};

/// Discoverable metadata text of one app listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
	pub title: String,
	#[serde(default)]
	pub subtitle: String,
	#[serde(default)]
	pub keywords: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
	pub total_generated: usize,
	pub total_retained: usize,
	pub limit_reached: bool,
	pub ceiling_reached: bool,
	pub per_tier_counts: BTreeMap<StrengthTier, usize>,
	pub can_strengthen_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
	pub combos: Vec<ComboAnalysis>,
	pub summary: AnalysisSummary,
}

pub fn validate_metadata(metadata: &Metadata, limits: &Combos) -> Result<()> {
	if metadata.title.trim().is_empty() {
		return Err(Error::Validation {
			field: "title".to_string(),
			message: "must be non-empty.".to_string(),
		});
	}

	for (field, text, max) in [
		("title", Some(metadata.title.as_str()), limits.max_title_chars),
		("subtitle", Some(metadata.subtitle.as_str()), limits.max_subtitle_chars),
		("keywords", metadata.keywords.as_deref(), limits.max_keywords_chars),
	] {
		let Some(text) = text else {
			continue;
		};
		let chars = text.trim().chars().count();

		if chars > max {
			return Err(Error::Validation {
				field: field.to_string(),
				message: format!("must be at most {max} characters, got {chars}."),
			});
		}
	}

	Ok(())
}

/// Keys signals by normalized combo text. Two keys that normalize to the same text are rejected
/// rather than resolved by map order.
fn normalize_signals(
	signals: &HashMap<String, SignalScores>,
) -> Result<HashMap<String, SignalScores>> {
	let mut normalized: HashMap<String, (&str, SignalScores)> =
		HashMap::with_capacity(signals.len());

	for (phrase, scores) in signals {
		let key = token::phrase_words(phrase).join(" ");

		if let Some((previous, _)) = normalized.insert(key.clone(), (phrase.as_str(), *scores)) {
			let (first, second) = (previous.min(phrase.as_str()), previous.max(phrase.as_str()));

			return Err(Error::Validation {
				field: "signals".to_string(),
				message: format!("keys {first:?} and {second:?} both normalize to {key:?}."),
			});
		}
	}

	Ok(normalized.into_iter().map(|(key, (_, scores))| (key, scores)).collect())
}

/// Runs the full CPU pipeline: validate, tokenize, generate, classify, score, rank.
///
/// Pure: identical inputs always produce identical output.
pub fn analyze(
	metadata: &Metadata,
	extra_phrases: &[String],
	signals: &HashMap<String, SignalScores>,
	combos_cfg: &Combos,
	weights: &RankingWeights,
) -> Result<Analysis> {
	validate_metadata(metadata, combos_cfg)?;

	let tokens = FieldTokens::new(
		metadata.title.as_str(),
		metadata.subtitle.as_str(),
		metadata.keywords.as_deref(),
	);
	let generated = combo::generate(&tokens, GenerationLimits::from(combos_cfg))?;
	let index = ProvenanceIndex::new(&tokens);
	let mut seen: HashSet<String> =
		generated.combos.iter().map(|combo| combo.text().to_string()).collect();
	let mut candidates = generated.combos;

	for phrase in extra_phrases {
		let combo = Combo::from_phrase(token::phrase_words(phrase), combos_cfg.max_length)?;

		if seen.insert(combo.text().to_string()) {
			candidates.push(combo);
		}
	}

	let signals = normalize_signals(signals)?;
	let analyses: Vec<ComboAnalysis> = candidates
		.into_iter()
		.map(|combo| {
			let classification = strength::classify(combo.words(), &index);
			let combo_signals = signals.get(combo.text()).copied().unwrap_or_default();

			ComboAnalysis::new(combo, classification, combo_signals, weights)
		})
		.collect();
	let mut per_tier_counts = BTreeMap::new();
	let mut can_strengthen_count = 0;

	for analysis in &analyses {
		*per_tier_counts.entry(analysis.classification.tier).or_insert(0) += 1;

		if analysis.classification.can_strengthen {
			can_strengthen_count += 1;
		}
	}

	let ranked = priority::rank(analyses, combos_cfg.retained_limit);
	let summary = AnalysisSummary {
		total_generated: ranked.total,
		total_retained: ranked.retained.len(),
		limit_reached: ranked.limit_reached,
		ceiling_reached: generated.ceiling_reached,
		per_tier_counts,
		can_strengthen_count,
	};

	Ok(Analysis { combos: ranked.retained, summary })
}
