use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::{
	Error, Result,
	token::{Field, FieldTokens, KeywordToken},
};

pub const MIN_COMBO_LENGTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboSource {
	Generated,
	Custom,
}

/// A candidate search phrase of pairwise distinct words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combo {
	text: String,
	words: Vec<String>,
	origin_fields: BTreeSet<Field>,
	is_consecutive: BTreeMap<Field, bool>,
	source: ComboSource,
}
impl Combo {
	/// Builds a combo from metadata tokens. Tokens keep the order given here.
	pub fn from_tokens(tokens: &[&KeywordToken], max_length: usize) -> Result<Self> {
		let words: Vec<String> = tokens.iter().map(|token| token.text.clone()).collect();

		validate_words(&words, max_length)?;

		let mut positions: BTreeMap<Field, Vec<usize>> = BTreeMap::new();

		for token in tokens {
			positions.entry(token.field).or_default().push(token.position);
		}

		let origin_fields = positions.keys().copied().collect();
		let is_consecutive = positions
			.iter()
			.map(|(field, positions)| {
				(*field, positions.windows(2).all(|pair| pair[1] == pair[0] + 1))
			})
			.collect();

		Ok(Self {
			text: words.join(" "),
			words,
			origin_fields,
			is_consecutive,
			source: ComboSource::Generated,
		})
	}

	/// Builds a combo from caller-supplied words that need not occur in any field.
	pub fn from_phrase(words: Vec<String>, max_length: usize) -> Result<Self> {
		validate_words(&words, max_length)?;

		Ok(Self {
			text: words.join(" "),
			words,
			origin_fields: BTreeSet::new(),
			is_consecutive: BTreeMap::new(),
			source: ComboSource::Custom,
		})
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn words(&self) -> &[String] {
		&self.words
	}

	pub fn len(&self) -> usize {
		self.words.len()
	}

	pub fn is_empty(&self) -> bool {
		self.words.is_empty()
	}

	pub fn origin_fields(&self) -> &BTreeSet<Field> {
		&self.origin_fields
	}

	pub fn is_consecutive_in(&self, field: Field) -> Option<bool> {
		self.is_consecutive.get(&field).copied()
	}

	pub fn source(&self) -> ComboSource {
		self.source
	}
}

fn validate_words(words: &[String], max_length: usize) -> Result<()> {
	if words.len() < MIN_COMBO_LENGTH || words.len() > max_length {
		return Err(Error::MalformedCombo {
			message: format!(
				"combo must have between {MIN_COMBO_LENGTH} and {max_length} words, got {}.",
				words.len()
			),
		});
	}

	let mut seen = HashSet::with_capacity(words.len());

	for word in words {
		if word.is_empty() {
			return Err(Error::MalformedCombo { message: "combo word must be non-empty.".into() });
		}
		if !seen.insert(word.as_str()) {
			return Err(Error::MalformedCombo {
				message: format!("combo repeats the word {word:?}."),
			});
		}
	}

	Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationLimits {
	pub max_length: usize,
	pub ceiling: usize,
}
impl From<&keyrank_config::Combos> for GenerationLimits {
	fn from(cfg: &keyrank_config::Combos) -> Self {
		Self { max_length: cfg.max_length, ceiling: cfg.generation_ceiling }
	}
}

#[derive(Debug, Clone)]
pub struct Generated {
	pub combos: Vec<Combo>,
	/// Set when a further combo was available but the ceiling stopped generation.
	pub ceiling_reached: bool,
}

/// Enumerates within-field selections (contiguous or not) for every field, then cross-field
/// pairs, then title/subtitle/keywords triples. Output order is deterministic.
pub fn generate(fields: &FieldTokens, limits: GenerationLimits) -> Result<Generated> {
	let mut collector = Collector::new(limits);

	for field in Field::ALL {
		let tokens = fields.get(field);
		let max_k = limits.max_length.min(tokens.len());

		for k in MIN_COMBO_LENGTH..=max_k {
			let mut indices: Vec<usize> = (0..k).collect();

			loop {
				let selection: Vec<&KeywordToken> = indices.iter().map(|&i| &tokens[i]).collect();

				if !collector.push(&selection)? {
					return Ok(collector.finish());
				}
				if !next_combination(&mut indices, tokens.len()) {
					break;
				}
			}
		}
	}

	for (left, right) in
		[(Field::Title, Field::Subtitle), (Field::Title, Field::Keywords), (Field::Subtitle, Field::Keywords)]
	{
		for a in fields.get(left) {
			for b in fields.get(right) {
				if !collector.push(&[a, b])? {
					return Ok(collector.finish());
				}
			}
		}
	}

	if limits.max_length >= 3 {
		for a in fields.get(Field::Title) {
			for b in fields.get(Field::Subtitle) {
				for c in fields.get(Field::Keywords) {
					if !collector.push(&[a, b, c])? {
						return Ok(collector.finish());
					}
				}
			}
		}
	}

	Ok(collector.finish())
}

struct Collector {
	limits: GenerationLimits,
	seen: HashSet<String>,
	combos: Vec<Combo>,
	ceiling_reached: bool,
}
impl Collector {
	fn new(limits: GenerationLimits) -> Self {
		Self { limits, seen: HashSet::new(), combos: Vec::new(), ceiling_reached: false }
	}

	/// Returns `false` once the ceiling blocks a new combo.
	fn push(&mut self, selection: &[&KeywordToken]) -> Result<bool> {
		if has_repeated_word(selection) {
			return Ok(true);
		}

		let text = selection.iter().map(|token| token.text.as_str()).collect::<Vec<_>>().join(" ");

		if self.seen.contains(&text) {
			return Ok(true);
		}
		if self.combos.len() >= self.limits.ceiling {
			self.ceiling_reached = true;

			return Ok(false);
		}

		let combo = Combo::from_tokens(selection, self.limits.max_length)?;

		self.seen.insert(text);
		self.combos.push(combo);

		Ok(true)
	}

	fn finish(self) -> Generated {
		Generated { combos: self.combos, ceiling_reached: self.ceiling_reached }
	}
}

fn has_repeated_word(selection: &[&KeywordToken]) -> bool {
	selection
		.iter()
		.enumerate()
		.any(|(i, token)| selection[..i].iter().any(|earlier| earlier.text == token.text))
}

/// Advances `indices` to the next k-combination of `0..n` in lexicographic order.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
	let k = indices.len();
	let mut i = k;

	while i > 0 {
		i -= 1;

		if indices[i] < n - k + i {
			indices[i] += 1;

			for j in i + 1..k {
				indices[j] = indices[j - 1] + 1;
			}

			return true;
		}
	}

	false
}

#[cfg(test)]
mod tests {
	use super::*;

	fn limits(max_length: usize, ceiling: usize) -> GenerationLimits {
		GenerationLimits { max_length, ceiling }
	}

	#[test]
	fn next_combination_walks_lexicographically() {
		let mut indices = vec![0, 1];
		let mut seen = vec![indices.clone()];

		while next_combination(&mut indices, 4) {
			seen.push(indices.clone());
		}

		assert_eq!(seen, vec![
			vec![0, 1],
			vec![0, 2],
			vec![0, 3],
			vec![1, 2],
			vec![1, 3],
			vec![2, 3]
		]);
	}

	#[test]
	fn records_adjacency_without_filtering() {
		let fields = FieldTokens::new("Meditation Sleep Timer", "", None);
		let generated = generate(&fields, limits(4, 5_000)).expect("generation failed");
		let texts: Vec<_> = generated.combos.iter().map(|combo| combo.text()).collect();

		assert_eq!(texts, vec![
			"meditation sleep",
			"meditation timer",
			"sleep timer",
			"meditation sleep timer"
		]);
		assert_eq!(generated.combos[0].is_consecutive_in(Field::Title), Some(true));
		assert_eq!(generated.combos[1].is_consecutive_in(Field::Title), Some(false));
		assert!(!generated.ceiling_reached);
	}

	#[test]
	fn single_token_fields_only_contribute_cross_combos() {
		let fields = FieldTokens::new("Meditation", "Calm", Some("zen"));
		let generated = generate(&fields, limits(4, 5_000)).expect("generation failed");
		let texts: Vec<_> = generated.combos.iter().map(|combo| combo.text()).collect();

		assert_eq!(texts, vec![
			"meditation calm",
			"meditation zen",
			"calm zen",
			"meditation calm zen"
		]);
		assert_eq!(
			generated.combos[3].origin_fields().iter().copied().collect::<Vec<_>>(),
			Field::ALL.to_vec()
		);
	}

	#[test]
	fn cross_combos_skip_shared_words() {
		let fields = FieldTokens::new("Sleep Timer", "Sleep Sounds", None);
		let generated = generate(&fields, limits(4, 5_000)).expect("generation failed");

		assert!(generated.combos.iter().all(|combo| combo.text() != "sleep sleep"));
		assert_eq!(
			generated.combos.iter().filter(|combo| combo.text() == "sleep sounds").count(),
			1
		);
	}

	#[test]
	fn ceiling_stops_generation_deterministically() {
		let fields = FieldTokens::new("one two three four five six", "", None);
		let first = generate(&fields, limits(4, 7)).expect("generation failed");
		let second = generate(&fields, limits(4, 7)).expect("generation failed");

		assert_eq!(first.combos.len(), 7);
		assert!(first.ceiling_reached);
		assert_eq!(first.combos, second.combos);
	}

	#[test]
	fn phrase_combos_reject_repeats_and_bad_lengths() {
		let repeated = Combo::from_phrase(vec!["zen".into(), "zen".into()], 4);
		let short = Combo::from_phrase(vec!["zen".into()], 4);
		let long = Combo::from_phrase(
			["a1", "b2", "c3", "d4", "e5"].iter().map(|w| w.to_string()).collect(),
			4,
		);

		assert!(matches!(repeated, Err(Error::MalformedCombo { .. })));
		assert!(matches!(short, Err(Error::MalformedCombo { .. })));
		assert!(matches!(long, Err(Error::MalformedCombo { .. })));
	}
}
