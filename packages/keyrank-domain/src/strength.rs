use std::{cmp::Ordering, collections::BTreeSet};

use serde::Serialize;

use crate::token::{Field, FieldTokens};

/// Ranking power a marketplace is believed to grant a combo, by field provenance.
///
/// Declaration order is the precedence order: when two tiers share points, the earlier one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrengthTier {
	TitleConsecutive,
	TitleNonConsecutive,
	TitleKeywordsCross,
	TitleSubtitleCross,
	KeywordsConsecutive,
	SubtitleConsecutive,
	KeywordsSubtitleCross,
	KeywordsNonConsecutive,
	SubtitleNonConsecutive,
	ThreeWayCross,
	Missing,
}
impl StrengthTier {
	pub const ALL: [StrengthTier; 11] = [
		StrengthTier::TitleConsecutive,
		StrengthTier::TitleNonConsecutive,
		StrengthTier::TitleKeywordsCross,
		StrengthTier::TitleSubtitleCross,
		StrengthTier::KeywordsConsecutive,
		StrengthTier::SubtitleConsecutive,
		StrengthTier::KeywordsSubtitleCross,
		StrengthTier::KeywordsNonConsecutive,
		StrengthTier::SubtitleNonConsecutive,
		StrengthTier::ThreeWayCross,
		StrengthTier::Missing,
	];

	pub fn points(self) -> u8 {
		match self {
			Self::TitleConsecutive => 100,
			Self::TitleNonConsecutive => 85,
			Self::TitleKeywordsCross | Self::TitleSubtitleCross => 70,
			Self::KeywordsConsecutive | Self::SubtitleConsecutive => 50,
			Self::KeywordsSubtitleCross => 35,
			Self::KeywordsNonConsecutive | Self::SubtitleNonConsecutive => 30,
			Self::ThreeWayCross => 20,
			Self::Missing => 0,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::TitleConsecutive => "TITLE_CONSECUTIVE",
			Self::TitleNonConsecutive => "TITLE_NON_CONSECUTIVE",
			Self::TitleKeywordsCross => "TITLE_KEYWORDS_CROSS",
			Self::TitleSubtitleCross => "TITLE_SUBTITLE_CROSS",
			Self::KeywordsConsecutive => "KEYWORDS_CONSECUTIVE",
			Self::SubtitleConsecutive => "SUBTITLE_CONSECUTIVE",
			Self::KeywordsSubtitleCross => "KEYWORDS_SUBTITLE_CROSS",
			Self::KeywordsNonConsecutive => "KEYWORDS_NON_CONSECUTIVE",
			Self::SubtitleNonConsecutive => "SUBTITLE_NON_CONSECUTIVE",
			Self::ThreeWayCross => "THREE_WAY_CROSS",
			Self::Missing => "MISSING",
		}
	}

	/// Strength order: more points first, then precedence. `Ordering::Less` means stronger.
	pub fn cmp_strength(self, other: Self) -> Ordering {
		other.points().cmp(&self.points()).then_with(|| self.cmp(&other))
	}

	fn stronger_than(self, other: Self) -> bool {
		self.cmp_strength(other) == Ordering::Less
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
	pub tier: StrengthTier,
	/// Fields used by the winning provenance. Empty for MISSING.
	pub matched_fields: BTreeSet<Field>,
	pub can_strengthen: bool,
	pub suggestion: Option<String>,
}

/// Words of the three fields with their token positions, as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceIndex {
	fields: [Vec<(String, usize)>; 3],
}
impl ProvenanceIndex {
	pub fn new(tokens: &FieldTokens) -> Self {
		let positioned = |field| {
			tokens.get(field).iter().map(|token| (token.text.clone(), token.position)).collect()
		};

		Self {
			fields: [
				positioned(Field::Title),
				positioned(Field::Subtitle),
				positioned(Field::Keywords),
			],
		}
	}

	fn position(&self, field: Field, word: &str) -> Option<usize> {
		self.fields[field.index()]
			.iter()
			.find(|(candidate, _)| candidate == word)
			.map(|(_, position)| *position)
	}

	fn is_consecutive(&self, field: Field, words: &[String]) -> bool {
		let positions: Option<Vec<usize>> =
			words.iter().map(|word| self.position(field, word)).collect();

		positions.is_some_and(|positions| positions.windows(2).all(|pair| pair[1] == pair[0] + 1))
	}

	/// Copy of the index with `word` moved out of the other fields and appended to the title.
	fn with_word_in_title(&self, word: &str) -> Self {
		let mut moved = self.clone();

		for field in [Field::Subtitle, Field::Keywords] {
			moved.fields[field.index()].retain(|(candidate, _)| candidate != word);
		}

		let title = &mut moved.fields[Field::Title.index()];
		let next = title.iter().map(|(_, position)| position + 1).max().unwrap_or(0);

		title.push((word.to_string(), next));

		moved
	}
}

/// Classifies `words` against the metadata fields.
pub fn classify(words: &[String], index: &ProvenanceIndex) -> Classification {
	let (tier, matched_fields) = best_tier(words, index);

	if tier == StrengthTier::TitleConsecutive {
		return Classification { tier, matched_fields, can_strengthen: false, suggestion: None };
	}

	let mut best_move: Option<(&str, StrengthTier)> = None;

	for word in words {
		if index.position(Field::Title, word).is_some() {
			continue;
		}

		let (moved_tier, _) = best_tier(words, &index.with_word_in_title(word));
		let improves_on_best = best_move.is_none_or(|(_, best)| moved_tier.stronger_than(best));

		if moved_tier.stronger_than(tier) && improves_on_best {
			best_move = Some((word.as_str(), moved_tier));
		}
	}

	let suggestion = best_move.map(|(word, target)| {
		format!("Move {word:?} into the title to reach {} ({}).", target.as_str(), target.points())
	});

	Classification { tier, matched_fields, can_strengthen: best_move.is_some(), suggestion }
}

fn best_tier(words: &[String], index: &ProvenanceIndex) -> (StrengthTier, BTreeSet<Field>) {
	let memberships: Vec<Vec<Field>> = words
		.iter()
		.map(|word| {
			Field::ALL
				.into_iter()
				.filter(|field| index.position(*field, word).is_some())
				.collect()
		})
		.collect();

	if memberships.iter().any(Vec::is_empty) {
		return (StrengthTier::Missing, BTreeSet::new());
	}

	let mut best: Option<(StrengthTier, BTreeSet<Field>)> = None;

	for used in achievable_field_sets(&memberships) {
		let tier = tier_for(&used, words, index);

		if best.as_ref().is_none_or(|(current, _)| tier.stronger_than(*current)) {
			best = Some((tier, used));
		}
	}

	best.unwrap_or((StrengthTier::Missing, BTreeSet::new()))
}

/// Every distinct set of fields some assignment of words to containing fields can use.
fn achievable_field_sets(memberships: &[Vec<Field>]) -> Vec<BTreeSet<Field>> {
	let mut sets: Vec<BTreeSet<Field>> = vec![BTreeSet::new()];

	for options in memberships {
		let mut next = Vec::new();

		for set in &sets {
			for field in options {
				let mut extended = set.clone();

				extended.insert(*field);

				if !next.contains(&extended) {
					next.push(extended);
				}
			}
		}

		sets = next;
	}

	sets
}

fn tier_for(used: &BTreeSet<Field>, words: &[String], index: &ProvenanceIndex) -> StrengthTier {
	let has = |field| used.contains(&field);

	match (has(Field::Title), has(Field::Subtitle), has(Field::Keywords)) {
		(true, false, false) =>
			if index.is_consecutive(Field::Title, words) {
				StrengthTier::TitleConsecutive
			} else {
				StrengthTier::TitleNonConsecutive
			},
		(false, false, true) =>
			if index.is_consecutive(Field::Keywords, words) {
				StrengthTier::KeywordsConsecutive
			} else {
				StrengthTier::KeywordsNonConsecutive
			},
		(false, true, false) =>
			if index.is_consecutive(Field::Subtitle, words) {
				StrengthTier::SubtitleConsecutive
			} else {
				StrengthTier::SubtitleNonConsecutive
			},
		(true, false, true) => StrengthTier::TitleKeywordsCross,
		(true, true, false) => StrengthTier::TitleSubtitleCross,
		(false, true, true) => StrengthTier::KeywordsSubtitleCross,
		(true, true, true) => StrengthTier::ThreeWayCross,
		(false, false, false) => StrengthTier::Missing,
	}
}
