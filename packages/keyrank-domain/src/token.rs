use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

const STOPWORDS: &[&str] = &[
	"a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it", "its",
	"my", "of", "on", "or", "our", "the", "this", "to", "with", "you", "your",
];

/// Metadata field a token was read from. Declaration order is the canonical field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
	Title,
	Subtitle,
	Keywords,
}
impl Field {
	pub const ALL: [Field; 3] = [Field::Title, Field::Subtitle, Field::Keywords];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Title => "title",
			Self::Subtitle => "subtitle",
			Self::Keywords => "keywords",
		}
	}

	pub(crate) fn index(self) -> usize {
		match self {
			Self::Title => 0,
			Self::Subtitle => 1,
			Self::Keywords => 2,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeywordToken {
	pub text: String,
	pub field: Field,
	/// Index in the filtered token sequence of `field`.
	pub position: usize,
}

/// Splits `text` into normalized tokens. Every non-alphanumeric character is a separator, so
/// punctuation never merges two words. Stopwords are dropped without consuming a position.
/// Repeats of an earlier word are dropped but keep their slot, so words around them never
/// become adjacent.
pub fn tokenize(text: &str, field: Field) -> Vec<KeywordToken> {
	let mut seen = HashSet::new();
	let mut tokens = Vec::new();
	let mut position = 0;

	for word in normalized_words(text) {
		if is_stopword(&word) {
			continue;
		}

		let slot = position;

		position += 1;

		if seen.insert(word.clone()) {
			tokens.push(KeywordToken { text: word, field, position: slot });
		}
	}

	tokens
}

/// Tokenizes a free-text phrase into bare words, keeping repeats so callers can reject them.
pub fn phrase_words(text: &str) -> Vec<String> {
	normalized_words(text).into_iter().filter(|word| !is_stopword(word)).collect()
}

/// Case folding runs before the split because lowercasing can emit combining marks.
fn normalized_words(text: &str) -> Vec<String> {
	let folded = text.nfkc().collect::<String>().to_lowercase();

	folded
		.split(|c: char| !c.is_alphanumeric())
		.filter(|raw| !raw.is_empty())
		.map(str::to_string)
		.collect()
}

pub fn is_stopword(word: &str) -> bool {
	STOPWORDS.binary_search(&word).is_ok()
}

/// Token sequences of the three metadata fields.
#[derive(Debug, Clone, Default)]
pub struct FieldTokens {
	fields: [Vec<KeywordToken>; 3],
}
impl FieldTokens {
	pub fn new(title: &str, subtitle: &str, keywords: Option<&str>) -> Self {
		Self {
			fields: [
				tokenize(title, Field::Title),
				tokenize(subtitle, Field::Subtitle),
				keywords.map(|text| tokenize(text, Field::Keywords)).unwrap_or_default(),
			],
		}
	}

	pub fn get(&self, field: Field) -> &[KeywordToken] {
		&self.fields[field.index()]
	}

	pub fn is_empty(&self) -> bool {
		self.fields.iter().all(Vec::is_empty)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stopword_table_is_sorted_for_binary_search() {
		let mut sorted = STOPWORDS.to_vec();

		sorted.sort_unstable();

		assert_eq!(sorted, STOPWORDS);
	}

	#[test]
	fn punctuation_separates_words() {
		let words: Vec<_> =
			tokenize("Sleep&Relax: self-care", Field::Title).into_iter().map(|t| t.text).collect();

		assert_eq!(words, vec!["sleep", "relax", "self", "care"]);
	}

	#[test]
	fn positions_skip_dropped_stopwords() {
		let tokens = tokenize("Sleep for the Kids", Field::Subtitle);

		assert_eq!(tokens.len(), 2);
		assert_eq!(tokens[1].text, "kids");
		assert_eq!(tokens[1].position, 1);
		assert_eq!(tokens[1].field, Field::Subtitle);
	}

	#[test]
	fn repeated_words_keep_first_occurrence_and_their_slot() {
		let tokens = tokenize("Zen zen ZEN garden", Field::Keywords);

		assert_eq!(tokens.len(), 2);
		assert_eq!(tokens[0].text, "zen");
		assert_eq!(tokens[0].position, 0);
		assert_eq!(tokens[1].text, "garden");
		assert_eq!(tokens[1].position, 3);
	}

	#[test]
	fn case_folding_never_leaves_separators_inside_tokens() {
		let tokens = tokenize("\u{130}stanbul Travel Guide", Field::Title);

		for token in &tokens {
			assert!(token.text.chars().all(char::is_alphanumeric), "{:?}", token.text);
			assert_eq!(phrase_words(&token.text), vec![token.text.clone()]);
		}
	}

	#[test]
	fn token_text_survives_a_second_pass() {
		let words: Vec<String> = tokenize("\u{130}stanbul Travel \u{212A}elvin", Field::Title)
			.into_iter()
			.map(|token| token.text)
			.collect();
		let joined = words.join(" ");

		assert_eq!(phrase_words(&joined), words);
	}

	#[test]
	fn full_width_text_is_normalized() {
		let tokens = tokenize("\u{FF33}leep", Field::Title);

		assert_eq!(tokens[0].text, "sleep");
	}

	#[test]
	fn empty_input_yields_no_tokens() {
		assert!(tokenize("", Field::Title).is_empty());
		assert!(tokenize(" ,;- ", Field::Title).is_empty());
	}
}
