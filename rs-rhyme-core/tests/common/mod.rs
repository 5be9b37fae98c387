#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;

use rs_rhyme_core::model::{MaskTokenizer, MaskedLanguageModel};
use rs_rhyme_core::{Result, RhymeError};

pub const VOCAB: [&str; 18] = [
	"[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", ",", ".", "i", "like", "cheese", "peace", "sun", "moon",
	"we", "want", "big", "##s", "a",
];

pub const PAD: u32 = 0;
pub const MASK: u32 = 4;
pub const COMMA: u32 = 5;
pub const PERIOD: u32 = 6;
pub const I: u32 = 7;
pub const LIKE: u32 = 8;
pub const CHEESE: u32 = 9;
pub const PEACE: u32 = 10;
pub const SUN: u32 = 11;
pub const MOON: u32 = 12;
pub const A: u32 = 17;

/// Word-level tokenizer over `VOCAB`; `,` and `.` are split off words.
pub struct WordTokenizer;

impl WordTokenizer {
	fn id(token: &str) -> u32 {
		VOCAB.iter().position(|t| *t == token).unwrap_or(1) as u32
	}
}

impl MaskTokenizer for WordTokenizer {
	fn encode(&self, text: &str) -> Result<Vec<u32>> {
		let spaced = text.replace(',', " , ").replace('.', " . ");
		Ok(spaced
			.split_whitespace()
			.map(|word| Self::id(&word.to_lowercase()))
			.collect())
	}

	fn decode(&self, ids: &[u32]) -> Result<String> {
		let tokens = ids
			.iter()
			.filter(|&&id| id > MASK)
			.map(|&id| VOCAB.get(id as usize).copied().ok_or(RhymeError::Tokenizer(format!("unknown id {id}"))))
			.collect::<Result<Vec<_>>>()?;
		Ok(tokens.join(" ").replace(" ,", ",").replace(" .", "."))
	}

	fn mask_token_id(&self) -> u32 {
		MASK
	}

	fn pad_token_id(&self) -> u32 {
		PAD
	}

	fn vocab(&self) -> Vec<(String, u32)> {
		VOCAB.iter().enumerate().map(|(id, t)| (t.to_string(), id as u32)).collect()
	}

	fn vocab_size(&self) -> usize {
		VOCAB.len()
	}
}

/// Model with a strong opinion on some positions and none elsewhere.
pub struct ScriptedModel {
	favorites: HashMap<usize, u32>,
	pub calls: Cell<usize>,
}

impl ScriptedModel {
	pub fn new(favorites: &[(usize, u32)]) -> Self {
		Self {
			favorites: favorites.iter().copied().collect(),
			calls: Cell::new(0),
		}
	}
}

impl MaskedLanguageModel for ScriptedModel {
	fn predict(&self, batch: &[Vec<u32>]) -> Result<Vec<Vec<Vec<f32>>>> {
		self.calls.set(self.calls.get() + 1);
		Ok(batch
			.iter()
			.map(|row| {
				(0..row.len())
					.map(|position| {
						let mut logits = vec![0.0; VOCAB.len()];
						if let Some(&favorite) = self.favorites.get(&position) {
							logits[favorite as usize] = 30.0;
						}
						logits
					})
					.collect()
			})
			.collect())
	}
}

pub fn words(words: &[&str]) -> Vec<String> {
	words.iter().map(|w| w.to_string()).collect()
}
