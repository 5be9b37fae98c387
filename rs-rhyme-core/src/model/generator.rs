use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::token_weighter::TokenWeighter;
use super::traits::{MaskTokenizer, MaskedLanguageModel};
use crate::error::{Result, RhymeError};
use crate::text::repeated_pairs;

/// Random number generator used unless another one is given.
pub type DefaultRng = StdRng;

/// Writes rhyming second lines by repeatedly masking one token per line and
/// letting a masked language model fill it back in.
///
/// # Responsibilities
/// - Build one token line per rhyme word: seed sentence, comma, masks, rhyme word, period
/// - On every `mutate`, mask both tokens of every repeated pair, then refill the
///   last mask of each line (or a random original mask position if none is left)
/// - Refill masked positions by sampling from the model, weighted by `TokenWeighter`
///
/// # Invariants
/// - After `start`, all lines have the same length (post-padded)
/// - `position_probas[i]` is parallel to line `i` and non-zero only on the
///   positions that were masks right after `start`
/// - The seed sentence, the rhyme word and the period are never rewritten
pub struct RhymeGenerator<M, T, R = DefaultRng> {
	model: M,
	tokenizer: T,
	token_weighter: TokenWeighter,
	rng: R,

	comma_token_id: u32,
	period_token_id: u32,
	mask_token_id: u32,

	tokenized_rhymes: Option<Vec<Vec<u32>>>,
	position_probas: Vec<Vec<f32>>,
}

impl<M: MaskedLanguageModel, T: MaskTokenizer> RhymeGenerator<M, T, DefaultRng> {
	/// Creates a generator seeded from the operating system.
	pub fn new(model: M, tokenizer: T) -> Result<Self> {
		Self::with_rng(model, tokenizer, DefaultRng::from_os_rng())
	}
}

impl<M: MaskedLanguageModel, T: MaskTokenizer, R: Rng> RhymeGenerator<M, T, R> {
	/// Creates a generator drawing its randomness from `rng`.
	///
	/// # Errors
	/// Returns an error if the tokenizer cannot encode `","` or `"."`.
	pub fn with_rng(model: M, tokenizer: T, rng: R) -> Result<Self> {
		let comma_token_id = first_token(&tokenizer, ",")?;
		let period_token_id = first_token(&tokenizer, ".")?;
		let mask_token_id = tokenizer.mask_token_id();
		let token_weighter = TokenWeighter::new(&tokenizer);

		Ok(Self {
			model,
			tokenizer,
			token_weighter,
			rng,
			comma_token_id,
			period_token_id,
			mask_token_id,
			tokenized_rhymes: None,
			position_probas: Vec::new(),
		})
	}

	/// Replaces the default vocabulary weights.
	pub fn with_token_weighter(mut self, token_weighter: TokenWeighter) -> Self {
		self.token_weighter = token_weighter;
		self
	}

	/// Current token lines, if started.
	pub fn tokenized_rhymes(&self) -> Option<&[Vec<u32>]> {
		self.tokenized_rhymes.as_deref()
	}

	/// Per-line probability of each position being picked for re-masking.
	pub fn position_probas(&self) -> &[Vec<f32>] {
		&self.position_probas
	}

	/// Starts (or restarts) generation for a seed sentence and its rhyme words.
	///
	/// # Errors
	/// - `NoRhymes` if `rhyme_words` is empty
	/// - `EmptyQuery` if the sentence has no tokens
	pub fn start(&mut self, query: &str, rhyme_words: &[String]) -> Result<()> {
		info!("Got sentence {query}");
		if rhyme_words.is_empty() {
			return Err(RhymeError::NoRhymes);
		}

		let mut rows = rhyme_words
			.iter()
			.map(|rhyme_word| self.initialize_rhymes(query, rhyme_word))
			.collect::<Result<Vec<_>>>()?;

		// Make same length
		let width = rows.iter().map(Vec::len).max().unwrap_or(0);
		let pad_token_id = self.tokenizer.pad_token_id();
		for row in &mut rows {
			row.resize(width, pad_token_id);
		}

		self.position_probas = rows
			.iter()
			.map(|row| mask_probas(row, self.mask_token_id))
			.collect();
		self.tokenized_rhymes = Some(rows);
		Ok(())
	}

	/// Builds the initial token line for one rhyme word.
	///
	/// - Tokenize the seed sentence
	/// - Append a comma unless it already ends with one (ties both lines together)
	/// - Fill with masks so the second line is as long as the first
	/// - End with the rhyme word and a period
	///
	/// When the rhyme word alone is longer than the first line, no mask is added.
	pub fn initialize_rhymes(&self, query: &str, rhyme_word: &str) -> Result<Vec<u32>> {
		let mut query_token_ids = self.tokenizer.encode(query)?;
		let rhyme_word_token_ids = self.tokenizer.encode(rhyme_word)?;

		match query_token_ids.last() {
			None => return Err(RhymeError::EmptyQuery),
			Some(&last) if last != self.comma_token_id => query_token_ids.push(self.comma_token_id),
			Some(_) => (),
		}

		// +1 for the comma
		let n_masks = query_token_ids.len().saturating_sub(rhyme_word_token_ids.len() + 1);

		let mut line = query_token_ids;
		line.extend(std::iter::repeat_n(self.mask_token_id, n_masks));
		line.extend(rhyme_word_token_ids);
		line.push(self.period_token_id);
		Ok(line)
	}

	/// Mutates every line once and returns the decoded sentences.
	///
	/// # Errors
	/// - `NotStarted` if `start` was never called
	/// - model, tokenizer or sampling failures
	pub fn mutate(&mut self) -> Result<Vec<String>> {
		let mask_token_id = self.mask_token_id;
		let rows = self.tokenized_rhymes.as_mut().ok_or(RhymeError::NotStarted)?;

		let mut replacements = Vec::with_capacity(rows.len());
		for (row, probas) in rows.iter_mut().zip(&self.position_probas) {
			replacements.push(mask_token(row, probas, mask_token_id, &mut self.rng));
		}

		let predictions = self.model.predict(&rows[..])?;

		for (i, row) in rows.iter_mut().enumerate() {
			let Some(replace_ix) = replacements[i] else { continue };
			let logits = predictions
				.get(i)
				.and_then(|positions| positions.get(replace_ix))
				.ok_or_else(|| RhymeError::Model(format!("No logits for line {i}, position {replace_ix}")))?;
			row[replace_ix] = draw_replacement(logits, self.token_weighter.proba(), &mut self.rng)?;
		}

		let rhymes = rows
			.iter()
			.map(|row| self.tokenizer.decode(row))
			.collect::<Result<Vec<_>>>()?;
		info!("{rhymes:?}");
		Ok(rhymes)
	}
}

/// Returns the first token id of `text`.
fn first_token<T: MaskTokenizer + ?Sized>(tokenizer: &T, text: &str) -> Result<u32> {
	tokenizer
		.encode(text)?
		.first()
		.copied()
		.ok_or_else(|| RhymeError::Tokenizer(format!("Cannot encode {text:?}")))
}

/// Uniform probability over the mask positions of a line, `0.0` elsewhere.
fn mask_probas(row: &[u32], mask_token_id: u32) -> Vec<f32> {
	let count = row.iter().filter(|&&id| id == mask_token_id).count();
	if count == 0 {
		return vec![0.0; row.len()];
	}
	let proba = 1.0 / count as f32;
	row.iter()
		.map(|&id| if id == mask_token_id { proba } else { 0.0 })
		.collect()
}

/// Masks a line and returns the position to refill, if any.
pub(crate) fn mask_token<R: Rng>(
	row: &mut [u32],
	position_probas: &[f32],
	mask_token_id: u32,
	rng: &mut R,
) -> Option<usize> {
	mask_repeats(row, position_probas, mask_token_id);
	let ix = locate_mask(row, position_probas, mask_token_id, rng)?;
	row[ix] = mask_token_id;
	Some(ix)
}

/// Masks both tokens of every repeated pair; repeats are usually poor guesses.
///
/// Only positions that may be mutated are touched.
pub(crate) fn mask_repeats(row: &mut [u32], position_probas: &[f32], mask_token_id: u32) {
	for ii in repeated_pairs(row) {
		for ix in [ii, ii + 1] {
			if position_probas.get(ix).is_some_and(|&p| p > 0.0) {
				row[ix] = mask_token_id;
			}
		}
	}
}

/// Picks the position to refill.
///
/// The last existing mask wins (the first one gives worse predictions);
/// otherwise a position is drawn from `position_probas`. Returns `None` for
/// a line with nothing to mutate.
pub(crate) fn locate_mask<R: Rng>(
	row: &[u32],
	position_probas: &[f32],
	mask_token_id: u32,
	rng: &mut R,
) -> Option<usize> {
	if let Some(ix) = row.iter().rposition(|&id| id == mask_token_id) {
		return Some(ix);
	}
	sample_index(position_probas, rng)
}

/// Draws a replacement token id from the model logits at one position.
///
/// Softmax, weighting and renormalisation reduce to sampling proportionally
/// to `exp(logit - max) * weight`.
///
/// # Errors
/// Returns an error when every weighted probability is zero.
pub(crate) fn draw_replacement<R: Rng>(
	logits: &[f32],
	token_probas: &[f32],
	rng: &mut R,
) -> Result<u32> {
	let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	let weights: Vec<f32> = logits
		.iter()
		.zip(token_probas)
		.map(|(logit, weight)| (logit - max).exp() * weight)
		.collect();

	sample_index(&weights, rng)
		.map(|ix| ix as u32)
		.ok_or_else(|| RhymeError::Model("No token left to sample from".to_owned()))
}

/// Weighted random sampling over non-negative weights.
///
/// Performs a cumulative subtraction over the weights. Returns `None` if they
/// do not sum to a positive finite value.
fn sample_index<R: Rng>(weights: &[f32], rng: &mut R) -> Option<usize> {
	let total: f32 = weights.iter().sum();
	if !total.is_finite() || total <= 0.0 {
		return None;
	}

	let mut r = rng.random_range(0.0..total);

	let mut fallback = None;
	for (ix, &weight) in weights.iter().enumerate() {
		if weight <= 0.0 {
			continue;
		}
		if r < weight {
			return Some(ix);
		}
		r -= weight;
		fallback = Some(ix);
	}

	// Rounding can leave `r` just above the last bucket.
	fallback
}

#[cfg(test)]
mod tests {
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	use super::*;

	const MASK: u32 = 4;

	#[test]
	fn mask_probas_spreads_over_masks() {
		assert_eq!(mask_probas(&[7, MASK, MASK, 9], MASK), vec![0.0, 0.5, 0.5, 0.0]);
		assert_eq!(mask_probas(&[7, 9], MASK), vec![0.0, 0.0]);
	}

	#[test]
	fn mask_repeats_only_touches_mutable_positions() {
		let probas = [0.0, 0.0, 0.5, 0.5, 0.0, 0.0];
		let mut row = [8, 8, 3, 3, 9, 9];
		mask_repeats(&mut row, &probas, MASK);
		assert_eq!(row, [8, 8, MASK, MASK, 9, 9]);
	}

	#[test]
	fn locate_mask_prefers_last_mask() {
		let mut rng = StdRng::seed_from_u64(7);
		let probas = [0.0, 0.5, 0.5, 0.0];
		assert_eq!(locate_mask(&[1, MASK, MASK, 2], &probas, MASK, &mut rng), Some(2));
		assert_eq!(locate_mask(&[1, MASK, 3, 2], &probas, MASK, &mut rng), Some(1));
	}

	#[test]
	fn locate_mask_samples_mutable_positions() {
		let mut rng = StdRng::seed_from_u64(7);
		let probas = [0.0, 0.5, 0.5, 0.0];
		for _ in 0..100 {
			let ix = locate_mask(&[1, 5, 6, 2], &probas, MASK, &mut rng);
			assert!(matches!(ix, Some(1) | Some(2)));
		}
		assert_eq!(locate_mask(&[1, 2], &[0.0, 0.0], MASK, &mut rng), None);
	}

	#[test]
	fn draw_replacement_skips_zero_weight_tokens() {
		let mut rng = StdRng::seed_from_u64(42);
		let logits = [10.0, 0.0, 0.0, 0.0];
		let weights = [0.0, 1.0, 1.0, 0.0];
		for _ in 0..200 {
			let id = draw_replacement(&logits, &weights, &mut rng).unwrap();
			assert!(id == 1 || id == 2);
		}
	}

	#[test]
	fn draw_replacement_follows_the_model() {
		let mut rng = StdRng::seed_from_u64(42);
		let logits = [0.0, 50.0, 0.0];
		let weights = [1.0, 1.0, 1.0];
		for _ in 0..50 {
			assert_eq!(draw_replacement(&logits, &weights, &mut rng).unwrap(), 1);
		}
	}

	#[test]
	fn draw_replacement_fails_without_candidates() {
		let mut rng = StdRng::seed_from_u64(1);
		assert!(draw_replacement(&[1.0, 2.0], &[0.0, 0.0], &mut rng).is_err());
	}
}
