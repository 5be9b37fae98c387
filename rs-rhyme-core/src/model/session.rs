use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::generator::RhymeGenerator;
use super::traits::{MaskTokenizer, MaskedLanguageModel};
use crate::error::{Result, RhymeError};
use crate::language::Language;
use crate::text::{changed_span, color_new_words, sanitize, second_line, DEFAULT_HIGHLIGHT};

pub const DEFAULT_QUERY: &str = "Machines will take over the world soon";
pub const N_RHYMES: usize = 10;
pub const ITER_FACTOR: usize = 5;

/// Parameters of one rhyming session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionConfig {
	/// Maximum number of rhyme words (and so of second lines).
	pub n_rhymes: usize,

	/// Mutations per word of the seed sentence.
	pub iter_factor: usize,

	/// Sentence used when the user gives nothing usable.
	pub default_query: String,

	pub language: Language,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			n_rhymes: N_RHYMES,
			iter_factor: ITER_FACTOR,
			default_query: DEFAULT_QUERY.to_owned(),
			language: Language::default(),
		}
	}
}

impl SessionConfig {
	/// Strips punctuation; an empty result falls back to the default query.
	pub fn prepare_query(&self, raw: &str) -> String {
		let query = sanitize(raw);
		if query.trim().is_empty() {
			self.default_query.clone()
		} else {
			query
		}
	}

	/// Number of mutations for a seed sentence: one batch per word, times the factor.
	pub fn max_iterations(&self, query: &str) -> usize {
		query.split_whitespace().count() * self.iter_factor
	}
}

/// Fraction of the session done after iteration `i` (0-based).
pub fn progress(i: usize, max_iterations: usize) -> f32 {
	if max_iterations <= 1 {
		return 1.0;
	}
	(i as f32 / (max_iterations - 1) as f32).min(1.0)
}

/// One second line as shown to the user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Line {
	pub rhyme_word: String,

	/// Second line of the current guess.
	pub text: String,

	/// Second line of the previous guess.
	pub previous: String,

	/// Word range of `text` that changed since `previous`.
	pub changed: Option<(usize, usize)>,

	/// `text` with the changed words wrapped in a highlighted `<span>`.
	pub html: String,
}

impl Line {
	fn new(rhyme_word: &str, sentence: &str, previous_sentence: &str) -> Self {
		let text = second_line(sentence);
		let previous = second_line(previous_sentence);
		Self {
			rhyme_word: rhyme_word.to_owned(),
			text: text.to_owned(),
			previous: previous.to_owned(),
			changed: changed_span(text, previous),
			html: color_new_words(text, previous, DEFAULT_HIGHLIGHT),
		}
	}
}

/// Output of one mutation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Step {
	/// 0-based iteration index.
	pub iteration: usize,
	pub max_iterations: usize,
	/// In `[0.0, 1.0]`.
	pub progress: f32,
	pub lines: Vec<Line>,
}

/// Runs a `RhymeGenerator` for a fixed number of iterations on one seed sentence.
///
/// # Responsibilities
/// - Keep the first `n_rhymes` rhyme words
/// - Track the previous guesses so each `Step` can highlight what changed
/// - Stop after `max_iterations` steps
pub struct RhymeSession<M, T, R> {
	generator: RhymeGenerator<M, T, R>,
	query: String,
	rhyme_words: Vec<String>,
	max_iterations: usize,
	iteration: usize,
	previous: Vec<String>,
}

impl<M: MaskedLanguageModel, T: MaskTokenizer, R: Rng> RhymeSession<M, T, R> {
	/// Starts `generator` on an already prepared query.
	///
	/// # Errors
	/// - `NoRhymes` if `rhyme_words` is empty
	/// - any error from `RhymeGenerator::start`
	pub fn start(
		mut generator: RhymeGenerator<M, T, R>,
		config: &SessionConfig,
		query: &str,
		rhyme_words: &[String],
	) -> Result<Self> {
		let rhyme_words: Vec<String> = rhyme_words.iter().take(config.n_rhymes).cloned().collect();
		if rhyme_words.is_empty() {
			return Err(RhymeError::NoRhymes);
		}

		generator.start(query, &rhyme_words)?;
		let max_iterations = config.max_iterations(query);
		debug!("Rhyming {query:?} with {rhyme_words:?} over {max_iterations} iterations");

		Ok(Self {
			generator,
			query: query.to_owned(),
			previous: vec![" ".to_owned(); rhyme_words.len()],
			rhyme_words,
			max_iterations,
			iteration: 0,
		})
	}

	pub fn query(&self) -> &str {
		&self.query
	}

	pub fn rhyme_words(&self) -> &[String] {
		&self.rhyme_words
	}

	pub fn max_iterations(&self) -> usize {
		self.max_iterations
	}

	pub fn is_finished(&self) -> bool {
		self.iteration >= self.max_iterations
	}

	/// Mutates once. Returns `None` when every iteration has been run.
	pub fn step(&mut self) -> Result<Option<Step>> {
		if self.is_finished() {
			return Ok(None);
		}

		let current = self.generator.mutate()?;
		let lines = self
			.rhyme_words
			.iter()
			.zip(current.iter().zip(&self.previous))
			.map(|(rhyme_word, (new, old))| Line::new(rhyme_word, new, old))
			.collect();

		let step = Step {
			iteration: self.iteration,
			max_iterations: self.max_iterations,
			progress: progress(self.iteration, self.max_iterations),
			lines,
		};
		self.previous = current;
		self.iteration += 1;
		Ok(Some(step))
	}

	/// Runs every remaining iteration, handing each step to `on_step`, and
	/// returns the final sentences.
	pub fn run<F: FnMut(&Step)>(&mut self, mut on_step: F) -> Result<Vec<String>> {
		while let Some(step) = self.step()? {
			on_step(&step);
		}
		Ok(self.previous.clone())
	}
}
