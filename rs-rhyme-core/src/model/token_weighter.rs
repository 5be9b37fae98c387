use super::traits::MaskTokenizer;

/// Per-token sampling weights applied on top of the model's distribution.
///
/// Single characters (punctuation, letters) and word pieces (`##ing`) get a
/// weight of `0.0`, everything else `1.0`, so replacements are whole words.
///
/// # Invariants
/// - `proba.len()` equals the tokenizer vocabulary size
/// - every weight is `0.0` or `1.0` when built with `new`
#[derive(Clone, Debug)]
pub struct TokenWeighter {
	proba: Vec<f32>,
}

impl TokenWeighter {
	/// Builds the weights from a tokenizer vocabulary.
	pub fn new<T: MaskTokenizer + ?Sized>(tokenizer: &T) -> Self {
		let mut proba = vec![0.0; tokenizer.vocab_size()];
		for (token, id) in tokenizer.vocab() {
			if token.chars().count() > 1 && !token.contains('#') {
				if let Some(weight) = proba.get_mut(id as usize) {
					*weight = 1.0;
				}
			}
		}
		Self { proba }
	}

	/// Uses explicit weights, indexed by token id.
	pub fn from_weights(proba: Vec<f32>) -> Self {
		Self { proba }
	}

	pub fn proba(&self) -> &[f32] {
		&self.proba
	}
}
