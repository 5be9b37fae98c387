use std::sync::Arc;

use crate::error::Result;

/// Tokenizer of a masked language model.
///
/// Only what the rhyme generator needs: plain encoding without `[CLS]`/`[SEP]`,
/// decoding that drops special tokens, and access to the vocabulary.
pub trait MaskTokenizer {
	/// Encodes text into token ids, without special tokens.
	fn encode(&self, text: &str) -> Result<Vec<u32>>;

	/// Decodes token ids into text, skipping special tokens (mask, padding...).
	fn decode(&self, ids: &[u32]) -> Result<String>;

	fn mask_token_id(&self) -> u32;

	fn pad_token_id(&self) -> u32;

	/// Every `(token, id)` pair of the vocabulary, in no particular order.
	fn vocab(&self) -> Vec<(String, u32)>;

	fn vocab_size(&self) -> usize;
}

/// A pretrained masked language model, seen as a black box.
pub trait MaskedLanguageModel {
	/// Runs the model on a batch of equally long token sequences.
	///
	/// Returns raw logits indexed as `[row][position][token id]`.
	fn predict(&self, batch: &[Vec<u32>]) -> Result<Vec<Vec<Vec<f32>>>>;
}

impl<T: MaskTokenizer + ?Sized> MaskTokenizer for Arc<T> {
	fn encode(&self, text: &str) -> Result<Vec<u32>> {
		(**self).encode(text)
	}

	fn decode(&self, ids: &[u32]) -> Result<String> {
		(**self).decode(ids)
	}

	fn mask_token_id(&self) -> u32 {
		(**self).mask_token_id()
	}

	fn pad_token_id(&self) -> u32 {
		(**self).pad_token_id()
	}

	fn vocab(&self) -> Vec<(String, u32)> {
		(**self).vocab()
	}

	fn vocab_size(&self) -> usize {
		(**self).vocab_size()
	}
}

impl<M: MaskedLanguageModel + ?Sized> MaskedLanguageModel for Arc<M> {
	fn predict(&self, batch: &[Vec<u32>]) -> Result<Vec<Vec<Vec<f32>>>> {
		(**self).predict(batch)
	}
}
