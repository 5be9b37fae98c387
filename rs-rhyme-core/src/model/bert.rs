//! Candle/tokenizers adapter for BERT checkpoints.
//!
//! A model directory is expected to hold a Hugging Face export:
//! - `config.json`
//! - `model.safetensors` (or `pytorch_model.bin`) including the MLM head
//! - `tokenizer.json` (or a bare `vocab.txt`)

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertForMaskedLM, Config};
use log::debug;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{AddedToken, Tokenizer};

use super::traits::{MaskTokenizer, MaskedLanguageModel};
use crate::error::{Result, RhymeError};
use crate::io::{first_existing, missing_file, read_json};

const MASK_TOKEN: &str = "[MASK]";
const PAD_TOKEN: &str = "[PAD]";
const UNK_TOKEN: &str = "[UNK]";
const SPECIAL_TOKENS: [&str; 5] = [PAD_TOKEN, UNK_TOKEN, "[CLS]", "[SEP]", MASK_TOKEN];

impl From<candle_core::Error> for RhymeError {
	fn from(e: candle_core::Error) -> Self {
		RhymeError::Model(e.to_string())
	}
}

fn tokenizer_error(e: tokenizers::Error) -> RhymeError {
	RhymeError::Tokenizer(e.to_string())
}

/// WordPiece tokenizer of a (cased) BERT checkpoint.
pub struct BertTokenizer {
	inner: Tokenizer,
	mask_token_id: u32,
	pad_token_id: u32,
}

impl BertTokenizer {
	/// Loads `tokenizer.json` from `dir`, falling back to `vocab.txt`.
	pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
		let dir = dir.as_ref();
		let path = first_existing(dir, &["tokenizer.json", "vocab.txt"])
			.ok_or_else(|| missing_file(dir, "tokenizer.json or vocab.txt"))?;

		let inner = if path.extension().is_some_and(|ext| ext == "json") {
			Tokenizer::from_file(&path).map_err(tokenizer_error)?
		} else {
			Self::from_vocab(&path)?
		};
		Self::new(inner)
	}

	/// Wraps an already built tokenizer. It must know `[MASK]` and `[PAD]`.
	pub fn new(inner: Tokenizer) -> Result<Self> {
		let lookup = |token: &str| {
			inner
				.token_to_id(token)
				.ok_or_else(|| RhymeError::Tokenizer(format!("Vocabulary has no {token} token")))
		};
		let mask_token_id = lookup(MASK_TOKEN)?;
		let pad_token_id = lookup(PAD_TOKEN)?;
		Ok(Self { inner, mask_token_id, pad_token_id })
	}

	/// Builds a cased BERT tokenizer from a WordPiece vocabulary file.
	fn from_vocab(path: &Path) -> Result<Tokenizer> {
		let vocab = path
			.to_str()
			.ok_or_else(|| RhymeError::InvalidInput(format!("Invalid vocabulary path: {}", path.display())))?;
		let wordpiece = WordPiece::from_file(vocab)
			.unk_token(UNK_TOKEN.to_owned())
			.build()
			.map_err(tokenizer_error)?;

		let mut tokenizer = Tokenizer::new(wordpiece);
		tokenizer
			.with_normalizer(Some(BertNormalizer::new(true, true, Some(false), false)))
			.with_pre_tokenizer(Some(BertPreTokenizer))
			.with_decoder(Some(WordPieceDecoder::default()));

		// Only tokens the vocabulary knows, so a missing [MASK] is reported by `new`
		let special: Vec<AddedToken> = SPECIAL_TOKENS
			.iter()
			.filter(|token| tokenizer.token_to_id(token).is_some())
			.map(|token| AddedToken::from(*token, true))
			.collect();
		tokenizer.add_special_tokens(&special);
		Ok(tokenizer)
	}
}

impl MaskTokenizer for BertTokenizer {
	fn encode(&self, text: &str) -> Result<Vec<u32>> {
		let encoding = self.inner.encode(text, false).map_err(tokenizer_error)?;
		Ok(encoding.get_ids().to_vec())
	}

	fn decode(&self, ids: &[u32]) -> Result<String> {
		self.inner.decode(ids, true).map_err(tokenizer_error)
	}

	fn mask_token_id(&self) -> u32 {
		self.mask_token_id
	}

	fn pad_token_id(&self) -> u32 {
		self.pad_token_id
	}

	fn vocab(&self) -> Vec<(String, u32)> {
		self.inner.get_vocab(true).into_iter().collect()
	}

	fn vocab_size(&self) -> usize {
		self.inner.get_vocab_size(true)
	}
}

/// BERT with its masked-language-modelling head, running on the CPU.
pub struct BertMaskedLm {
	model: BertForMaskedLM,
	device: Device,
}

impl BertMaskedLm {
	/// Loads `config.json` and the weights found in `dir`.
	pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
		let dir = dir.as_ref();
		let config: Config = read_json(dir.join("config.json"))?;
		let device = Device::Cpu;

		let vb = if let Some(weights) = first_existing(dir, &["model.safetensors"]) {
			// SAFETY: the file is only read, and is not expected to change while mapped.
			unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? }
		} else if let Some(weights) = first_existing(dir, &["pytorch_model.bin"]) {
			VarBuilder::from_pth(weights, DType::F32, &device)?
		} else {
			return Err(missing_file(dir, "model.safetensors or pytorch_model.bin").into());
		};

		let model = BertForMaskedLM::load(vb, &config)?;
		Ok(Self { model, device })
	}
}

impl MaskedLanguageModel for BertMaskedLm {
	fn predict(&self, batch: &[Vec<u32>]) -> Result<Vec<Vec<Vec<f32>>>> {
		let width = batch.first().map_or(0, Vec::len);
		if batch.iter().any(|row| row.len() != width) {
			return Err(RhymeError::InvalidInput("Batch rows must have the same length".to_owned()));
		}

		let input_ids = Tensor::from_vec(batch.concat(), (batch.len(), width), &self.device)?;
		let token_type_ids = input_ids.zeros_like()?;
		let logits = self.model.forward(&input_ids, &token_type_ids, None)?;
		Ok(logits.to_dtype(DType::F32)?.to_vec3::<f32>()?)
	}
}

/// Loads the model and its tokenizer from one directory.
pub fn load_model<P: AsRef<Path>>(dir: P) -> Result<(BertMaskedLm, BertTokenizer)> {
	let dir = dir.as_ref();
	debug!("Loading model from {}", dir.display());
	Ok((BertMaskedLm::from_dir(dir)?, BertTokenizer::from_dir(dir)?))
}
