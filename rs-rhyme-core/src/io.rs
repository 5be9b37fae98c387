use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, io};

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Reads a JSON file (e.g. a model `config.json`) into `T`.
#[cfg_attr(not(feature = "bert"), allow(dead_code))]
pub(crate) fn read_json<T: DeserializeOwned, P: AsRef<Path>>(filename: P) -> Result<T> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(serde_json::from_str(&contents)?)
}

/// Returns the first of `names` that exists as a file inside `dir`.
///
/// Example:
/// `["model.safetensors", "pytorch_model.bin"]` → `dir/pytorch_model.bin`
/// if only the PyTorch weights were downloaded.
pub(crate) fn first_existing<P: AsRef<Path>>(dir: P, names: &[&str]) -> Option<PathBuf> {
	names
		.iter()
		.map(|name| dir.as_ref().join(name))
		.find(|path| path.is_file())
}

/// Builds an `io::Error` for a model directory missing a required file.
#[cfg_attr(not(feature = "bert"), allow(dead_code))]
pub(crate) fn missing_file<P: AsRef<Path>>(dir: P, what: &str) -> io::Error {
	io::Error::new(
		io::ErrorKind::NotFound,
		format!("No {} found in {}", what, dir.as_ref().display()),
	)
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Whether `dir` looks like a usable model directory: a config, weights and
/// a vocabulary.
pub fn has_model<P: AsRef<Path>>(dir: P) -> bool {
	let dir = dir.as_ref();
	dir.join("config.json").is_file()
		&& first_existing(dir, &["model.safetensors", "pytorch_model.bin"]).is_some()
		&& first_existing(dir, &["tokenizer.json", "vocab.txt"]).is_some()
}
