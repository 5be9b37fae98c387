use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language of the seed sentence, which decides the model that writes the
/// second line.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
	#[default]
	English,
	Dutch,
}

impl Language {
	/// All supported languages, in display order.
	pub const ALL: [Language; 2] = [Language::English, Language::Dutch];

	/// Name of the model directory relative to the data directory.
	pub fn model_name(&self) -> &'static str {
		match self {
			Language::English => "bert-large-cased-whole-word-masking-finetuned-squad",
			Language::Dutch => "wietsedv/bert-base-dutch-cased",
		}
	}

	/// Full path of the model directory for this language.
	///
	/// Example: `./data` + `English` → `./data/bert-large-cased-whole-word-masking-finetuned-squad`
	pub fn model_dir<P: AsRef<Path>>(&self, data_dir: P) -> PathBuf {
		data_dir.as_ref().join(self.model_name())
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Language::English => "english",
			Language::Dutch => "dutch",
		}
	}
}

impl fmt::Display for Language {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Language {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"english" => Ok(Language::English),
			"dutch" => Ok(Language::Dutch),
			other => Err(format!("Unsupported language ({other}) expected 'english' or 'dutch'.")),
		}
	}
}
