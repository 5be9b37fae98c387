use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RhymeError>;

/// Everything that can go wrong while looking up rhymes or generating lines.
#[derive(Error, Debug)]
pub enum RhymeError {
	#[error("Rhyme lookup failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Model error: {0}")]
	Model(String),

	#[error("Tokenizer error: {0}")]
	Tokenizer(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Invalid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Generator was not started")]
	NotStarted,

	#[error("No rhyme words found")]
	NoRhymes,

	#[error("Query has no tokens")]
	EmptyQuery,

	#[error("Invalid input: {0}")]
	InvalidInput(String),
}
