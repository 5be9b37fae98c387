//! Rhyme generation with a masked language model.
//!
//! Given a first line, this crate:
//! - Looks up words rhyming with its last word (Datamuse)
//! - Builds one masked second line per rhyme word
//! - Repeatedly masks and refills one token per line with a masked language model
//!
//! The model and tokenizer are abstracted behind traits; a BERT implementation
//! based on candle is available with the `bert` feature (on by default).

/// Error and result types.
pub mod error;

/// Supported languages and their model directories.
pub mod language;

/// Rhyme word lookup.
pub mod rhyme;

/// String helpers: sanitizing, last word, highlighting.
pub mod text;

/// Model interfaces, generator and session.
pub mod model;

/// File helpers for model directories.
pub mod io;

pub use error::{Result, RhymeError};
pub use language::Language;
