use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::text::find_last_word;

/// Public Datamuse endpoint.
pub const DATAMUSE_URL: &str = "https://api.datamuse.com";

/// Anything able to list words rhyming with a given word.
pub trait RhymeSource {
	/// Returns words rhyming with `word`, best first, at most `n_rhymes` if given.
	fn rhyme_words(&self, word: &str, n_rhymes: Option<usize>) -> Result<Vec<String>>;
}

/// One entry of a Datamuse `/words` response. Other fields (score,
/// syllable count...) are ignored.
#[derive(Deserialize)]
struct DatamuseWord {
	word: String,
}

/// Blocking client for the Datamuse `/words?rel_rhy=` endpoint.
pub struct DatamuseClient {
	client: Client,
	base_url: String,
}

impl DatamuseClient {
	/// Creates a client against `base_url` (no trailing `/words`).
	pub fn new(base_url: &str) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::new(10, 0))
			.build()?;
		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_owned(),
		})
	}
}

impl RhymeSource for DatamuseClient {
	fn rhyme_words(&self, word: &str, n_rhymes: Option<usize>) -> Result<Vec<String>> {
		debug!("Querying Datamuse for rhymes of {word}");
		let body = self.client
			.get(format!("{}/words", self.base_url))
			.query(&[("rel_rhy", word)])
			.send()?
			.error_for_status()?
			.text()?;
		parse_rhyme_words(&body, n_rhymes)
	}
}

/// Parses a Datamuse JSON array, keeping API order.
pub fn parse_rhyme_words(body: &str, n_rhymes: Option<usize>) -> Result<Vec<String>> {
	let entries: Vec<DatamuseWord> = serde_json::from_str(body)?;
	let words = entries.into_iter().map(|entry| entry.word);
	Ok(match n_rhymes {
		Some(n) => words.take(n).collect(),
		None => words.collect(),
	})
}

/// Returns words rhyming with the last word of `sentence`.
///
/// The sentence may end with punctuation. A sentence without any word gives an
/// empty list and no request is made.
pub fn query_rhyme_words<S: RhymeSource + ?Sized>(
	source: &S,
	sentence: &str,
	n_rhymes: Option<usize>,
) -> Result<Vec<String>> {
	match find_last_word(sentence) {
		Some(last_word) => source.rhyme_words(&last_word, n_rhymes),
		None => Ok(Vec::new()),
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use super::*;

	const BODY: &str = r#"[
		{"word":"peace","score":3149,"numSyllables":1},
		{"word":"lease","score":1456,"numSyllables":1},
		{"word":"geese","score":1202,"numSyllables":1}
	]"#;

	struct Recorder {
		asked: RefCell<Vec<String>>,
	}

	impl RhymeSource for Recorder {
		fn rhyme_words(&self, word: &str, n_rhymes: Option<usize>) -> Result<Vec<String>> {
			self.asked.borrow_mut().push(word.to_owned());
			parse_rhyme_words(BODY, n_rhymes)
		}
	}

	#[test]
	fn parses_words_in_api_order() {
		assert_eq!(parse_rhyme_words(BODY, None).unwrap(), vec!["peace", "lease", "geese"]);
		assert_eq!(parse_rhyme_words(BODY, Some(2)).unwrap(), vec!["peace", "lease"]);
		assert!(parse_rhyme_words("[]", Some(10)).unwrap().is_empty());
	}

	#[test]
	fn rejects_malformed_body() {
		assert!(parse_rhyme_words("<html>oops</html>", None).is_err());
	}

	#[test]
	fn queries_last_word_only() {
		let recorder = Recorder { asked: RefCell::new(Vec::new()) };
		let words = query_rhyme_words(&recorder, "I like cheese!", Some(1)).unwrap();
		assert_eq!(words, vec!["peace"]);
		assert_eq!(*recorder.asked.borrow(), vec!["cheese"]);

		assert!(query_rhyme_words(&recorder, "?!", None).unwrap().is_empty());
		assert_eq!(recorder.asked.borrow().len(), 1);
	}
}
