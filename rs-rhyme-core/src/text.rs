/// Background colour used to highlight words that changed between two guesses.
pub const DEFAULT_HIGHLIGHT: &str = "#eefa66";

/// Removes ASCII punctuation from a string.
///
/// Examples:
/// - `"hai!!!!!"` → `"hai"`
/// - `"??!!&&wha$$dup**"` → `"whadup"`
pub fn sanitize(s: &str) -> String {
	s.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Finds the last word of a sentence, ignoring anything that is not a letter.
///
/// Only alphabetic characters and plain spaces survive, so `"word up!"` gives
/// `"up"`. Returns `None` when nothing is left.
pub fn find_last_word(s: &str) -> Option<String> {
	let alpha_only: String = s.chars().filter(|c| c.is_alphabetic() || *c == ' ').collect();
	alpha_only.split_whitespace().last().map(str::to_owned)
}

/// Returns every index `i` where `items[i] == items[i + 1]`.
///
/// The last two items are never looked at: in a rhyme line they hold the
/// rhyme word and the closing period (or padding).
pub fn repeated_pairs<T: PartialEq>(items: &[T]) -> Vec<usize> {
	let head = &items[..items.len().saturating_sub(2)];
	head.windows(2)
		.enumerate()
		.filter(|(_, pair)| pair[0] == pair[1])
		.map(|(i, _)| i)
		.collect()
}

/// Locates the words of `new` that differ from `old`.
///
/// The words are compared from the front and from the back; the result is the
/// half-open word range `[start, end)` of `new` lying between the first
/// difference found in each direction. Returns `None` if either direction sees
/// no difference (including when one side has no words at all).
///
/// When the two scans cross, `end` is clamped to `start` and the range is empty.
pub fn changed_span(new: &str, old: &str) -> Option<(usize, usize)> {
	let new_words: Vec<&str> = new.split_whitespace().collect();
	let old_words: Vec<&str> = old.split_whitespace().collect();

	let forward = new_words.iter().zip(&old_words).position(|(n, o)| n != o)?;
	let backward = new_words
		.iter()
		.rev()
		.zip(old_words.iter().rev())
		.position(|(n, o)| n != o)?;

	let end = (new_words.len() - backward).max(forward);
	Some((forward, end))
}

/// Wraps the words of `new` that changed since `old` in a coloured `<span>`.
///
/// The output is `prefix + " " + span + " " + suffix`, so a change at the end
/// leaves a trailing space. Returns `new` untouched if nothing changed.
pub fn color_new_words(new: &str, old: &str, color: &str) -> String {
	let Some((start, end)) = changed_span(new, old) else {
		return new.to_owned();
	};
	let words: Vec<&str> = new.split_whitespace().collect();
	format!(
		"{} <span style=\"background-color: {}\">{}</span> {}",
		words[..start].join(" "),
		color,
		words[start..end].join(" "),
		words[end..].join(" ")
	)
}

/// Extracts the generated line from a full `"first line, second line."` sentence.
///
/// Everything after the first comma is kept, minus the closing period.
pub fn second_line(sentence: &str) -> &str {
	let rest = sentence.split_once(',').map_or(sentence, |(_, rest)| rest);
	rest.trim().trim_end_matches('.').trim_end()
}
