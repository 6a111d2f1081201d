use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

/// Tokens longer than this (in bytes) are dropped.
pub const MAX_TOKEN_LEN: usize = 40;

pub const DEFAULT_STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Unicode word split, long-token removal, lowercasing, then stop words.
/// An empty stop list keeps every token.
pub fn build_analyzer(stop_words: &[&str]) -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.iter().map(|s| s.to_string())))
		.build()
}

pub fn tokenize(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut terms = Vec::new();
	let mut stream = analyzer.token_stream(text);
	stream.process(&mut |token| terms.push(token.text.clone()));
	terms
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_splits_on_punctuation() {
		let mut analyzer = build_analyzer(&[]);
		assert_eq!(tokenize(&mut analyzer, "Alpha-Beta, GAMMA!"), vec!["alpha", "beta", "gamma"]);
	}

	#[test]
	fn stop_words_are_optional() {
		let mut with = build_analyzer(DEFAULT_STOP_WORDS);
		let mut without = build_analyzer(&[]);
		assert_eq!(tokenize(&mut with, "the system of record"), vec!["system", "record"]);
		assert_eq!(tokenize(&mut without, "the system").len(), 2);
	}

	#[test]
	fn non_latin_scripts_tokenize() {
		let mut analyzer = build_analyzer(&[]);
		assert_eq!(tokenize(&mut analyzer, "Система Учёта"), vec!["система", "учёта"]);
	}
}
