use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

// "Điều", "điều", "Dieu" and tone-mark variants of the vowel.
const ARTICLE_PATTERN: &str = r"(?i)\b[đd]i[eèéẻẽẹêềếểễệ]u\s+(\d+)";
// "Chương", "chuong" and tone-mark variants, followed by arabic or roman numerals.
const CHAPTER_PATTERN: &str =
	r"(?i)\bch[uưứừửữự][oóòỏõọôốồổỗộơớờởỡợ]ng\s+([0-9]+|[ivxlc]+)\b";

/// Statutory references named explicitly in a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegalReferences {
	pub articles: Vec<String>,
	pub chapters: Vec<String>,
}
impl LegalReferences {
	pub fn is_empty(&self) -> bool {
		self.articles.is_empty() && self.chapters.is_empty()
	}
}

pub fn extract_references(question: &str) -> LegalReferences {
	let normalized: String = question.nfc().collect();
	let articles = dedupe(
		captures(ARTICLE_PATTERN, &normalized)
			.into_iter()
			.filter_map(|raw| raw.parse::<u32>().ok())
			.map(|number| number.to_string()),
	);
	let chapters = dedupe(
		captures(CHAPTER_PATTERN, &normalized).into_iter().map(|raw| raw.to_uppercase()),
	);

	LegalReferences { articles, chapters }
}

fn captures(pattern: &str, text: &str) -> Vec<String> {
	let Ok(re) = Regex::new(pattern) else {
		return Vec::new();
	};

	re.captures_iter(text)
		.filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
		.collect()
}

fn dedupe(values: impl Iterator<Item = String>) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for value in values {
		if seen.insert(value.clone()) {
			out.push(value);
		}
	}

	out
}
