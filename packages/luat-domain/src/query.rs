use std::collections::HashSet;

use serde::Serialize;

use crate::{reference::LegalReferences, rerank::RerankQueryMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
	Off,
	Keywords,
	Paraphrase,
}
impl ExpansionMode {
	pub fn from_config(cfg: &luat_config::Expansion) -> Self {
		match cfg.mode.as_str() {
			"keywords" => Self::Keywords,
			"paraphrase" => Self::Paraphrase,
			_ => Self::Off,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Off => "off",
			Self::Keywords => "keywords",
			Self::Paraphrase => "paraphrase",
		}
	}
}

/// Query strings and references used by one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
	pub original: String,
	/// Always starts with the original question.
	pub variants: Vec<String>,
	pub references: LegalReferences,
}
impl QueryPlan {
	pub fn new(original: &str, expanded: Vec<String>, references: LegalReferences) -> Self {
		let original = original.trim().to_string();
		let variants = normalize_queries(expanded, &original);

		Self { original, variants, references }
	}

	pub fn representative_query(&self, mode: RerankQueryMode) -> String {
		match mode {
			RerankQueryMode::Original => self.original.clone(),
			RerankQueryMode::Concatenated => self.variants.join(" "),
		}
	}
}

/// Builds the single augmented query used by keyword expansion.
pub fn keyword_query(question: &str, keywords: &str) -> Option<String> {
	let keywords = keywords.trim();

	if keywords.is_empty() {
		return None;
	}

	Some(format!("{} {keywords}", question.trim()))
}

/// Places the original first, then drops blank and case-insensitive duplicate variants.
pub fn normalize_queries(queries: Vec<String>, original: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	push_query(&mut out, &mut seen, original);

	for query in queries {
		push_query(&mut out, &mut seen, &query);
	}

	out
}

fn push_query(out: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return;
	}

	let key = trimmed.to_lowercase();

	if seen.insert(key) {
		out.push(trimmed.to_string());
	}
}
