use serde_json::Value;

use luat_domain::{
	ExpansionMode,
	query::{keyword_query, normalize_queries},
};

use crate::{LuatService, prompt};

impl LuatService {
	/// Extra query variants for `question`. Generator failures degrade to no variants.
	pub async fn expand_queries(&self, question: &str) -> Vec<String> {
		let mode = ExpansionMode::from_config(&self.cfg.expansion);

		match mode {
			ExpansionMode::Off => Vec::new(),
			ExpansionMode::Keywords => self.expand_keywords(question).await,
			ExpansionMode::Paraphrase => self.expand_paraphrases(question).await,
		}
	}

	async fn expand_keywords(&self, question: &str) -> Vec<String> {
		let messages = prompt::build_keyword_messages(question);
		let raw = match self
			.providers
			.expansion
			.complete(&self.cfg.providers.llm_expansion, &messages)
			.await
		{
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(error = %err, mode = "keywords", "Query expansion failed.");

				return Vec::new();
			},
		};

		keyword_query(question, &clean_keywords(&raw)).into_iter().collect()
	}

	async fn expand_paraphrases(&self, question: &str) -> Vec<String> {
		let max = self.cfg.expansion.max_paraphrases;
		let messages = prompt::build_paraphrase_messages(question, max);
		let raw = match self
			.providers
			.expansion
			.complete(&self.cfg.providers.llm_expansion, &messages)
			.await
		{
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(error = %err, mode = "paraphrase", "Query expansion failed.");

				return Vec::new();
			},
		};
		let parsed = parse_paraphrases(&raw);

		if parsed.is_empty() {
			tracing::warn!(mode = "paraphrase", "Query expansion returned no usable paraphrases.");

			return Vec::new();
		}

		// The original comes back first; drop it and keep the distinct paraphrases.
		normalize_queries(parsed, question).into_iter().skip(1).take(max as usize).collect()
	}
}

/// Accepts `{"queries": [...]}`, a bare JSON array, or a plain list with one paraphrase per line.
/// Fenced or JSON-looking output that fails to parse yields nothing.
fn parse_paraphrases(raw: &str) -> Vec<String> {
	let fenced = raw.contains("```");
	let body = fenced_block(raw);

	match serde_json::from_str::<Value>(body) {
		Ok(value) => return json_queries(&value),
		Err(_) if fenced || body.starts_with(['{', '[']) => return Vec::new(),
		Err(_) => {},
	}

	body.lines()
		.map(strip_list_marker)
		.filter(|line| line.chars().any(char::is_alphanumeric))
		.map(str::to_string)
		.collect()
}

fn json_queries(value: &Value) -> Vec<String> {
	let items = match value {
		Value::Object(map) => map.get("queries").and_then(Value::as_array),
		Value::Array(items) => Some(items),
		_ => None,
	};

	items
		.map(|items| {
			items
				.iter()
				.filter_map(Value::as_str)
				.map(str::trim)
				.filter(|item| !item.is_empty())
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default()
}

fn clean_keywords(raw: &str) -> String {
	let body = fenced_block(raw);

	body.split_whitespace().collect::<Vec<_>>().join(" ").trim_matches('"').trim().to_string()
}

/// Contents of the first code fence, wherever it starts. Unfenced text is returned trimmed.
fn fenced_block(raw: &str) -> &str {
	let Some((_, after)) = raw.split_once("```") else {
		return raw.trim();
	};
	// Skip an optional language tag on the opening fence.
	let inner = after.split_once('\n').map(|(_, rest)| rest).unwrap_or(after);

	inner.split_once("```").map(|(block, _)| block).unwrap_or(inner).trim()
}

/// Strips `1.`, `2)`, `-`, `*` and `•` markers. Digits without a marker are content.
fn strip_list_marker(line: &str) -> &str {
	let trimmed = line.trim();
	let after_digits = trimmed.trim_start_matches(|ch: char| ch.is_ascii_digit());
	let unnumbered = match after_digits.strip_prefix(['.', ')']) {
		Some(rest) if after_digits.len() < trimmed.len() && rest.starts_with(char::is_whitespace) =>
			rest,
		_ => trimmed,
	};

	unnumbered.trim_start_matches(['-', '*', '•']).trim()
}
