use crate::{fragment::Fragment, rerank::ScoredCandidate};

pub const ENTRY_DELIMITER: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
	pub context: String,
	/// Same order as the entries in `context`.
	pub citations: Vec<String>,
}

pub fn assemble(grounding: &[ScoredCandidate]) -> AssembledContext {
	AssembledContext { context: build_context(grounding), citations: format_citations(grounding) }
}

pub fn build_context(grounding: &[ScoredCandidate]) -> String {
	grounding
		.iter()
		.enumerate()
		.map(|(index, item)| {
			let candidate = item.candidate();
			let fragment = candidate.fragment();

			format!(
				"[{}] {} (tương đồng: {:.2}; điểm xếp hạng: {:.2})\n{}",
				index + 1,
				provenance_header(fragment),
				candidate.similarity(),
				item.rerank_score(),
				fragment.content.trim(),
			)
		})
		.collect::<Vec<_>>()
		.join(ENTRY_DELIMITER)
}

pub fn format_citations(grounding: &[ScoredCandidate]) -> Vec<String> {
	grounding
		.iter()
		.map(|item| {
			let candidate = item.candidate();

			format!(
				"{} (độ tương đồng: {:.2}%)",
				provenance_header(candidate.fragment()),
				candidate.similarity() * 100.0
			)
		})
		.collect()
}

/// `Luật X – Điều 5 (Tiêu đề), Khoản 2, Điểm a`, omitting absent parts.
pub fn provenance_header(fragment: &Fragment) -> String {
	let locator = &fragment.locator;
	let mut header = fragment.law_name.trim().to_string();

	if let Some(article) = locator.article {
		header.push_str(&format!(" – Điều {article}"));

		if let Some(title) = locator.article_title.as_deref().filter(|title| !title.trim().is_empty())
		{
			header.push_str(&format!(" ({})", title.trim()));
		}
	}
	if let Some(clause) = locator.clause {
		header.push_str(&format!(", Khoản {clause}"));
	}
	if let Some(point) = locator.point.as_deref().filter(|point| !point.trim().is_empty()) {
		header.push_str(&format!(", Điểm {}", point.trim()));
	}

	header
}
