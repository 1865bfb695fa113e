use std::cmp::Ordering;

use serde::Serialize;

use crate::fragment::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankQueryMode {
	Original,
	Concatenated,
}
impl RerankQueryMode {
	pub fn from_config(cfg: &luat_config::Rerank) -> Self {
		match cfg.query_mode.as_str() {
			"original" => Self::Original,
			_ => Self::Concatenated,
		}
	}
}

/// A candidate that went through the reranker. Only [`RerankPolicy::apply`] builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
	#[serde(flatten)]
	candidate: Candidate,
	rerank_score: f32,
}
impl ScoredCandidate {
	pub fn candidate(&self) -> &Candidate {
		&self.candidate
	}

	pub fn rerank_score(&self) -> f32 {
		self.rerank_score
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreCountMismatch {
	pub expected: usize,
	pub actual: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankPolicy {
	pub threshold: f32,
	/// Fallback size when fewer candidates clear the threshold. Zero disables the fallback.
	pub min_results: usize,
	pub top_k: Option<usize>,
}
impl RerankPolicy {
	pub fn from_config(cfg: &luat_config::Rerank) -> Self {
		Self {
			threshold: cfg.threshold,
			min_results: cfg.min_results as usize,
			top_k: cfg.top_k.map(|top_k| top_k as usize),
		}
	}

	/// Attaches `scores` to `candidates` by position, sorts by score, then applies the
	/// threshold, the minimum-result fallback, and the cap in that order.
	pub fn apply(
		&self,
		candidates: Vec<Candidate>,
		scores: &[f32],
	) -> Result<Vec<ScoredCandidate>, ScoreCountMismatch> {
		if candidates.len() != scores.len() {
			return Err(ScoreCountMismatch { expected: candidates.len(), actual: scores.len() });
		}

		let mut scored: Vec<ScoredCandidate> = candidates
			.into_iter()
			.zip(scores.iter().copied())
			.map(|(candidate, rerank_score)| ScoredCandidate { candidate, rerank_score })
			.collect();

		// Stable sort keeps merge order among equal scores.
		scored.sort_by(|a, b| cmp_f32_desc(a.rerank_score, b.rerank_score));

		let survivors = scored.iter().filter(|item| item.rerank_score >= self.threshold).count();
		let keep = if survivors >= self.min_results {
			survivors
		} else {
			self.min_results.min(scored.len())
		};

		scored.truncate(keep);

		if let Some(top_k) = self.top_k {
			scored.truncate(top_k);
		}

		Ok(scored)
	}
}

/// Descending order with NaN last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
