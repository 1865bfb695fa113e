use serde::Serialize;

use crate::{fragment::Candidate, rerank::ScoredCandidate};

pub const REFUSAL_NO_CANDIDATES: &str =
	"Không tìm thấy tài liệu luật nào đủ độ tin cậy để trả lời câu hỏi này.";
pub const REFUSAL_CANDIDATES_REJECTED: &str = "Tìm thấy tài liệu liên quan nhưng độ chính xác không đủ cao để đưa ra câu trả lời.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceState {
	NoCandidates,
	CandidatesRejected,
	Grounded,
}
impl EvidenceState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::NoCandidates => "no_candidates",
			Self::CandidatesRejected => "candidates_rejected",
			Self::Grounded => "grounded",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
	NoCandidates,
	CandidatesRejected { candidates: Vec<Candidate> },
	Grounded { candidates: Vec<Candidate>, grounding: Vec<ScoredCandidate> },
}
impl Evidence {
	/// `candidates` is the merged list before reranking, `grounding` the reranker output.
	pub fn decide(candidates: Vec<Candidate>, grounding: Vec<ScoredCandidate>) -> Self {
		if candidates.is_empty() {
			return Self::NoCandidates;
		}
		if grounding.is_empty() {
			return Self::CandidatesRejected { candidates };
		}

		Self::Grounded { candidates, grounding }
	}

	pub fn state(&self) -> EvidenceState {
		match self {
			Self::NoCandidates => EvidenceState::NoCandidates,
			Self::CandidatesRejected { .. } => EvidenceState::CandidatesRejected,
			Self::Grounded { .. } => EvidenceState::Grounded,
		}
	}

	/// The refusal to return instead of an answer, if any.
	pub fn refusal<'a>(&self, messages: &'a RefusalMessages) -> Option<&'a str> {
		match self {
			Self::NoCandidates => Some(messages.no_candidates.as_str()),
			Self::CandidatesRejected { .. } => Some(messages.candidates_rejected.as_str()),
			Self::Grounded { .. } => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefusalMessages {
	pub no_candidates: String,
	pub candidates_rejected: String,
}
impl RefusalMessages {
	pub fn from_config(cfg: &luat_config::Answer) -> Self {
		Self {
			no_candidates: cfg
				.refusal_no_candidates
				.clone()
				.unwrap_or_else(|| REFUSAL_NO_CANDIDATES.to_string()),
			candidates_rejected: cfg
				.refusal_candidates_rejected
				.clone()
				.unwrap_or_else(|| REFUSAL_CANDIDATES_REJECTED.to_string()),
		}
	}
}
impl Default for RefusalMessages {
	fn default() -> Self {
		Self {
			no_candidates: REFUSAL_NO_CANDIDATES.to_string(),
			candidates_rejected: REFUSAL_CANDIDATES_REJECTED.to_string(),
		}
	}
}
