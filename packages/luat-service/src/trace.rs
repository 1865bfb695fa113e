use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
	Validation,
	Expansion,
	Retrieval,
	Merge,
	Rerank,
	Gate,
	Generation,
}
impl TraceStage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "validation",
			Self::Expansion => "expansion",
			Self::Retrieval => "retrieval",
			Self::Merge => "merge",
			Self::Rerank => "rerank",
			Self::Gate => "gate",
			Self::Generation => "generation",
		}
	}
}

/// One structured record per finished pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
	pub trace_id: Uuid,
	pub stage: TraceStage,
	pub elapsed_ms: u64,
	/// blake3 of the question, so traces can be joined without storing the text.
	pub question_hash: String,
	/// Items produced by the stage (queries, candidates, citations).
	pub count: usize,
	pub fragment_ids: Option<Vec<i64>>,
	pub detail: Option<String>,
}

pub trait TraceSink
where
	Self: Send + Sync,
{
	fn record(&self, event: &TraceEvent);
}

/// Emits events as `tracing` debug records.
pub struct LogSink;
impl TraceSink for LogSink {
	fn record(&self, event: &TraceEvent) {
		tracing::debug!(
			trace_id = %event.trace_id,
			stage = event.stage.as_str(),
			elapsed_ms = event.elapsed_ms,
			question_hash = %event.question_hash,
			count = event.count,
			fragment_ids = ?event.fragment_ids,
			detail = event.detail.as_deref().unwrap_or_default(),
			"Pipeline stage finished."
		);
	}
}

pub struct NoopSink;
impl TraceSink for NoopSink {
	fn record(&self, _event: &TraceEvent) {}
}

pub fn hash_question(question: &str) -> String {
	blake3::hash(question.trim().as_bytes()).to_hex().to_string()
}
