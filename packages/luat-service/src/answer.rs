use std::time::Instant;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use luat_domain::{
	Candidate, Evidence, EvidenceState, ExpansionMode, LegalReferences, QueryPlan,
	RefusalMessages, ScoredCandidate, context, reference,
};

use crate::{Error, ErrorKind, LuatService, TraceEvent, TraceSink, TraceStage, prompt, trace};

/// Everything one invocation produced, including refusals and errors.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceResult {
	pub trace_id: Uuid,
	pub answer: Option<String>,
	/// Parallel to `grounding`.
	pub citations: Vec<String>,
	pub grounding: Vec<ScoredCandidate>,
	/// Merged candidates before reranking.
	pub candidates: Vec<Candidate>,
	pub evidence: Option<EvidenceState>,
	pub error: Option<String>,
	pub error_kind: Option<ErrorKind>,
	pub diagnostics: Diagnostics,
}
impl EvidenceResult {
	fn new(trace_id: Uuid, started_at: OffsetDateTime) -> Self {
		Self {
			trace_id,
			answer: None,
			citations: Vec::new(),
			grounding: Vec::new(),
			candidates: Vec::new(),
			evidence: None,
			error: None,
			error_kind: None,
			diagnostics: Diagnostics {
				started_at,
				expansion_mode: "off",
				queries: Vec::new(),
				references: LegalReferences::default(),
				structural_count: 0,
				semantic_count: 0,
				failed_variants: 0,
				timings: StageTimings::default(),
			},
		}
	}

	pub fn is_refusal(&self) -> bool {
		matches!(
			self.evidence,
			Some(EvidenceState::NoCandidates | EvidenceState::CandidatesRejected)
		)
	}

	/// Fragment ids in the order they were cited.
	pub fn grounding_ids(&self) -> Vec<i64> {
		self.grounding.iter().map(|item| item.candidate().id()).collect()
	}

	fn fail(&mut self, err: Error) {
		self.error_kind = Some(err.kind());
		self.error = Some(err.to_string());
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
	#[serde(with = "crate::time_serde")]
	pub started_at: OffsetDateTime,
	pub expansion_mode: &'static str,
	pub queries: Vec<String>,
	pub references: LegalReferences,
	pub structural_count: usize,
	pub semantic_count: usize,
	pub failed_variants: usize,
	pub timings: StageTimings,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
	pub expansion_ms: u64,
	pub retrieval_ms: u64,
	pub rerank_ms: u64,
	pub generation_ms: u64,
	pub total_ms: u64,
}

struct StageRecorder<'a> {
	sink: &'a dyn TraceSink,
	trace_id: Uuid,
	question_hash: String,
	capture_candidates: bool,
}
impl StageRecorder<'_> {
	fn record(
		&self,
		stage: TraceStage,
		started: Instant,
		count: usize,
		ids: impl FnOnce() -> Vec<i64>,
		detail: Option<String>,
	) -> u64 {
		let elapsed_ms = elapsed_ms(started);
		let fragment_ids = self.capture_candidates.then(ids);

		self.sink.record(&TraceEvent {
			trace_id: self.trace_id,
			stage,
			elapsed_ms,
			question_hash: self.question_hash.clone(),
			count,
			fragment_ids,
			detail,
		});

		elapsed_ms
	}
}

impl LuatService {
	/// Retrieves evidence, gates it, and generates a grounded answer.
	pub async fn answer_question(&self, question: &str) -> EvidenceResult {
		self.run_grounding(question, true).await
	}

	/// Same pipeline as [`Self::answer_question`] without the generation step.
	pub async fn ground(&self, question: &str) -> EvidenceResult {
		self.run_grounding(question, false).await
	}

	async fn run_grounding(&self, question: &str, generate: bool) -> EvidenceResult {
		let total = Instant::now();
		let trace_id = Uuid::new_v4();
		let recorder = StageRecorder {
			sink: self.trace.as_ref(),
			trace_id,
			question_hash: trace::hash_question(question),
			capture_candidates: self.cfg.trace.capture_candidates,
		};
		let mut result = EvidenceResult::new(trace_id, OffsetDateTime::now_utc());

		self.run_stages(question, generate, &recorder, &mut result).await;

		result.diagnostics.timings.total_ms = elapsed_ms(total);

		tracing::info!(
			trace_id = %trace_id,
			evidence = result.evidence.map(EvidenceState::as_str).unwrap_or("none"),
			error_kind = ?result.error_kind,
			total_ms = result.diagnostics.timings.total_ms,
			"Question processed."
		);

		result
	}

	async fn run_stages(
		&self,
		question: &str,
		generate: bool,
		recorder: &StageRecorder<'_>,
		result: &mut EvidenceResult,
	) {
		let started = Instant::now();
		let question = question.trim();

		if question.is_empty() {
			recorder.record(TraceStage::Validation, started, 0, Vec::new, Some("empty".to_string()));
			result.fail(Error::InvalidRequest {
				message: "Câu hỏi không được để trống.".to_string(),
			});

			return;
		}

		let started = Instant::now();
		let references = reference::extract_references(question);
		let expanded = self.expand_queries(question).await;
		let plan = QueryPlan::new(question, expanded, references);
		let mode = ExpansionMode::from_config(&self.cfg.expansion);

		result.diagnostics.expansion_mode = mode.as_str();
		result.diagnostics.queries = plan.variants.clone();
		result.diagnostics.references = plan.references.clone();
		result.diagnostics.timings.expansion_ms = recorder.record(
			TraceStage::Expansion,
			started,
			plan.variants.len(),
			Vec::new,
			Some(mode.as_str().to_string()),
		);

		let started = Instant::now();
		let retrieved = match self.retrieve(&plan).await {
			Ok(retrieved) => retrieved,
			Err(err) => {
				result.diagnostics.timings.retrieval_ms = recorder.record(
					TraceStage::Retrieval,
					started,
					0,
					Vec::new,
					Some(err.to_string()),
				);
				result.fail(err);

				return;
			},
		};

		result.diagnostics.structural_count = retrieved.structural_count;
		result.diagnostics.semantic_count = retrieved.semantic_count;
		result.diagnostics.failed_variants = retrieved.failed_variants;
		result.diagnostics.timings.retrieval_ms = recorder.record(
			TraceStage::Retrieval,
			started,
			retrieved.structural_count + retrieved.semantic_count,
			Vec::new,
			Some(format!(
				"structural={} semantic={} failed_variants={}",
				retrieved.structural_count, retrieved.semantic_count, retrieved.failed_variants
			)),
		);

		let candidates = retrieved.candidates;

		recorder.record(
			TraceStage::Merge,
			Instant::now(),
			candidates.len(),
			|| candidates.iter().map(Candidate::id).collect(),
			None,
		);

		let started = Instant::now();
		let grounding = match self.rerank_candidates(&plan, &candidates).await {
			Ok(grounding) => grounding,
			Err(err) => {
				result.diagnostics.timings.rerank_ms = recorder.record(
					TraceStage::Rerank,
					started,
					0,
					Vec::new,
					Some(err.to_string()),
				);
				result.candidates = candidates;
				result.fail(err);

				return;
			},
		};

		result.diagnostics.timings.rerank_ms = recorder.record(
			TraceStage::Rerank,
			started,
			grounding.len(),
			|| grounding.iter().map(|item| item.candidate().id()).collect(),
			None,
		);

		let evidence = Evidence::decide(candidates, grounding);
		let refusal = evidence
			.refusal(&RefusalMessages::from_config(&self.cfg.answer))
			.map(str::to_string);
		let state = evidence.state();

		result.evidence = Some(state);

		recorder.record(
			TraceStage::Gate,
			Instant::now(),
			0,
			Vec::new,
			Some(state.as_str().to_string()),
		);

		match evidence {
			Evidence::NoCandidates => result.answer = refusal,
			Evidence::CandidatesRejected { candidates } => {
				result.candidates = candidates;
				result.answer = refusal;
			},
			Evidence::Grounded { candidates, grounding } => {
				let assembled = context::assemble(&grounding);

				result.candidates = candidates;
				result.citations = assembled.citations;
				result.grounding = grounding;

				if generate {
					self.generate(question, &assembled.context, recorder, result).await;
				}
			},
		}
	}

	async fn generate(
		&self,
		question: &str,
		context: &str,
		recorder: &StageRecorder<'_>,
		result: &mut EvidenceResult,
	) {
		let started = Instant::now();
		let messages = prompt::build_answer_messages(context, question);
		let outcome = self.providers.answer.complete(&self.cfg.providers.llm_answer, &messages).await;
		let detail = outcome.as_ref().err().map(ToString::to_string);

		result.diagnostics.timings.generation_ms = recorder.record(
			TraceStage::Generation,
			started,
			result.citations.len(),
			Vec::new,
			detail,
		);

		match outcome {
			Ok(answer) => result.answer = Some(answer),
			Err(err) => result.fail(Error::Generation { message: err.to_string() }),
		}
	}
}

fn elapsed_ms(started: Instant) -> u64 {
	u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
