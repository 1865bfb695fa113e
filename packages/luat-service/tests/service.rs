use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::Value;

use luat_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use luat_domain::{
	CandidateSource, EvidenceState, Fragment, Locator, NewFragment,
	gate::{REFUSAL_CANDIDATES_REJECTED, REFUSAL_NO_CANDIDATES},
};
use luat_service::{
	BoxFuture, ChatProvider, EmbeddingProvider, Error, ErrorKind, EvidenceResult, FragmentStore,
	LuatService, Providers, RerankProvider, Result, TraceEvent, TraceSink, TraceStage,
};
use luat_storage::{
	memory::{MemoryStore, StoredFragment},
	models::SimilarFragment,
};

const CONFIG_TOML: &str = r#"
[service]
http_bind  = "127.0.0.1:0"
admin_bind = "127.0.0.1:0"
log_level  = "info"

[storage]
backend    = "memory"
vector_dim = 3

[storage.memory]

[providers.embedding]
provider_id = "stub"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/embeddings"
model       = "stub-embedding"
dimensions  = 3
timeout_ms  = 1000

[providers.rerank]
provider_id = "stub"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/rerank"
model       = "stub-rerank"
timeout_ms  = 1000

[providers.llm_expansion]
provider_id = "stub"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/chat/completions"
model       = "stub-expansion"
temperature = 0.2
timeout_ms  = 1000

[providers.llm_answer]
provider_id = "stub"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/chat/completions"
model       = "stub-answer"
temperature = 0.2
timeout_ms  = 1000

[retrieval]
candidate_k          = 10
similarity_threshold = 0.5

[expansion]
mode = "off"

[rerank]
threshold   = 0.6
min_results = 5
query_mode  = "concatenated"
"#;

const MARRIAGE_LAW: &str = "Luật Hôn nhân và gia đình";
const NO_MATCH: [f32; 3] = [0.0, -1.0, 0.0];
const ANSWER_TEXT: &str = "Theo quy định, vợ hoặc chồng có quyền yêu cầu ly hôn.";

fn config_with<F>(edit: F) -> Config
where
	F: FnOnce(&mut Config),
{
	let mut cfg: Config = toml::from_str(CONFIG_TOML).expect("Failed to parse test config.");

	edit(&mut cfg);

	luat_config::validate(&cfg).expect("Test config must be valid.");

	cfg
}

fn content(id: i64) -> String {
	format!("Nội dung quy định của đoạn {id}.")
}

fn stored(id: i64, law_name: &str, locator: Locator, embedding: [f32; 3]) -> StoredFragment {
	StoredFragment {
		fragment: Fragment { id, law_name: law_name.to_string(), locator, content: content(id) },
		embedding: Some(embedding.to_vec()),
	}
}

fn article(chapter: &str, article: i32, clause: Option<i32>) -> Locator {
	Locator {
		chapter: Some(chapter.to_string()),
		article: Some(article),
		clause,
		..Locator::default()
	}
}

fn corpus() -> MemoryStore {
	MemoryStore::from_fragments(
		3,
		vec![
			stored(1, MARRIAGE_LAW, article("Chương IV", 51, Some(1)), [1.0, 0.0, 0.0]),
			stored(2, MARRIAGE_LAW, article("Chương IV", 51, Some(2)), [0.8, 0.6, 0.0]),
			stored(3, MARRIAGE_LAW, article("Chương IV", 56, None), [0.6, 0.8, 0.0]),
			stored(4, "Bộ luật Lao động", article("Chương III", 35, None), [0.0, 1.0, 0.0]),
			stored(5, "Bộ luật Dân sự", article("Chương XIII", 185, None), [0.0, 0.0, 1.0]),
			stored(6, "Luật Đất đai", article("Chương I", 5, None), [0.0, 0.6, 0.8]),
		],
	)
	.expect("Test corpus must be valid.")
}

#[derive(Default)]
struct StubEmbedding {
	vectors: HashMap<String, Vec<f32>>,
	failing: HashSet<String>,
	fail_all: bool,
	calls: AtomicUsize,
}
impl StubEmbedding {
	fn with(mut self, text: &str, vector: [f32; 3]) -> Self {
		self.vectors.insert(text.to_string(), vector.to_vec());

		self
	}

	fn failing_on(mut self, text: &str) -> Self {
		self.failing.insert(text.to_string());

		self
	}
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			texts
				.iter()
				.map(|text| {
					if self.fail_all || self.failing.contains(text) {
						return Err(Error::Provider {
							message: "Embedding service unavailable.".to_string(),
						});
					}

					Ok(self.vectors.get(text).cloned().unwrap_or_else(|| NO_MATCH.to_vec()))
				})
				.collect()
		})
	}
}

#[derive(Default)]
struct StubRerank {
	scores: HashMap<String, f32>,
	fail: bool,
	calls: AtomicUsize,
	last_query: Mutex<Option<String>>,
}
impl StubRerank {
	fn scoring(scores: &[(i64, f32)]) -> Self {
		Self {
			scores: scores.iter().map(|(id, score)| (content(*id), *score)).collect(),
			..Self::default()
		}
	}

	fn last_query(&self) -> Option<String> {
		self.last_query.lock().expect("Rerank query lock must not be poisoned.").clone()
	}
}
impl RerankProvider for StubRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		*self.last_query.lock().expect("Rerank query lock must not be poisoned.") =
			Some(query.to_string());

		Box::pin(async move {
			if self.fail {
				return Err(Error::Provider { message: "Rerank service unavailable.".to_string() });
			}

			Ok(docs.iter().map(|doc| self.scores.get(doc).copied().unwrap_or(0.1)).collect())
		})
	}
}

struct StubChat {
	reply: Option<String>,
	calls: AtomicUsize,
}
impl StubChat {
	fn replying(reply: &str) -> Self {
		Self { reply: Some(reply.to_string()), calls: AtomicUsize::new(0) }
	}

	fn failing() -> Self {
		Self { reply: None, calls: AtomicUsize::new(0) }
	}
}
impl ChatProvider for StubChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			self.reply.clone().ok_or_else(|| Error::Provider {
				message: "Chat service unavailable.".to_string(),
			})
		})
	}
}

#[derive(Default)]
struct RecordingSink {
	events: Mutex<Vec<TraceEvent>>,
}
impl RecordingSink {
	fn stages(&self) -> Vec<TraceStage> {
		self.events().iter().map(|event| event.stage).collect()
	}

	fn events(&self) -> Vec<TraceEvent> {
		self.events.lock().expect("Trace lock must not be poisoned.").clone()
	}
}
impl TraceSink for RecordingSink {
	fn record(&self, event: &TraceEvent) {
		self.events.lock().expect("Trace lock must not be poisoned.").push(event.clone());
	}
}

struct FailingStore;
impl FragmentStore for FailingStore {
	fn search<'a>(
		&'a self,
		_vector: &'a [f32],
		_k: u32,
		_min_similarity: f32,
	) -> BoxFuture<'a, Result<Vec<SimilarFragment>>> {
		Box::pin(async { Ok(Vec::new()) })
	}

	fn exact_match<'a>(
		&'a self,
		_articles: &'a [String],
		_chapters: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Fragment>>> {
		Box::pin(async { Err(Error::Storage { message: "Connection refused.".to_string() }) })
	}

	fn exists<'a>(&'a self, _fragment: &'a NewFragment) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async { Ok(false) })
	}

	fn insert<'a>(
		&'a self,
		_fragment: &'a NewFragment,
		_embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async { Err(Error::Storage { message: "Read-only store.".to_string() }) })
	}

	fn count(&self) -> BoxFuture<'_, Result<i64>> {
		Box::pin(async { Ok(0) })
	}
}

struct Harness {
	service: LuatService,
	embedding: Arc<StubEmbedding>,
	rerank: Arc<StubRerank>,
	expansion: Arc<StubChat>,
	answer: Arc<StubChat>,
}

fn harness(cfg: Config, embedding: StubEmbedding, rerank: StubRerank) -> Harness {
	harness_with(cfg, Arc::new(corpus()), embedding, rerank, StubChat::failing())
}

fn harness_with(
	cfg: Config,
	store: Arc<dyn FragmentStore>,
	embedding: StubEmbedding,
	rerank: StubRerank,
	expansion: StubChat,
) -> Harness {
	let embedding = Arc::new(embedding);
	let rerank = Arc::new(rerank);
	let expansion = Arc::new(expansion);
	let answer = Arc::new(StubChat::replying(ANSWER_TEXT));
	let providers =
		Providers::new(embedding.clone(), rerank.clone(), expansion.clone(), answer.clone());
	let service = LuatService::with_providers(cfg, store, providers);

	Harness { service, embedding, rerank, expansion, answer }
}

fn grounding_ids(result: &EvidenceResult) -> Vec<i64> {
	result.grounding_ids()
}

fn candidate_ids(result: &EvidenceResult) -> Vec<i64> {
	result.candidates.iter().map(|candidate| candidate.id()).collect()
}

const DIVORCE_QUESTION: &str = "Vợ chồng muốn ly hôn thì ai có quyền yêu cầu?";

fn divorce_harness<F>(edit: F, scores: &[(i64, f32)]) -> Harness
where
	F: FnOnce(&mut Config),
{
	harness(
		config_with(edit),
		StubEmbedding::default().with(DIVORCE_QUESTION, [1.0, 0.0, 0.0]),
		StubRerank::scoring(scores),
	)
}

#[tokio::test]
async fn article_reference_is_cited_with_max_confidence() {
	let h = harness(config_with(|_| {}), StubEmbedding::default(), StubRerank::scoring(&[(5, 0.9)]));
	let result = h.service.answer_question("Điều 185 quy định gì?").await;

	assert_eq!(result.error, None);
	assert_eq!(result.evidence, Some(EvidenceState::Grounded));
	assert_eq!(grounding_ids(&result), vec![5]);
	assert_eq!(result.grounding[0].candidate().source(), CandidateSource::Structural);
	assert_eq!(
		result.citations,
		vec!["Bộ luật Dân sự – Điều 185 (độ tương đồng: 100.00%)".to_string()]
	);
	assert_eq!(result.answer.as_deref(), Some(ANSWER_TEXT));
	assert_eq!(result.diagnostics.references.articles, vec!["185".to_string()]);
	assert_eq!(h.answer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unmatched_question_is_refused_without_reranking() {
	let h = harness(config_with(|_| {}), StubEmbedding::default(), StubRerank::default());
	let result = h.service.answer_question("Thủ tục đăng ký kết hôn như thế nào?").await;

	assert_eq!(result.error, None);
	assert_eq!(result.evidence, Some(EvidenceState::NoCandidates));
	assert_eq!(result.answer.as_deref(), Some(REFUSAL_NO_CANDIDATES));
	assert!(result.citations.is_empty());
	assert!(result.grounding.is_empty());
	assert!(result.is_refusal());
	assert_eq!(h.rerank.calls.load(Ordering::SeqCst), 0);
	assert_eq!(h.answer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn three_passing_candidates_are_cited_by_rerank_score() {
	let h = divorce_harness(
		|cfg| cfg.rerank.top_k = Some(5),
		&[(1, 0.7), (2, 0.95), (3, 0.8)],
	);
	let result = h.service.answer_question(DIVORCE_QUESTION).await;

	assert_eq!(result.error, None);
	assert_eq!(candidate_ids(&result), vec![1, 2, 3]);
	assert_eq!(grounding_ids(&result), vec![2, 3, 1]);
	assert_eq!(result.citations.len(), 3);
	assert!(result.citations[0].starts_with("Luật Hôn nhân và gia đình – Điều 51, Khoản 2"));
	assert!(result.citations[0].ends_with("(độ tương đồng: 80.00%)"));

	let scores: Vec<f32> = result.grounding.iter().map(|item| item.rerank_score()).collect();

	assert_eq!(scores, vec![0.95, 0.8, 0.7]);
}

#[tokio::test]
async fn paraphrase_failure_falls_back_to_original_question() {
	let h = divorce_harness(
		|cfg| cfg.expansion.mode = "paraphrase".to_string(),
		&[(1, 0.9), (2, 0.9), (3, 0.9)],
	);
	let result = h.service.answer_question(DIVORCE_QUESTION).await;

	assert_eq!(result.error, None);
	assert_eq!(result.error_kind, None);
	assert_eq!(result.diagnostics.queries, vec![DIVORCE_QUESTION.to_string()]);
	assert_eq!(result.diagnostics.expansion_mode, "paraphrase");
	assert_eq!(result.evidence, Some(EvidenceState::Grounded));
	assert_eq!(h.expansion.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_paraphrase_json_falls_back_to_original_question() {
	let cfg = config_with(|cfg| cfg.expansion.mode = "paraphrase".to_string());
	let expansion = StubChat::replying(
		"Đây là kết quả:\n```json\n{\"queries\": [\"Thủ tục ly hôn\", \"Điều kiện ly hôn\",]}\n```",
	);
	let h = harness_with(
		cfg,
		Arc::new(corpus()),
		StubEmbedding::default().with(DIVORCE_QUESTION, [1.0, 0.0, 0.0]),
		StubRerank::scoring(&[(1, 0.9)]),
		expansion,
	);
	let result = h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(result.error, None);
	assert_eq!(result.diagnostics.queries, vec![DIVORCE_QUESTION.to_string()]);
	assert_eq!(result.diagnostics.failed_variants, 0);
	assert_eq!(h.embedding.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn structural_and_semantic_hits_are_deduplicated() {
	let question = "Điều 51 quy định ai có quyền yêu cầu ly hôn?";
	let h = harness(
		config_with(|_| {}),
		StubEmbedding::default().with(question, [1.0, 0.0, 0.0]),
		StubRerank::scoring(&[(1, 0.9), (2, 0.9), (3, 0.9)]),
	);
	let result = h.service.ground(question).await;
	let sources: Vec<CandidateSource> =
		result.candidates.iter().map(|candidate| candidate.source()).collect();

	assert_eq!(candidate_ids(&result), vec![1, 2, 3]);
	assert_eq!(
		sources,
		vec![CandidateSource::Structural, CandidateSource::Structural, CandidateSource::Semantic]
	);
	assert_eq!(result.diagnostics.structural_count, 2);
	assert_eq!(result.diagnostics.semantic_count, 3);
}

#[tokio::test]
async fn low_scores_fall_back_to_minimum_results() {
	let h = divorce_harness(|cfg| cfg.retrieval.similarity_threshold = -1.0, &[]);
	let result = h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(result.candidates.len(), 6);
	assert_eq!(result.grounding.len(), 5);
	assert_eq!(result.citations.len(), 5);
	assert_eq!(result.evidence, Some(EvidenceState::Grounded));
}

#[tokio::test]
async fn top_k_caps_grounding() {
	let h = divorce_harness(
		|cfg| cfg.rerank.top_k = Some(2),
		&[(1, 0.7), (2, 0.95), (3, 0.8)],
	);
	let result = h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(grounding_ids(&result), vec![2, 3]);
	assert_eq!(result.citations.len(), 2);
}

#[tokio::test]
async fn rejected_candidates_are_refused_when_fallback_is_disabled() {
	let h = divorce_harness(|cfg| cfg.rerank.min_results = 0, &[]);
	let result = h.service.answer_question(DIVORCE_QUESTION).await;

	assert_eq!(result.error, None);
	assert_eq!(result.evidence, Some(EvidenceState::CandidatesRejected));
	assert_eq!(result.answer.as_deref(), Some(REFUSAL_CANDIDATES_REJECTED));
	assert_eq!(candidate_ids(&result), vec![1, 2, 3]);
	assert!(result.citations.is_empty());
	assert!(result.grounding.is_empty());
	assert_eq!(h.answer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refusal_messages_follow_configuration() {
	let h = harness(
		config_with(|cfg| cfg.answer.refusal_no_candidates = Some("Không có dữ liệu.".to_string())),
		StubEmbedding::default(),
		StubRerank::default(),
	);
	let result = h.service.answer_question("Thủ tục đăng ký kết hôn?").await;

	assert_eq!(result.answer.as_deref(), Some("Không có dữ liệu."));
}

#[tokio::test]
async fn grounding_is_repeatable() {
	let h = divorce_harness(|cfg| cfg.retrieval.similarity_threshold = -1.0, &[(4, 0.9)]);
	let first = h.service.ground(DIVORCE_QUESTION).await;
	let second = h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(grounding_ids(&first), grounding_ids(&second));
	assert_eq!(first.citations, second.citations);
	assert_eq!(candidate_ids(&first), candidate_ids(&second));
	assert_ne!(first.trace_id, second.trace_id);
}

#[tokio::test]
async fn ground_skips_generation() {
	let h = divorce_harness(|_| {}, &[(1, 0.9)]);
	let result = h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(result.evidence, Some(EvidenceState::Grounded));
	assert_eq!(result.answer, None);
	assert_eq!(h.answer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_question_is_a_validation_error() {
	let h = harness(config_with(|_| {}), StubEmbedding::default(), StubRerank::default());
	let result = h.service.answer_question("   \n").await;

	assert_eq!(result.error_kind, Some(ErrorKind::Validation));
	assert!(result.error.is_some());
	assert_eq!(result.evidence, None);
	assert_eq!(h.embedding.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generation_failure_keeps_citations() {
	let embedding = StubEmbedding::default().with(DIVORCE_QUESTION, [1.0, 0.0, 0.0]);
	let mut h = harness(config_with(|_| {}), embedding, StubRerank::scoring(&[(1, 0.9)]));
	let answer = Arc::new(StubChat::failing());

	h.service.providers.answer = answer.clone();

	let result = h.service.answer_question(DIVORCE_QUESTION).await;

	assert_eq!(result.error_kind, Some(ErrorKind::Generation));
	assert_eq!(result.answer, None);
	assert_eq!(result.citations.len(), 3);
	assert_eq!(result.grounding.len(), 3);
	assert_eq!(answer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn all_variants_failing_is_a_retrieval_error() {
	let embedding = StubEmbedding { fail_all: true, ..StubEmbedding::default() };
	let h = harness(config_with(|_| {}), embedding, StubRerank::default());
	let result = h.service.answer_question(DIVORCE_QUESTION).await;

	assert_eq!(result.error_kind, Some(ErrorKind::Retrieval));
	assert_eq!(result.evidence, None);
	assert_eq!(h.rerank.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_variant_is_dropped_and_counted() {
	let cfg = config_with(|cfg| cfg.expansion.mode = "paraphrase".to_string());
	let embedding = StubEmbedding::default()
		.with(DIVORCE_QUESTION, [1.0, 0.0, 0.0])
		.failing_on("Điều kiện ly hôn đơn phương");
	let expansion =
		StubChat::replying(r#"{"queries": ["Điều kiện ly hôn đơn phương", "Ai được yêu cầu ly hôn"]}"#);
	let h = harness_with(
		cfg,
		Arc::new(corpus()),
		embedding,
		StubRerank::scoring(&[(1, 0.9)]),
		expansion,
	);
	let result = h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(result.error, None);
	assert_eq!(result.diagnostics.queries.len(), 3);
	assert_eq!(result.diagnostics.failed_variants, 1);
	assert_eq!(candidate_ids(&result), vec![1, 2, 3]);
}

#[tokio::test]
async fn rerank_failure_reports_candidates() {
	let rerank = StubRerank { fail: true, ..StubRerank::default() };
	let h = harness(
		config_with(|_| {}),
		StubEmbedding::default().with(DIVORCE_QUESTION, [1.0, 0.0, 0.0]),
		rerank,
	);
	let result = h.service.answer_question(DIVORCE_QUESTION).await;

	assert_eq!(result.error_kind, Some(ErrorKind::Retrieval));
	assert_eq!(candidate_ids(&result), vec![1, 2, 3]);
	assert!(result.grounding.is_empty());
	assert!(result.citations.is_empty());
}

#[tokio::test]
async fn structural_lookup_failure_is_a_retrieval_error() {
	let h = harness_with(
		config_with(|_| {}),
		Arc::new(FailingStore),
		StubEmbedding::default(),
		StubRerank::default(),
		StubChat::failing(),
	);
	let result = h.service.answer_question("Điều 5 quy định gì?").await;

	assert_eq!(result.error_kind, Some(ErrorKind::Retrieval));
	assert!(result.error.as_deref().unwrap_or_default().contains("Structural lookup failed"));
}

#[tokio::test]
async fn keyword_expansion_feeds_the_concatenated_rerank_query() {
	let cfg = config_with(|cfg| cfg.expansion.mode = "keywords".to_string());
	let h = harness_with(
		cfg,
		Arc::new(corpus()),
		StubEmbedding::default().with(DIVORCE_QUESTION, [1.0, 0.0, 0.0]),
		StubRerank::scoring(&[(1, 0.9)]),
		StubChat::replying("ly hôn, quyền yêu cầu"),
	);
	let result = h.service.ground(DIVORCE_QUESTION).await;
	let augmented = format!("{DIVORCE_QUESTION} ly hôn, quyền yêu cầu");

	assert_eq!(result.diagnostics.queries, vec![DIVORCE_QUESTION.to_string(), augmented.clone()]);
	assert_eq!(h.rerank.last_query(), Some(format!("{DIVORCE_QUESTION} {augmented}")));
}

#[tokio::test]
async fn original_query_mode_reranks_with_the_question() {
	let cfg = config_with(|cfg| {
		cfg.expansion.mode = "keywords".to_string();
		cfg.rerank.query_mode = "original".to_string();
	});
	let h = harness_with(
		cfg,
		Arc::new(corpus()),
		StubEmbedding::default().with(DIVORCE_QUESTION, [1.0, 0.0, 0.0]),
		StubRerank::scoring(&[(1, 0.9)]),
		StubChat::replying("ly hôn"),
	);

	h.service.ground(DIVORCE_QUESTION).await;

	assert_eq!(h.rerank.last_query(), Some(DIVORCE_QUESTION.to_string()));
}

#[tokio::test]
async fn trace_events_cover_each_stage() {
	let sink = Arc::new(RecordingSink::default());
	let h = divorce_harness(|_| {}, &[(1, 0.9)]);
	let service = h.service.with_trace_sink(sink.clone());
	let result = service.answer_question(DIVORCE_QUESTION).await;
	let events = sink.events();

	assert_eq!(
		sink.stages(),
		vec![
			TraceStage::Expansion,
			TraceStage::Retrieval,
			TraceStage::Merge,
			TraceStage::Rerank,
			TraceStage::Gate,
			TraceStage::Generation,
		]
	);
	assert!(events.iter().all(|event| event.trace_id == result.trace_id));
	assert!(events.iter().all(|event| event.fragment_ids.is_none()));
	assert_eq!(events[0].question_hash.len(), 64);
}

#[tokio::test]
async fn trace_captures_candidate_ids_when_enabled() {
	let sink = Arc::new(RecordingSink::default());
	let h = divorce_harness(|cfg| cfg.trace.capture_candidates = true, &[(1, 0.9)]);
	let service = h.service.with_trace_sink(sink.clone());

	service.ground(DIVORCE_QUESTION).await;

	let merge = sink
		.events()
		.into_iter()
		.find(|event| event.stage == TraceStage::Merge)
		.expect("Merge event must be recorded.");

	assert_eq!(merge.fragment_ids, Some(vec![1, 2, 3]));
	assert_eq!(merge.count, 3);
}

fn new_fragment(article: i32, clause: Option<i32>, content: &str) -> NewFragment {
	NewFragment {
		law_name: MARRIAGE_LAW.to_string(),
		locator: Locator { article: Some(article), clause, ..Locator::default() },
		content: content.to_string(),
	}
}

#[tokio::test]
async fn ingest_validates_skips_and_inserts() {
	let store = Arc::new(MemoryStore::new(3));
	let h = harness_with(
		config_with(|cfg| cfg.ingest.batch_size = 1),
		store.clone(),
		StubEmbedding::default(),
		StubRerank::default(),
		StubChat::failing(),
	);
	let fragments = vec![
		new_fragment(51, Some(1), "Vợ, chồng có quyền yêu cầu Tòa án giải quyết việc ly hôn."),
		new_fragment(51, Some(2), "   "),
		new_fragment(51, Some(1), "Vợ, chồng có quyền yêu cầu Tòa án giải quyết việc ly hôn."),
		new_fragment(56, None, "Ly hôn theo yêu cầu của một bên."),
	];
	let report = h.service.ingest(fragments.clone()).await.expect("Ingest must succeed.");

	assert_eq!(report.inserted, vec![1, 2]);
	assert_eq!(report.skipped, 1);
	assert_eq!(report.rejected.len(), 1);
	assert_eq!(report.rejected[0].index, 1);
	assert_eq!(report.rejected[0].reason, "REJECT_EMPTY_CONTENT");
	assert_eq!(store.count(), 2);

	let again = h.service.ingest(fragments).await.expect("Ingest must succeed.");

	assert!(again.inserted.is_empty());
	assert_eq!(again.skipped, 3);
	assert_eq!(store.count(), 2);
}

#[tokio::test]
async fn ingest_rejects_wrong_embedding_dimensions() {
	let content = "Ly hôn theo yêu cầu của một bên.";
	let embedding = StubEmbedding {
		vectors: HashMap::from([(content.to_string(), vec![1.0])]),
		..StubEmbedding::default()
	};
	let h = harness_with(
		config_with(|_| {}),
		Arc::new(MemoryStore::new(3)),
		embedding,
		StubRerank::default(),
		StubChat::failing(),
	);
	let err = h
		.service
		.ingest(vec![new_fragment(56, None, content)])
		.await
		.expect_err("Dimension mismatch must fail.");

	assert_eq!(err.kind(), ErrorKind::Retrieval);
	assert!(err.to_string().contains("dimension mismatch"));
}

#[tokio::test]
async fn ingest_failure_reports_fragments_already_inserted() {
	let failing = "Ly hôn theo yêu cầu của một bên.";
	let store = Arc::new(MemoryStore::new(3));
	let h = harness_with(
		config_with(|cfg| cfg.ingest.batch_size = 1),
		store.clone(),
		StubEmbedding::default().failing_on(failing),
		StubRerank::default(),
		StubChat::failing(),
	);
	let fragments = vec![
		new_fragment(51, Some(1), "Vợ, chồng có quyền yêu cầu Tòa án giải quyết việc ly hôn."),
		new_fragment(56, None, failing),
	];
	let err = h.service.ingest(fragments).await.expect_err("Embedding failure must fail.");

	assert_eq!(err.kind(), ErrorKind::Retrieval);
	assert!(err.to_string().contains("Fragments inserted before the failure: 1."));
	assert_eq!(store.count(), 1);
}

