use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub expansion: Expansion,
	pub rerank: Rerank,
	#[serde(default)]
	pub answer: Answer,
	#[serde(default)]
	pub trace: Trace,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	/// Either "postgres" or "memory".
	pub backend: String,
	pub vector_dim: u32,
	pub postgres: Option<Postgres>,
	pub memory: Option<MemoryStorage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStorage {
	/// Optional JSONL snapshot; each line is one fragment with its embedding.
	pub corpus_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub llm_expansion: LlmProviderConfig,
	pub llm_answer: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	/// Nearest neighbours fetched per query variant before thresholding.
	pub candidate_k: u32,
	pub similarity_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Expansion {
	/// One of "off", "keywords", or "paraphrase".
	pub mode: String,
	#[serde(default = "default_max_paraphrases")]
	pub max_paraphrases: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rerank {
	pub threshold: f32,
	/// Fallback size when too few candidates clear the threshold. Zero disables the fallback.
	#[serde(default = "default_min_results")]
	pub min_results: u32,
	pub top_k: Option<u32>,
	/// Either "original" or "concatenated".
	#[serde(default = "default_rerank_query_mode")]
	pub query_mode: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Answer {
	pub refusal_no_candidates: Option<String>,
	pub refusal_candidates_rejected: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Trace {
	pub enabled: bool,
	pub capture_candidates: bool,
}
impl Default for Trace {
	fn default() -> Self {
		Self { enabled: true, capture_candidates: false }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ingest {
	pub batch_size: u32,
}
impl Default for Ingest {
	fn default() -> Self {
		Self { batch_size: 32 }
	}
}

fn default_max_paraphrases() -> u32 {
	5
}

fn default_min_results() -> u32 {
	5
}

fn default_rerank_query_mode() -> String {
	"concatenated".to_string()
}
