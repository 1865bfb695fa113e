pub mod answer;
pub mod expansion;
pub mod ingest;
pub mod prompt;
pub mod retrieval;
pub mod store;
pub mod time_serde;
pub mod trace;

mod error;
mod rerank;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use answer::{Diagnostics, EvidenceResult, StageTimings};
pub use error::{Error, ErrorKind, Result};
pub use ingest::{IngestRejection, IngestReport};
pub use store::FragmentStore;
pub use trace::{LogSink, NoopSink, TraceEvent, TraceSink, TraceStage};

use luat_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use luat_providers::{chat, embedding, rerank as rerank_provider};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	/// Generates keyword or paraphrase expansions.
	pub expansion: Arc<dyn ChatProvider>,
	/// Writes the grounded answer.
	pub answer: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		expansion: Arc<dyn ChatProvider>,
		answer: Arc<dyn ChatProvider>,
	) -> Self {
		Self { embedding, rerank, expansion, answer }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			rerank: provider.clone(),
			expansion: provider.clone(),
			answer: provider,
		}
	}
}

/// Built once at startup and shared across requests.
pub struct LuatService {
	pub cfg: Config,
	pub store: Arc<dyn FragmentStore>,
	pub providers: Providers,
	pub trace: Arc<dyn TraceSink>,
}
impl LuatService {
	pub fn new(cfg: Config, store: Arc<dyn FragmentStore>) -> Self {
		Self::with_providers(cfg, store, Providers::default())
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn FragmentStore>, providers: Providers) -> Self {
		let trace: Arc<dyn TraceSink> =
			if cfg.trace.enabled { Arc::new(LogSink) } else { Arc::new(NoopSink) };

		Self { cfg, store, providers, trace }
	}

	pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
		self.trace = trace;

		self
	}

	/// Opens the configured store and wires the HTTP providers.
	pub async fn open(cfg: Config) -> Result<Self> {
		let store = store::open_store(&cfg).await?;

		Ok(Self::new(cfg, store))
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank_provider::rerank(cfg, query, docs).await?) })
	}
}
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(cfg, messages).await?) })
	}
}
