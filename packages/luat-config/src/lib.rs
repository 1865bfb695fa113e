mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Answer, Config, EmbeddingProviderConfig, Expansion, Ingest, LlmProviderConfig, MemoryStorage,
	Postgres, ProviderConfig, Providers, Rerank, Retrieval, Service, Storage, Trace,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}

	match cfg.storage.backend.as_str() {
		"postgres" => {
			let Some(postgres) = cfg.storage.postgres.as_ref() else {
				return Err(Error::Validation {
					message: "storage.postgres is required when storage.backend is postgres."
						.to_string(),
				});
			};

			if postgres.dsn.trim().is_empty() {
				return Err(Error::Validation {
					message: "storage.postgres.dsn must be non-empty.".to_string(),
				});
			}
			if postgres.pool_max_conns == 0 {
				return Err(Error::Validation {
					message: "storage.postgres.pool_max_conns must be greater than zero."
						.to_string(),
				});
			}
		},
		"memory" =>
			if cfg.storage.memory.is_none() {
				return Err(Error::Validation {
					message: "storage.memory is required when storage.backend is memory."
						.to_string(),
				});
			},
		_ => {
			return Err(Error::Validation {
				message: "storage.backend must be one of postgres or memory.".to_string(),
			});
		},
	}

	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.vector_dim.".to_string(),
		});
	}
	if cfg.retrieval.candidate_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.retrieval.similarity_threshold.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.similarity_threshold must be a finite number.".to_string(),
		});
	}
	if !(-1.0..=1.0).contains(&cfg.retrieval.similarity_threshold) {
		return Err(Error::Validation {
			message: "retrieval.similarity_threshold must be in the range -1.0-1.0.".to_string(),
		});
	}
	if !matches!(cfg.expansion.mode.as_str(), "off" | "keywords" | "paraphrase") {
		return Err(Error::Validation {
			message: "expansion.mode must be one of off, keywords, or paraphrase.".to_string(),
		});
	}
	if cfg.expansion.max_paraphrases == 0 {
		return Err(Error::Validation {
			message: "expansion.max_paraphrases must be greater than zero.".to_string(),
		});
	}
	if !cfg.rerank.threshold.is_finite() {
		return Err(Error::Validation {
			message: "rerank.threshold must be a finite number.".to_string(),
		});
	}
	if cfg.rerank.top_k == Some(0) {
		return Err(Error::Validation {
			message: "rerank.top_k must be greater than zero when set.".to_string(),
		});
	}
	if !matches!(cfg.rerank.query_mode.as_str(), "original" | "concatenated") {
		return Err(Error::Validation {
			message: "rerank.query_mode must be one of original or concatenated.".to_string(),
		});
	}
	if cfg.ingest.batch_size == 0 {
		return Err(Error::Validation {
			message: "ingest.batch_size must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("llm_expansion", &cfg.providers.llm_expansion.api_key),
		("llm_answer", &cfg.providers.llm_answer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	for (label, temperature) in [
		("llm_expansion", cfg.providers.llm_expansion.temperature),
		("llm_answer", cfg.providers.llm_answer.temperature),
	] {
		if !temperature.is_finite() || temperature < 0.0 {
			return Err(Error::Validation {
				message: format!("Provider {label} temperature must be zero or greater."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.answer.refusal_no_candidates.as_deref().map(|text| text.trim().is_empty()).unwrap_or(false)
	{
		cfg.answer.refusal_no_candidates = None;
	}
	if cfg
		.answer
		.refusal_candidates_rejected
		.as_deref()
		.map(|text| text.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.answer.refusal_candidates_rejected = None;
	}
	if cfg
		.storage
		.memory
		.as_ref()
		.and_then(|memory| memory.corpus_path.as_ref())
		.map(|path| path.as_os_str().is_empty())
		.unwrap_or(false)
		&& let Some(memory) = cfg.storage.memory.as_mut()
	{
		memory.corpus_path = None;
	}
}
