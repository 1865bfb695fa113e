use serde::{Deserialize, Serialize};

use luat_domain::NewFragment;

use crate::{Error, LuatService, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
	/// Ids assigned to new fragments, in input order.
	pub inserted: Vec<i64>,
	/// Fragments already present in the store.
	pub skipped: usize,
	pub rejected: Vec<IngestRejection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRejection {
	/// Position in the submitted batch.
	pub index: usize,
	pub reason: String,
}

impl LuatService {
	/// Stores pre-structured fragments with their embeddings.
	pub async fn ingest(&self, fragments: Vec<NewFragment>) -> Result<IngestReport> {
		let mut report = IngestReport::default();
		let mut pending = Vec::new();

		for (index, fragment) in fragments.into_iter().enumerate() {
			if let Err(reject) = fragment.validate() {
				report.rejected.push(IngestRejection { index, reason: reject.as_str().to_string() });

				continue;
			}
			if self.store.exists(&fragment).await? {
				report.skipped += 1;

				continue;
			}

			pending.push(fragment);
		}

		let batch_size = self.cfg.ingest.batch_size.max(1) as usize;

		for batch in pending.chunks(batch_size) {
			if let Err(err) = self.store_batch(batch, &mut report).await {
				if report.inserted.is_empty() {
					return Err(err);
				}

				tracing::warn!(
					error = %err,
					inserted = ?report.inserted,
					"Ingest stopped after a partial write."
				);

				return Err(err.after_inserting(report.inserted.len()));
			}
		}

		tracing::info!(
			inserted = report.inserted.len(),
			skipped = report.skipped,
			rejected = report.rejected.len(),
			"Fragments ingested."
		);

		Ok(report)
	}

	async fn store_batch(&self, batch: &[NewFragment], report: &mut IngestReport) -> Result<()> {
		let texts: Vec<String> = batch.iter().map(|fragment| fragment.content.clone()).collect();
		let embeddings =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if embeddings.len() != batch.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} fragments.",
					embeddings.len(),
					batch.len()
				),
			});
		}

		for (fragment, embedding) in batch.iter().zip(embeddings.iter()) {
			if embedding.len() != self.cfg.storage.vector_dim as usize {
				return Err(Error::Provider {
					message: format!(
						"Embedding dimension mismatch: expected {}, got {}.",
						self.cfg.storage.vector_dim,
						embedding.len()
					),
				});
			}
			// Duplicates inside one submission are caught here.
			if self.store.exists(fragment).await? {
				report.skipped += 1;

				continue;
			}

			let id = self.store.insert(fragment, embedding).await?;

			report.inserted.push(id);
		}

		Ok(())
	}
}
