use luat_domain::{Candidate, LegalReferences, QueryPlan, merge::merge_candidates};

use crate::{Error, LuatService, Result};

/// Merged candidates of one invocation, before reranking.
#[derive(Debug, Clone, Default)]
pub struct Retrieved {
	pub candidates: Vec<Candidate>,
	pub structural_count: usize,
	pub semantic_count: usize,
	/// Query variants whose embedding or search failed.
	pub failed_variants: usize,
}

impl LuatService {
	/// Structural lookup and the semantic fan-out run concurrently, then merge.
	pub async fn retrieve(&self, plan: &QueryPlan) -> Result<Retrieved> {
		let (structural, semantic) = futures::join!(
			self.structural_candidates(&plan.references),
			self.semantic_candidates(&plan.variants)
		);
		let structural = structural?;
		let (semantic, failed_variants) = semantic?;
		let structural_count = structural.len();
		let semantic_count = semantic.len();
		let candidates = merge_candidates(structural, semantic);

		Ok(Retrieved { candidates, structural_count, semantic_count, failed_variants })
	}

	pub async fn structural_candidates(
		&self,
		references: &LegalReferences,
	) -> Result<Vec<Candidate>> {
		if references.is_empty() {
			return Ok(Vec::new());
		}

		let fragments = self
			.store
			.exact_match(&references.articles, &references.chapters)
			.await
			.map_err(|err| Error::Retrieval { message: format!("Structural lookup failed: {err}") })?;

		Ok(fragments.into_iter().map(Candidate::structural).collect())
	}

	/// Pooled hits of every variant in variant order, plus the number of failed variants.
	async fn semantic_candidates(&self, variants: &[String]) -> Result<(Vec<Candidate>, usize)> {
		if variants.is_empty() {
			return Ok((Vec::new(), 0));
		}

		let searches = variants.iter().map(|variant| self.search_variant(variant));
		let results = futures::future::join_all(searches).await;
		let mut pooled = Vec::new();
		let mut failed = 0_usize;

		for (variant, result) in variants.iter().zip(results) {
			match result {
				Ok(candidates) => pooled.extend(candidates),
				Err(err) => {
					failed += 1;

					tracing::warn!(error = %err, variant = %variant, "Dropping failed query variant.");
				},
			}
		}

		if failed == variants.len() {
			return Err(Error::Retrieval {
				message: format!("All {failed} query variants failed semantic search."),
			});
		}

		Ok((pooled, failed))
	}

	async fn search_variant(&self, variant: &str) -> Result<Vec<Candidate>> {
		let texts = vec![variant.to_string()];
		let embeddings = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let Some(vector) = embeddings.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.vector_dim as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch: expected {}, got {}.",
					self.cfg.storage.vector_dim,
					vector.len()
				),
			});
		}

		let hits = self
			.store
			.search(
				&vector,
				self.cfg.retrieval.candidate_k,
				self.cfg.retrieval.similarity_threshold,
			)
			.await?;

		Ok(hits.into_iter().map(|hit| Candidate::semantic(hit.fragment, hit.similarity)).collect())
	}
}
