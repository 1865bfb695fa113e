use luat_domain::{Candidate, QueryPlan, RerankPolicy, RerankQueryMode, ScoredCandidate};

use crate::{Error, LuatService, Result};

impl LuatService {
	pub(crate) async fn rerank_candidates(
		&self,
		plan: &QueryPlan,
		candidates: &[Candidate],
	) -> Result<Vec<ScoredCandidate>> {
		if candidates.is_empty() {
			return Ok(Vec::new());
		}

		let query = plan.representative_query(RerankQueryMode::from_config(&self.cfg.rerank));
		let docs: Vec<String> =
			candidates.iter().map(|candidate| candidate.fragment().content.clone()).collect();
		let scores = self
			.providers
			.rerank
			.rerank(&self.cfg.providers.rerank, &query, &docs)
			.await
			.map_err(|err| Error::Retrieval { message: format!("Rerank failed: {err}") })?;
		let policy = RerankPolicy::from_config(&self.cfg.rerank);

		policy.apply(candidates.to_vec(), &scores).map_err(|mismatch| Error::Provider {
			message: format!(
				"Rerank provider returned {} scores for {} candidates.",
				mismatch.actual, mismatch.expected
			),
		})
	}
}
