use std::sync::Arc;

use luat_config::Config;
use luat_domain::{Fragment, NewFragment};
use luat_storage::{
	db::Db,
	memory::MemoryStore,
	models::{FragmentRow, SimilarFragment},
	queries,
};

use crate::{BoxFuture, Error, Result};

/// Nearest-neighbour and exact-match access to the fragment corpus.
pub trait FragmentStore
where
	Self: Send + Sync,
{
	/// Up to `k` fragments with similarity at or above `min_similarity`, most similar first.
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: u32,
		min_similarity: f32,
	) -> BoxFuture<'a, Result<Vec<SimilarFragment>>>;

	/// Ordered by article, then clause.
	fn exact_match<'a>(
		&'a self,
		articles: &'a [String],
		chapters: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Fragment>>>;

	fn exists<'a>(&'a self, fragment: &'a NewFragment) -> BoxFuture<'a, Result<bool>>;

	fn insert<'a>(
		&'a self,
		fragment: &'a NewFragment,
		embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>>;

	fn count(&self) -> BoxFuture<'_, Result<i64>>;
}

impl FragmentStore for Db {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: u32,
		min_similarity: f32,
	) -> BoxFuture<'a, Result<Vec<SimilarFragment>>> {
		Box::pin(async move { Ok(queries::vector_search(self, vector, k, min_similarity).await?) })
	}

	fn exact_match<'a>(
		&'a self,
		articles: &'a [String],
		chapters: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Fragment>>> {
		Box::pin(async move {
			let rows = queries::structural_lookup(self, articles, chapters).await?;

			Ok(rows.into_iter().map(FragmentRow::into_fragment).collect())
		})
	}

	fn exists<'a>(&'a self, fragment: &'a NewFragment) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::fragment_exists(self, fragment).await?) })
	}

	fn insert<'a>(
		&'a self,
		fragment: &'a NewFragment,
		embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move { Ok(queries::insert_fragment(self, fragment, embedding).await?) })
	}

	fn count(&self) -> BoxFuture<'_, Result<i64>> {
		Box::pin(async move { Ok(queries::count_fragments(self).await?) })
	}
}

impl FragmentStore for MemoryStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		k: u32,
		min_similarity: f32,
	) -> BoxFuture<'a, Result<Vec<SimilarFragment>>> {
		Box::pin(async move { Ok(self.vector_search(vector, k, min_similarity)?) })
	}

	fn exact_match<'a>(
		&'a self,
		articles: &'a [String],
		chapters: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Fragment>>> {
		Box::pin(async move { Ok(self.structural_lookup(articles, chapters)) })
	}

	fn exists<'a>(&'a self, fragment: &'a NewFragment) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(MemoryStore::exists(self, fragment)) })
	}

	fn insert<'a>(
		&'a self,
		fragment: &'a NewFragment,
		embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move { Ok(MemoryStore::insert(self, fragment.clone(), embedding.to_vec())?) })
	}

	fn count(&self) -> BoxFuture<'_, Result<i64>> {
		Box::pin(async move { Ok(MemoryStore::count(self)) })
	}
}

pub async fn open_store(cfg: &Config) -> Result<Arc<dyn FragmentStore>> {
	match cfg.storage.backend.as_str() {
		"postgres" => {
			let postgres = cfg.storage.postgres.as_ref().ok_or_else(|| Error::Storage {
				message: "storage.postgres is not configured.".to_string(),
			})?;
			let db = Db::connect(postgres).await?;

			db.ensure_schema(cfg.storage.vector_dim).await?;

			Ok(Arc::new(db))
		},
		"memory" => {
			let corpus_path = cfg.storage.memory.as_ref().and_then(|memory| memory.corpus_path.as_ref());
			let store = match corpus_path {
				Some(path) => MemoryStore::load_jsonl(path, cfg.storage.vector_dim)?,
				None => MemoryStore::new(cfg.storage.vector_dim),
			};

			Ok(Arc::new(store))
		},
		other => Err(Error::Storage { message: format!("Unsupported storage backend {other:?}.") }),
	}
}
