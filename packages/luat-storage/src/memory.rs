use std::{
	cmp::Ordering,
	collections::HashSet,
	fs,
	path::Path,
	sync::{PoisonError, RwLock},
};

use serde::Deserialize;

use luat_domain::{Fragment, NewFragment, rerank::cmp_f32_desc};

use crate::{Error, Result, models::SimilarFragment};

/// One line of a JSONL corpus snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredFragment {
	#[serde(flatten)]
	pub fragment: Fragment,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}

/// In-process fragment store with the same query semantics as the Postgres tables.
pub struct MemoryStore {
	vector_dim: usize,
	rows: RwLock<Vec<StoredFragment>>,
}
impl MemoryStore {
	pub fn new(vector_dim: u32) -> Self {
		Self { vector_dim: vector_dim as usize, rows: RwLock::new(Vec::new()) }
	}

	pub fn from_fragments(vector_dim: u32, fragments: Vec<StoredFragment>) -> Result<Self> {
		let store = Self::new(vector_dim);
		let mut seen = HashSet::new();

		for (index, stored) in fragments.iter().enumerate() {
			store.check_stored(index + 1, stored)?;

			if !seen.insert(stored.fragment.id) {
				return Err(Error::InvalidCorpus {
					line: index + 1,
					message: format!("Duplicate fragment id {}.", stored.fragment.id),
				});
			}
		}

		*store.rows.write().unwrap_or_else(PoisonError::into_inner) = fragments;

		Ok(store)
	}

	/// Loads a JSONL snapshot. Blank lines are skipped.
	pub fn load_jsonl(path: &Path, vector_dim: u32) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|source| Error::ReadCorpus { path: path.to_path_buf(), source })?;
		let mut fragments = Vec::new();

		for (index, line) in raw.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}

			let stored: StoredFragment = serde_json::from_str(line)
				.map_err(|err| Error::InvalidCorpus { line: index + 1, message: err.to_string() })?;

			fragments.push(stored);
		}

		let store = Self::from_fragments(vector_dim, fragments)?;

		tracing::info!(path = %path.display(), fragments = store.count(), "Corpus loaded.");

		Ok(store)
	}

	pub fn vector_search(
		&self,
		vector: &[f32],
		k: u32,
		min_similarity: f32,
	) -> Result<Vec<SimilarFragment>> {
		if vector.len() != self.vector_dim {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
		let mut scored: Vec<SimilarFragment> = rows
			.iter()
			.filter_map(|stored| {
				let embedding = stored.embedding.as_deref()?;
				let similarity = cosine_similarity(vector, embedding)?;

				Some(SimilarFragment { fragment: stored.fragment.clone(), similarity })
			})
			.collect();

		scored.sort_by(|a, b| {
			cmp_f32_desc(a.similarity, b.similarity).then_with(|| a.fragment.id.cmp(&b.fragment.id))
		});
		scored.truncate(k as usize);
		scored.retain(|item| item.similarity >= min_similarity);

		Ok(scored)
	}

	pub fn structural_lookup(&self, articles: &[String], chapters: &[String]) -> Vec<Fragment> {
		if articles.is_empty() && chapters.is_empty() {
			return Vec::new();
		}

		let needles: Vec<String> = chapters.iter().map(|chapter| chapter.to_lowercase()).collect();
		let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
		let mut out: Vec<Fragment> = rows
			.iter()
			.map(|stored| &stored.fragment)
			.filter(|fragment| {
				let locator = &fragment.locator;
				let article_hit = locator
					.article
					.map(|article| articles.contains(&article.to_string()))
					.unwrap_or(false);
				let chapter_hit = locator
					.chapter
					.as_deref()
					.map(|chapter| {
						let chapter = chapter.to_lowercase();

						needles.iter().any(|needle| chapter.contains(needle.as_str()))
					})
					.unwrap_or(false);

				article_hit || chapter_hit
			})
			.cloned()
			.collect();

		out.sort_by(|a, b| {
			cmp_nulls_last(a.locator.article, b.locator.article)
				.then_with(|| cmp_nulls_last(a.locator.clause, b.locator.clause))
				.then_with(|| a.id.cmp(&b.id))
		});

		out
	}

	pub fn exists(&self, fragment: &NewFragment) -> bool {
		let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
		let structured = !fragment.locator.is_empty();

		rows.iter().any(|stored| {
			let existing = &stored.fragment;

			existing.law_name == fragment.law_name
				&& existing.locator.chapter == fragment.locator.chapter
				&& existing.locator.article == fragment.locator.article
				&& existing.locator.clause == fragment.locator.clause
				&& existing.locator.point == fragment.locator.point
				&& (structured || existing.content == fragment.content)
		})
	}

	pub fn insert(&self, fragment: NewFragment, embedding: Vec<f32>) -> Result<i64> {
		if embedding.len() != self.vector_dim {
			return Err(Error::InvalidArgument(format!(
				"Embedding has {} dimensions, expected {}.",
				embedding.len(),
				self.vector_dim
			)));
		}

		let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
		let id = rows.iter().map(|stored| stored.fragment.id).max().unwrap_or(0) + 1;

		rows.push(StoredFragment { fragment: fragment.into_fragment(id), embedding: Some(embedding) });

		Ok(id)
	}

	pub fn count(&self) -> i64 {
		self.rows.read().unwrap_or_else(PoisonError::into_inner).len() as i64
	}

	fn check_stored(&self, line: usize, stored: &StoredFragment) -> Result<()> {
		if let Err(code) = stored.fragment.validate() {
			return Err(Error::InvalidCorpus { line, message: code.as_str().to_string() });
		}
		if let Some(embedding) = stored.embedding.as_ref()
			&& embedding.len() != self.vector_dim
		{
			return Err(Error::InvalidCorpus {
				line,
				message: format!(
					"Embedding has {} dimensions, expected {}.",
					embedding.len(),
					self.vector_dim
				),
			});
		}

		Ok(())
	}
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
	if a.len() != b.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return None;
	}

	Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

fn cmp_nulls_last(a: Option<i32>, b: Option<i32>) -> Ordering {
	match (a, b) {
		(Some(a), Some(b)) => a.cmp(&b),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}
