use luat_domain::NewFragment;

use crate::{
	Error, Result,
	db::Db,
	models::{FragmentRow, SimilarFragment, SimilarFragmentRow},
};

// The inner query orders by distance alone so pgvector can serve it from the HNSW index. Ties are
// broken on id outside it.
const VECTOR_SEARCH_SQL: &str = "\
SELECT *
FROM (
	SELECT
		id,
		law_name,
		chapter,
		chapter_title,
		article,
		article_title,
		clause,
		point,
		content,
		(1 - (embedding <=> $1::text::vector))::real AS similarity
	FROM law_fragments
	WHERE embedding IS NOT NULL
	ORDER BY embedding <=> $1::text::vector
	LIMIT $2
) nearest
WHERE similarity >= $3
ORDER BY similarity DESC, id";

/// Nearest fragments by cosine similarity, keeping those at or above `min_similarity`.
pub async fn vector_search(
	db: &Db,
	vector: &[f32],
	k: u32,
	min_similarity: f32,
) -> Result<Vec<SimilarFragment>> {
	if vector.is_empty() {
		return Err(Error::InvalidArgument("Query vector must be non-empty.".to_string()));
	}

	let vec_text = vector_to_pg(vector);
	let rows: Vec<SimilarFragmentRow> = sqlx::query_as(VECTOR_SEARCH_SQL)
	.bind(vec_text.as_str())
	.bind(i64::from(k))
	.bind(min_similarity)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().map(SimilarFragment::from).collect())
}

/// Articles match by exact text, chapters by case-insensitive containment. Either condition is
/// enough.
pub async fn structural_lookup(
	db: &Db,
	articles: &[String],
	chapters: &[String],
) -> Result<Vec<FragmentRow>> {
	if articles.is_empty() && chapters.is_empty() {
		return Ok(Vec::new());
	}

	let patterns: Vec<String> =
		chapters.iter().map(|chapter| format!("%{}%", escape_like(chapter))).collect();
	let rows = sqlx::query_as(
		"\
SELECT
	id,
	law_name,
	chapter,
	chapter_title,
	article,
	article_title,
	clause,
	point,
	content
FROM law_fragments
WHERE article::text = ANY($1) OR chapter ILIKE ANY($2)
ORDER BY article ASC NULLS LAST, clause ASC NULLS LAST, id ASC",
	)
	.bind(articles)
	.bind(patterns.as_slice())
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Fragments are keyed by law and locator. Unstructured fragments also compare content.
pub async fn fragment_exists(db: &Db, fragment: &NewFragment) -> Result<bool> {
	let locator = &fragment.locator;
	let exists: bool = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1
	FROM law_fragments
	WHERE law_name = $1
		AND chapter IS NOT DISTINCT FROM $2
		AND article IS NOT DISTINCT FROM $3
		AND clause IS NOT DISTINCT FROM $4
		AND point IS NOT DISTINCT FROM $5
		AND ($6 OR content = $7)
)",
	)
	.bind(fragment.law_name.as_str())
	.bind(locator.chapter.as_deref())
	.bind(locator.article)
	.bind(locator.clause)
	.bind(locator.point.as_deref())
	.bind(!locator.is_empty())
	.bind(fragment.content.as_str())
	.fetch_one(&db.pool)
	.await?;

	Ok(exists)
}

pub async fn insert_fragment(db: &Db, fragment: &NewFragment, embedding: &[f32]) -> Result<i64> {
	let locator = &fragment.locator;
	let vec_text = vector_to_pg(embedding);
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO law_fragments (
	law_name,
	chapter,
	chapter_title,
	article,
	article_title,
	clause,
	point,
	content,
	embedding
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9::text::vector)
RETURNING id",
	)
	.bind(fragment.law_name.as_str())
	.bind(locator.chapter.as_deref())
	.bind(locator.chapter_title.as_deref())
	.bind(locator.article)
	.bind(locator.article_title.as_deref())
	.bind(locator.clause)
	.bind(locator.point.as_deref())
	.bind(fragment.content.as_str())
	.bind(vec_text.as_str())
	.fetch_one(&db.pool)
	.await?;

	Ok(id)
}

pub async fn count_fragments(db: &Db) -> Result<i64> {
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM law_fragments")
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

fn escape_like(value: &str) -> String {
	let mut out = String::with_capacity(value.len());

	for ch in value.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
