use luat_domain::{Fragment, Locator};

#[derive(Debug, sqlx::FromRow)]
pub struct FragmentRow {
	pub id: i64,
	pub law_name: String,
	pub chapter: Option<String>,
	pub chapter_title: Option<String>,
	pub article: Option<i32>,
	pub article_title: Option<String>,
	pub clause: Option<i32>,
	pub point: Option<String>,
	pub content: String,
}
impl FragmentRow {
	pub fn into_fragment(self) -> Fragment {
		Fragment {
			id: self.id,
			law_name: self.law_name,
			locator: Locator {
				chapter: self.chapter,
				chapter_title: self.chapter_title,
				article: self.article,
				article_title: self.article_title,
				clause: self.clause,
				point: self.point,
			},
			content: self.content,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct SimilarFragmentRow {
	#[sqlx(flatten)]
	pub fragment: FragmentRow,
	pub similarity: f32,
}

/// A fragment with the similarity it scored against one query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarFragment {
	pub fragment: Fragment,
	pub similarity: f32,
}
impl From<SimilarFragmentRow> for SimilarFragment {
	fn from(row: SimilarFragmentRow) -> Self {
		Self { fragment: row.fragment.into_fragment(), similarity: row.similarity }
	}
}
