use serde::{Deserialize, Serialize};

/// Similarity assigned to structural hits. Cosine similarity never exceeds it.
pub const STRUCTURAL_SIMILARITY: f32 = 1.0;

/// Position of a fragment inside its law. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
	#[serde(default)]
	pub chapter: Option<String>,
	#[serde(default)]
	pub chapter_title: Option<String>,
	#[serde(default)]
	pub article: Option<i32>,
	#[serde(default)]
	pub article_title: Option<String>,
	#[serde(default)]
	pub clause: Option<i32>,
	#[serde(default)]
	pub point: Option<String>,
}
impl Locator {
	pub fn is_empty(&self) -> bool {
		self.chapter.is_none()
			&& self.chapter_title.is_none()
			&& self.article.is_none()
			&& self.article_title.is_none()
			&& self.clause.is_none()
			&& self.point.is_none()
	}

	/// A coherent locator never names a child without its parent.
	pub fn is_coherent(&self) -> bool {
		if self.chapter_title.is_some() && self.chapter.is_none() {
			return false;
		}
		if self.article_title.is_some() && self.article.is_none() {
			return false;
		}
		if self.clause.is_some() && self.article.is_none() {
			return false;
		}
		if self.point.is_some() && self.clause.is_none() {
			return false;
		}

		true
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentReject {
	EmptyLawName,
	EmptyContent,
	IncoherentLocator,
}
impl FragmentReject {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::EmptyLawName => "REJECT_EMPTY_LAW_NAME",
			Self::EmptyContent => "REJECT_EMPTY_CONTENT",
			Self::IncoherentLocator => "REJECT_INCOHERENT_LOCATOR",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
	pub id: i64,
	pub law_name: String,
	#[serde(flatten)]
	pub locator: Locator,
	pub content: String,
}
impl Fragment {
	pub fn validate(&self) -> Result<(), FragmentReject> {
		validate_parts(&self.law_name, &self.locator, &self.content)
	}
}

/// A fragment submitted for ingestion. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFragment {
	pub law_name: String,
	#[serde(flatten)]
	pub locator: Locator,
	pub content: String,
}
impl NewFragment {
	pub fn validate(&self) -> Result<(), FragmentReject> {
		validate_parts(&self.law_name, &self.locator, &self.content)
	}

	pub fn into_fragment(self, id: i64) -> Fragment {
		Fragment { id, law_name: self.law_name, locator: self.locator, content: self.content }
	}
}

/// Shared by stored fragments and fragments that have not been assigned an id yet.
pub fn validate_parts(law_name: &str, locator: &Locator, content: &str) -> Result<(), FragmentReject> {
	if law_name.trim().is_empty() {
		return Err(FragmentReject::EmptyLawName);
	}
	if content.trim().is_empty() {
		return Err(FragmentReject::EmptyContent);
	}
	if !locator.is_coherent() {
		return Err(FragmentReject::IncoherentLocator);
	}

	Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
	Structural,
	Semantic,
}

/// A fragment retrieved for one invocation, annotated with how it was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
	#[serde(flatten)]
	fragment: Fragment,
	source: CandidateSource,
	similarity: f32,
}
impl Candidate {
	pub fn structural(fragment: Fragment) -> Self {
		Self { fragment, source: CandidateSource::Structural, similarity: STRUCTURAL_SIMILARITY }
	}

	pub fn semantic(fragment: Fragment, similarity: f32) -> Self {
		Self { fragment, source: CandidateSource::Semantic, similarity }
	}

	pub fn id(&self) -> i64 {
		self.fragment.id
	}

	pub fn fragment(&self) -> &Fragment {
		&self.fragment
	}

	pub fn source(&self) -> CandidateSource {
		self.source
	}

	pub fn similarity(&self) -> f32 {
		self.similarity
	}
}
