use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Failed to read corpus at {path:?}.")]
	ReadCorpus { path: PathBuf, source: std::io::Error },
	#[error("Corpus line {line} is invalid: {message}")]
	InvalidCorpus { line: usize, message: String },
}
