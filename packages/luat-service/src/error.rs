use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Retrieval error: {message}")]
	Retrieval { message: String },
	#[error("Generation error: {message}")]
	Generation { message: String },
}
impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::InvalidRequest { .. } => ErrorKind::Validation,
			Self::Generation { .. } => ErrorKind::Generation,
			Self::Provider { .. } | Self::Storage { .. } | Self::Retrieval { .. } =>
				ErrorKind::Retrieval,
		}
	}

	/// Records how many fragments an interrupted ingest had already stored.
	pub fn after_inserting(self, inserted: usize) -> Self {
		let note =
			|message: String| format!("{message} Fragments inserted before the failure: {inserted}.");

		match self {
			Self::InvalidRequest { message } => Self::InvalidRequest { message: note(message) },
			Self::Provider { message } => Self::Provider { message: note(message) },
			Self::Storage { message } => Self::Storage { message: note(message) },
			Self::Retrieval { message } => Self::Retrieval { message: note(message) },
			Self::Generation { message } => Self::Generation { message: note(message) },
		}
	}
}
impl From<luat_storage::Error> for Error {
	fn from(err: luat_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// How a failed invocation is reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Validation,
	Retrieval,
	Generation,
}
