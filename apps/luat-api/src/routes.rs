use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use luat_domain::NewFragment;
use luat_service::{Error as ServiceError, ErrorKind, IngestReport};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
	pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
	pub fragments: Vec<NewFragment>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
	pub fragments: i64,
	pub backend: String,
	pub vector_dim: u32,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/questions", post(answer_question))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/fragments", post(ingest_fragments))
		.route("/v1/admin/stats", get(stats))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Refusals are successful responses; only failed invocations change the status.
async fn answer_question(
	State(state): State<AppState>,
	Json(payload): Json<QuestionRequest>,
) -> Response {
	let result = state.service.answer_question(&payload.question).await;
	let status = match result.error_kind {
		None => StatusCode::OK,
		Some(ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
		Some(ErrorKind::Retrieval | ErrorKind::Generation) => StatusCode::BAD_GATEWAY,
	};

	(status, Json(result)).into_response()
}

async fn ingest_fragments(
	State(state): State<AppState>,
	Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
	if payload.fragments.is_empty() {
		return Err(ApiError::new(
			StatusCode::UNPROCESSABLE_ENTITY,
			"INVALID_REQUEST",
			"fragments must be non-empty.",
		));
	}

	let report = state.service.ingest(payload.fragments).await?;

	Ok(Json(report))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
	let fragments = state.service.store.count().await?;
	let storage = &state.service.cfg.storage;

	Ok(Json(StatsResponse {
		fragments,
		backend: storage.backend.clone(),
		vector_dim: storage.vector_dim,
	}))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err.kind() {
			ErrorKind::Validation =>
				Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST", err.to_string()),
			ErrorKind::Retrieval | ErrorKind::Generation => {
				tracing::error!(error = %err, "Admin request failed.");

				Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", err.to_string())
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
