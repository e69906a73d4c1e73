use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use keyrank_service::{
	AnalyzeAndFetchRequest, AnalyzeAndFetchResponse, AnalyzeRequest, AnalyzeResponse, Error,
	MetricsSnapshot, RankingsRequest, RankingsResponse,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/combos/analyze", post(analyze))
		.route("/v1/rankings/fetch", post(fetch_rankings))
		.route("/v1/rankings/analyze_and_fetch", post(analyze_and_fetch))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/metrics", get(metrics)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn analyze(
	State(state): State<AppState>,
	Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
	let response = state.service.analyze(&payload)?;

	Ok(Json(response))
}

async fn fetch_rankings(
	State(state): State<AppState>,
	Json(payload): Json<RankingsRequest>,
) -> Result<Json<RankingsResponse>, ApiError> {
	let response = state.service.fetch_rankings(payload).await?;

	Ok(Json(response))
}

async fn analyze_and_fetch(
	State(state): State<AppState>,
	Json(payload): Json<AnalyzeAndFetchRequest>,
) -> Result<Json<AnalyzeAndFetchResponse>, ApiError> {
	let response = state.service.analyze_and_fetch(payload).await?;

	Ok(Json(response))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
	Json(state.service.metrics())
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
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::MalformedCombo { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "malformed_combo", message),
			Error::InvalidConfig { .. } => {
				tracing::error!(error = %message, "Service configuration error.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid_config", message)
			},
			Error::Provider { .. } => {
				tracing::error!(error = %message, "Provider error.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "provider_error", message)
			},
			Error::Storage { .. } => {
				tracing::error!(error = %message, "Storage error.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
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
