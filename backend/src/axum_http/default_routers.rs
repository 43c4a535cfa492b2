use axum::{http::StatusCode, response::IntoResponse};

use crate::axum_http::error_responses::{error_envelope, success_message};

pub async fn not_found() -> impl IntoResponse {
    error_envelope(StatusCode::NOT_FOUND, "NOT_FOUND", "Not found")
}

pub async fn health_check() -> impl IntoResponse {
    success_message("OK")
}
