use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::usecases::{
    auth_flows::AuthFlowError, subscriptions::SubscriptionError,
    verification_ledger::VerificationError,
};

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// `{status:"success", message, ...data}`. `data` must serialize to a map.
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<T: Serialize> {
    status: &'static str,
    message: String,
    #[serde(flatten)]
    data: T,
}

pub fn success<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(SuccessEnvelope {
            status: "success",
            message: message.to_string(),
            data,
        }),
    )
        .into_response()
}

pub fn success_message(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "success", "message": message })),
    )
        .into_response()
}

pub fn error_envelope(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message, "code": code })),
    )
        .into_response()
}

pub fn validation_failed(errors: Vec<FieldError>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "status": "error",
            "message": "Validation failed",
            "code": "VALIDATION_ERROR",
            "errors": errors,
        })),
    )
        .into_response()
}

/// Server-side failures are logged in full and answered with a generic message.
fn respond(status: StatusCode, code: &str, err: &(dyn std::error::Error + 'static)) -> Response {
    if status.is_server_error() {
        error!(status = status.as_u16(), code, error = ?err, "http: request failed");
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            INTERNAL_MESSAGE.to_string()
        } else {
            err.to_string()
        };
        return error_envelope(status, code, &message);
    }
    error_envelope(status, code, &err.to_string())
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        respond(self.status_code(), self.code(), &self)
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        respond(self.status_code(), self.code(), &self)
    }
}

impl IntoResponse for SubscriptionError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            SubscriptionError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = respond(self.status_code(), self.code(), &self);
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let err = SubscriptionError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], INTERNAL_MESSAGE);
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = SubscriptionError::RateLimited { retry_after_secs: 42 }.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
    }

    #[tokio::test]
    async fn flow_errors_keep_their_code() {
        let response = AuthFlowError::Verification(VerificationError::Expired).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "OTP_EXPIRED");
        assert_eq!(body["message"], "verification code has expired");
    }

    #[tokio::test]
    async fn success_flattens_payload() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            session_token: String,
        }

        let response = success(
            "ok",
            Data {
                session_token: "abc".to_string(),
            },
        );
        let body = body_json(response).await;

        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "ok");
        assert_eq!(body["sessionToken"], "abc");
    }

    #[tokio::test]
    async fn validation_lists_field_errors() {
        let response = validation_failed(vec![FieldError::new("email", "must be a valid email")]);
        let body = body_json(response).await;

        assert_eq!(body["errors"][0]["field"], "email");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
