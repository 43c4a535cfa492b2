use std::sync::Arc;

use axum::{Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::{
    repositories::{users::UserRepository, verifications::VerificationRepository},
    value_objects::users::UserSummary,
};
use serde::{Deserialize, Serialize};

use crate::{
    axum_http::{
        error_responses::{FieldError, success},
        validation::{Validate, ValidJson},
    },
    usecases::auth_flows::AuthFlowUseCase,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSessionRequest {
    pub session_token: String,
}

impl Validate for ExchangeSessionRequest {
    fn validate(&self) -> Vec<FieldError> {
        let token = self.session_token.trim();
        if token.len() != 64 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return vec![FieldError::new("sessionToken", "must be a session token")];
        }
        Vec::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessGrant {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
    user: UserSummary,
}

pub fn routes<U, V>(usecase: Arc<AuthFlowUseCase<U, V>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(exchange::<U, V>))
        .with_state(usecase)
}

pub async fn exchange<U, V>(
    State(usecase): State<Arc<AuthFlowUseCase<U, V>>>,
    ValidJson(body): ValidJson<ExchangeSessionRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.exchange_session(body.session_token.trim()).await {
        Ok(grant) => success(
            "Session established",
            AccessGrant {
                access_token: grant.access_token,
                token_type: "Bearer",
                expires_in: grant.expires_in,
                user: grant.user,
            },
        ),
        Err(err) => err.into_response(),
    }
}
