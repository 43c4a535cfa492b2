use std::sync::Arc;

use axum::{Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::repositories::{users::UserRepository, verifications::VerificationRepository};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::{FieldError, success},
        validation::{Validate, ValidJson, check_email, check_otp},
    },
    usecases::email_change::EmailChangeUseCase,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmailRequest {
    pub new_email: String,
}

impl Validate for NewEmailRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_email(&mut errors, "newEmail", &self.new_email);
        errors
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmNewEmailRequest {
    pub new_email: String,
    pub otp: String,
}

impl Validate for ConfirmNewEmailRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_email(&mut errors, "newEmail", &self.new_email);
        check_otp(&mut errors, &self.otp);
        errors
    }
}

#[derive(Debug, Serialize)]
struct EmailBody {
    email: String,
}

pub fn routes<U, V>(usecase: Arc<EmailChangeUseCase<U, V>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/send-otp", post(send_otp::<U, V>))
        .route("/verify", post(verify::<U, V>))
        .with_state(usecase)
}

pub async fn send_otp<U, V>(
    State(usecase): State<Arc<EmailChangeUseCase<U, V>>>,
    auth: AuthUser,
    ValidJson(body): ValidJson<NewEmailRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.send_otp(&auth, &body.new_email).await {
        Ok(email) => success("Verification code sent to your new email", EmailBody { email }),
        Err(err) => err.into_response(),
    }
}

pub async fn verify<U, V>(
    State(usecase): State<Arc<EmailChangeUseCase<U, V>>>,
    auth: AuthUser,
    ValidJson(body): ValidJson<ConfirmNewEmailRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.verify(&auth, &body.new_email, body.otp.trim()).await {
        Ok(email) => success("Email updated", EmailBody { email }),
        Err(err) => err.into_response(),
    }
}
