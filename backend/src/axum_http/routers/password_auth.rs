use std::sync::Arc;

use axum::{Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::repositories::{users::UserRepository, verifications::VerificationRepository};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    axum_http::{
        error_responses::{FieldError, success, success_message},
        validation::{Validate, ValidJson, check_email, check_otp, check_required},
    },
    usecases::auth_flows::AuthFlowUseCase,
};

#[derive(Debug, Deserialize)]
pub struct PasswordSendOtpRequest {
    pub identifier: String,
    pub password: String,
}

impl Validate for PasswordSendOtpRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "identifier", &self.identifier, 254);
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "is required"));
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailOtpRequest {
    pub email: String,
    pub otp: String,
}

impl Validate for EmailOtpRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_email(&mut errors, "email", &self.email);
        check_otp(&mut errors, &self.otp);
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

impl Validate for EmailRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_email(&mut errors, "email", &self.email);
        errors
    }
}

#[derive(Debug, Serialize)]
struct SentTo {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionBridge {
    session_token: String,
}

pub fn routes<U, V>(usecase: Arc<AuthFlowUseCase<U, V>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/send-otp", post(send_otp::<U, V>))
        .route("/verify", post(verify::<U, V>))
        .route("/resend", post(resend::<U, V>))
        .with_state(usecase)
}

pub async fn send_otp<U, V>(
    State(usecase): State<Arc<AuthFlowUseCase<U, V>>>,
    ValidJson(body): ValidJson<PasswordSendOtpRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.password_send_otp(&body.identifier, &body.password).await {
        Ok(email) => {
            info!("password_auth: sign-in code sent");
            success("Verification code sent to your email", SentTo { email })
        }
        Err(err) => err.into_response(),
    }
}

pub async fn verify<U, V>(
    State(usecase): State<Arc<AuthFlowUseCase<U, V>>>,
    ValidJson(body): ValidJson<EmailOtpRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.password_verify(&body.email, body.otp.trim()).await {
        Ok(session_token) => success("Signed in successfully", SessionBridge { session_token }),
        Err(err) => err.into_response(),
    }
}

pub async fn resend<U, V>(
    State(usecase): State<Arc<AuthFlowUseCase<U, V>>>,
    ValidJson(body): ValidJson<EmailRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.password_resend(&body.email).await {
        Ok(()) => success_message("A new verification code has been sent"),
        Err(err) => err.into_response(),
    }
}
