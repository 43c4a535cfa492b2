use std::sync::Arc;

use axum::{Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::repositories::{users::UserRepository, verifications::VerificationRepository};
use serde::Serialize;
use tracing::info;

use crate::{
    axum_http::{
        error_responses::{success, success_message},
        routers::password_auth::{EmailOtpRequest, EmailRequest},
        validation::ValidJson,
    },
    usecases::auth_flows::AuthFlowUseCase,
};

#[derive(Debug, Serialize)]
struct SentTo {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailSignIn {
    email: String,
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
    ValidJson(body): ValidJson<EmailRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.email_send_otp(&body.email).await {
        Ok(email) => success("Verification code sent to your email", SentTo { email }),
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
    match usecase.email_verify(&body.email, body.otp.trim()).await {
        Ok(outcome) => {
            let message = if outcome.created {
                "Account created and signed in"
            } else {
                "Signed in successfully"
            };
            info!(created = outcome.created, "email_auth: sign-in verified");
            success(
                message,
                EmailSignIn {
                    email: outcome.email,
                    session_token: outcome.session_token,
                },
            )
        }
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
    match usecase.email_resend(&body.email).await {
        Ok(()) => success_message("A new verification code has been sent"),
        Err(err) => err.into_response(),
    }
}
