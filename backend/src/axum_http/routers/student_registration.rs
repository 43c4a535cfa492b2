use std::sync::Arc;

use axum::{Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::repositories::{users::UserRepository, verifications::VerificationRepository};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    axum_http::{
        error_responses::{FieldError, success, success_message},
        routers::password_auth::{EmailOtpRequest, EmailRequest},
        validation::{
            Validate, ValidJson, check_email, check_password, check_required, check_username,
        },
    },
    usecases::registration::{RegistrationUseCase, StudentRegistration},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Validate for StudentRegistrationRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required(&mut errors, "firstName", &self.first_name, 50);
        check_required(&mut errors, "lastName", &self.last_name, 50);
        check_username(&mut errors, self.username.trim());
        check_email(&mut errors, "email", &self.email);
        check_password(&mut errors, &self.password);
        errors
    }
}

impl From<StudentRegistrationRequest> for StudentRegistration {
    fn from(value: StudentRegistrationRequest) -> Self {
        Self {
            first_name: value.first_name.trim().to_string(),
            last_name: value.last_name.trim().to_string(),
            username: value.username.trim().to_string(),
            email: value.email,
            password: value.password,
        }
    }
}

#[derive(Debug, Serialize)]
struct SentTo {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Registered {
    user_id: Uuid,
}

pub fn routes<U, V>(usecase: Arc<RegistrationUseCase<U, V>>) -> Router
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
    State(usecase): State<Arc<RegistrationUseCase<U, V>>>,
    ValidJson(body): ValidJson<StudentRegistrationRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.send_otp(body.into()).await {
        Ok(email) => success("Verification code sent to your email", SentTo { email }),
        Err(err) => err.into_response(),
    }
}

pub async fn verify<U, V>(
    State(usecase): State<Arc<RegistrationUseCase<U, V>>>,
    ValidJson(body): ValidJson<EmailOtpRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.verify(&body.email, body.otp.trim()).await {
        Ok(user) => success("Registration completed", Registered { user_id: user.id }),
        Err(err) => err.into_response(),
    }
}

pub async fn resend<U, V>(
    State(usecase): State<Arc<RegistrationUseCase<U, V>>>,
    ValidJson(body): ValidJson<EmailRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    match usecase.resend(&body.email).await {
        Ok(()) => success_message("A new verification code has been sent"),
        Err(err) => err.into_response(),
    }
}
