use axum::{
    Json, async_trait,
    extract::{FromRequest, Request, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use crate::axum_http::error_responses::{FieldError, validation_failed};

/// Request bodies that check their own fields after deserializing.
pub trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

/// `Json<T>` that answers malformed or invalid bodies with the 400 envelope.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                validation_failed(vec![FieldError::new("body", rejection.body_text())]).into_response()
            })?;

        let errors = value.validate();
        if !errors.is_empty() {
            return Err(validation_failed(errors));
        }
        Ok(ValidJson(value))
    }
}

pub fn check_email(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    let value = value.trim();
    let valid = value.len() <= 254
        && value.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        });
    if !valid {
        errors.push(FieldError::new(field, "must be a valid email address"));
    }
}

pub fn check_otp(errors: &mut Vec<FieldError>, value: &str) {
    let value = value.trim();
    if value.len() != 6 || !value.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new("otp", "must be a 6-digit code"));
    }
}

pub fn check_required(errors: &mut Vec<FieldError>, field: &str, value: &str, max_len: usize) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, "is required"));
    } else if value.chars().count() > max_len {
        errors.push(FieldError::new(field, format!("must be at most {max_len} characters")));
    }
}

pub fn check_username(errors: &mut Vec<FieldError>, value: &str) {
    let length = value.chars().count();
    if !(3..=30).contains(&length) {
        errors.push(FieldError::new("username", "must be between 3 and 30 characters"));
    } else if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        errors.push(FieldError::new(
            "username",
            "may only contain letters, digits, underscores and dots",
        ));
    }
}

pub fn check_password(errors: &mut Vec<FieldError>, value: &str) {
    let length = value.chars().count();
    if length < 8 {
        errors.push(FieldError::new("password", "must be at least 8 characters"));
    } else if length > 128 {
        errors.push(FieldError::new("password", "must be at most 128 characters"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        let mut errors = Vec::new();
        check_email(&mut errors, "email", "Ada@Example.com ");
        assert!(errors.is_empty());

        for bad in ["", "ada", "@b.com", "ada@b", "ada@.com", "a da@b.com"] {
            let mut errors = Vec::new();
            check_email(&mut errors, "email", bad);
            assert_eq!(errors.len(), 1, "{bad} should be rejected");
        }
    }

    #[test]
    fn otp_must_be_six_digits() {
        let mut errors = Vec::new();
        check_otp(&mut errors, "123456");
        check_otp(&mut errors, "12345");
        check_otp(&mut errors, "12345a");

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.field == "otp"));
    }

    #[test]
    fn username_charset() {
        let mut errors = Vec::new();
        check_username(&mut errors, "ada.l_99");
        assert!(errors.is_empty());

        check_username(&mut errors, "ad");
        check_username(&mut errors, "ada lovelace");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn password_length_bounds() {
        let mut errors = Vec::new();
        check_password(&mut errors, "short");
        check_password(&mut errors, "long enough");
        assert_eq!(errors.len(), 1);
    }
}
