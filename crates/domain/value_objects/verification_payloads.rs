use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload kinds that carry a one-time code and the address it was sent to.
pub trait OtpPayload {
    fn otp(&self) -> &str;
    fn set_otp(&mut self, otp: String);
    fn email(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoginKind {
    #[serde(rename = "password-login")]
    Password,
    #[serde(rename = "email-login")]
    Email,
    #[serde(rename = "email-change")]
    EmailChange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<LoginKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionBridgeKind {
    #[serde(rename = "session-token")]
    SessionToken,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionBridgePayload {
    pub user_id: Uuid,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: SessionBridgeKind,
    pub verified: bool,
}

impl SessionBridgePayload {
    pub fn new(user_id: Uuid, email: String) -> Self {
        Self {
            user_id,
            email,
            kind: SessionBridgeKind::SessionToken,
            verified: true,
        }
    }
}

impl OtpPayload for RegistrationPayload {
    fn otp(&self) -> &str {
        &self.otp
    }

    fn set_otp(&mut self, otp: String) {
        self.otp = otp;
    }

    fn email(&self) -> &str {
        &self.email
    }
}

impl OtpPayload for LoginPayload {
    fn otp(&self) -> &str {
        &self.otp
    }

    fn set_otp(&mut self, otp: String) {
        self.otp = otp;
    }

    fn email(&self) -> &str {
        &self.email
    }
}
