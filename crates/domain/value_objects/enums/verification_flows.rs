use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Which flow owns a verification slot. A slot is unique per `(identifier, flow)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VerificationFlow {
    Registration,
    PasswordLogin,
    EmailLogin,
    EmailChange,
    SessionBridge,
}

impl VerificationFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationFlow::Registration => "registration",
            VerificationFlow::PasswordLogin => "password_login",
            VerificationFlow::EmailLogin => "email_login",
            VerificationFlow::EmailChange => "email_change",
            VerificationFlow::SessionBridge => "session_bridge",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "registration" => Some(VerificationFlow::Registration),
            "password_login" => Some(VerificationFlow::PasswordLogin),
            "email_login" => Some(VerificationFlow::EmailLogin),
            "email_change" => Some(VerificationFlow::EmailChange),
            "session_bridge" => Some(VerificationFlow::SessionBridge),
            _ => None,
        }
    }

    /// Subject line used when the code for this flow is emailed.
    pub fn email_subject(&self) -> &'static str {
        match self {
            VerificationFlow::Registration => "Verify your email to finish signing up",
            VerificationFlow::PasswordLogin | VerificationFlow::EmailLogin => {
                "Your sign-in code"
            }
            VerificationFlow::EmailChange => "Confirm your new email address",
            VerificationFlow::SessionBridge => "Session confirmation",
        }
    }
}

impl Display for VerificationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
