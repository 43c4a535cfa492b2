//! Transactional email delivery for one-time codes.

pub mod console;
pub mod http_sender;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::enums::verification_flows::VerificationFlow;

pub use console::ConsoleEmailSender;
pub use http_sender::{HttpEmailSender, HttpEmailSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEmail {
    pub to: String,
    pub code: String,
    pub flow: VerificationFlow,
    pub ttl_minutes: i64,
}

impl OtpEmail {
    pub fn subject(&self) -> String {
        self.flow.email_subject().to_string()
    }

    pub fn text_body(&self) -> String {
        format!(
            "Your verification code is {}. It expires in {} minutes.\n\nIf you did not request this code you can ignore this email.",
            self.code, self.ttl_minutes
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            "<p>Your verification code is</p><p style=\"font-size:24px;letter-spacing:4px\"><strong>{}</strong></p><p>It expires in {} minutes.</p>",
            self.code, self.ttl_minutes
        )
    }
}

#[async_trait]
#[automock]
pub trait EmailSender: Send + Sync {
    async fn send_otp(&self, email: OtpEmail) -> Result<()>;
}

/// Without provider credentials codes are written to the log instead of mailed.
pub fn build_email_sender(settings: Option<HttpEmailSettings>) -> Arc<dyn EmailSender> {
    match settings {
        Some(settings) => Arc::new(HttpEmailSender::new(settings)),
        None => {
            tracing::warn!("email: provider not configured, one-time codes go to the log");
            Arc::new(ConsoleEmailSender::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_mentions_code_and_ttl() {
        let email = OtpEmail {
            to: "a@b.com".to_string(),
            code: "123456".to_string(),
            flow: VerificationFlow::Registration,
            ttl_minutes: 10,
        };

        assert!(email.text_body().contains("123456"));
        assert!(email.text_body().contains("10 minutes"));
        assert!(email.html_body().contains("<strong>123456</strong>"));
        assert_eq!(email.subject(), VerificationFlow::Registration.email_subject());
    }

    #[tokio::test]
    async fn console_sender_reports_success() {
        let sender = build_email_sender(None);
        let result = sender
            .send_otp(OtpEmail {
                to: "a@b.com".to_string(),
                code: "654321".to_string(),
                flow: VerificationFlow::EmailLogin,
                ttl_minutes: 10,
            })
            .await;

        assert!(result.is_ok());
    }
}
