use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::{error, info};

use super::{EmailSender, OtpEmail};

pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone)]
pub struct HttpEmailSettings {
    pub api_key: String,
    pub from: String,
    pub api_url: String,
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
    text: String,
}

/// JSON email API client (Resend-compatible payload).
pub struct HttpEmailSender {
    http: reqwest::Client,
    settings: HttpEmailSettings,
}

impl HttpEmailSender {
    pub fn new(settings: HttpEmailSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send_otp(&self, email: OtpEmail) -> Result<()> {
        let body = SendEmailBody {
            from: &self.settings.from,
            to: vec![email.to.as_str()],
            subject: email.subject(),
            html: email.html_body(),
            text: email.text_body(),
        };

        let resp = self
            .http
            .post(&self.settings.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let response_body = resp.text().await.unwrap_or_default();
            error!(
                to = %email.to,
                flow = %email.flow,
                status = %status,
                response_body = %response_body,
                "email: provider rejected message"
            );
            bail!("email provider returned status {status}");
        }

        info!(to = %email.to, flow = %email.flow, "email: one-time code sent");
        Ok(())
    }
}
