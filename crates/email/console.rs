use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{EmailSender, OtpEmail};

/// Development sender that logs the code instead of mailing it.
#[derive(Debug, Default)]
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send_otp(&self, email: OtpEmail) -> Result<()> {
        info!(
            to = %email.to,
            flow = %email.flow,
            dev_code = %email.code,
            ttl_minutes = email.ttl_minutes,
            "email: provider unconfigured, logging one-time code"
        );
        Ok(())
    }
}
