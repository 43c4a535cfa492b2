use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::Level;
use url::Url;

const DISCORD_CONTENT_LIMIT: usize = 2000;
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
}

impl AlertEvent {
    pub(crate) fn render(&self) -> String {
        let mut lines = vec![format!(
            "**{}** `{}` `{}`",
            self.service_name,
            self.environment,
            self.level.as_str()
        )];

        let mut origin = format!(
            "`{}` `{}`",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.target
        );
        if let Some(location) = &self.location {
            origin.push_str(&format!(" `{location}`"));
        }
        lines.push(origin);

        if let Some(message) = self.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            lines.push(format!("> {message}"));
        }

        for (key, value) in &self.fields {
            lines.push(format!("- `{key}` = `{value}`"));
        }

        truncate(lines.join("\n"), DISCORD_CONTENT_LIMIT)
    }
}

fn truncate(content: String, limit: usize) -> String {
    const SUFFIX: &str = "\n(truncated)";
    if content.chars().count() <= limit {
        return content;
    }
    let keep = limit.saturating_sub(SUFFIX.len());
    let mut truncated: String = content.chars().take(keep).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Hands events to a background task so logging never waits on the network.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sink in &sinks {
                    if let Err(err) = sink.deliver(&event).await {
                        // eprintln: a tracing call here would feed back into the alert layer
                        eprintln!("observability: alert sink {} failed: {err}", sink.name());
                    }
                }
            }
        });

        Self { tx }
    }

    /// Drops the event when the queue is full or closed.
    pub(crate) fn dispatch(&self, event: AlertEvent) {
        let _ = self.tx.try_send(event);
    }
}

pub(crate) struct DiscordSink {
    webhook_url: Url,
    client: Client,
}

impl DiscordSink {
    pub(crate) fn new(webhook_url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            webhook_url,
            client,
        }
    }
}

#[async_trait]
impl AlertSink for DiscordSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": event.render() }))
            .send()
            .await
            // reqwest errors include the url, which carries the webhook token
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("discord webhook timed out")
                } else {
                    anyhow!("discord webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("discord webhook returned {}", response.status()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
