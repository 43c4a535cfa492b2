use std::collections::BTreeMap;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use super::alerts::{AlertDispatcher, AlertEvent};
use super::config::ServiceContext;

const REDACTED: &str = "[REDACTED]";

/// Forwards events that pass its level filter to the alert dispatcher.
pub(crate) struct AlertLayer {
    dispatcher: AlertDispatcher,
    service: ServiceContext,
}

impl AlertLayer {
    pub(crate) fn new(dispatcher: AlertDispatcher, service: ServiceContext) -> Self {
        Self {
            dispatcher,
            service,
        }
    }
}

#[derive(Default)]
struct RedactingVisitor {
    values: BTreeMap<String, String>,
}

impl RedactingVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        let value = if is_sensitive_field(name) {
            REDACTED.to_string()
        } else {
            value
        };
        self.values.insert(name.to_string(), value);
    }
}

impl Visit for RedactingVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = RedactingVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .values
            .remove("message")
            .map(|raw| raw.trim_matches('"').to_string());
        let metadata = event.metadata();

        self.dispatcher.dispatch(AlertEvent {
            level: *metadata.level(),
            timestamp: Utc::now(),
            service_name: self.service.service_name.clone(),
            environment: self.service.environment.clone(),
            target: metadata.target().to_string(),
            location: metadata
                .file()
                .zip(metadata.line())
                .map(|(file, line)| format!("{file}:{line}")),
            message,
            fields: visitor.values,
        });
    }
}

/// One-time codes, credentials and webhook urls never leave the process.
pub(crate) fn is_sensitive_field(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    const MARKERS: [&str; 7] = [
        "otp",
        "password",
        "secret",
        "token",
        "authorization",
        "api_key",
        "webhook",
    ];
    MARKERS.iter().any(|marker| name.contains(marker))
        || name == "code"
        || name.ends_with("_code")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_code_and_credential_fields() {
        for name in ["otp", "dev_code", "code", "password_hash", "session_token", "api_key"] {
            assert!(is_sensitive_field(name), "{name} should be redacted");
        }
    }

    #[test]
    fn leaves_identifiers_alone() {
        for name in ["user_id", "flow", "status", "db_error", "plan_id"] {
            assert!(!is_sensitive_field(name), "{name} should be kept");
        }
    }
}
