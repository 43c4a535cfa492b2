use std::env;

use tracing::Level;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DiscordConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service: ServiceContext,
    pub(crate) discord: Option<DiscordConfig>,
    /// Logged once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let component = component.trim().to_string();
        let service = ServiceContext {
            service_name: read("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: read("STAGE").unwrap_or_else(|| "local".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let discord = read("DISCORD_WEBHOOK_URL").and_then(|raw| match Url::parse(&raw) {
            Ok(webhook_url) => {
                let min_level = match read("DISCORD_NOTIFY_LEVEL") {
                    None => Level::ERROR,
                    Some(raw_level) => parse_level(&raw_level).unwrap_or_else(|| {
                        warnings.push(format!(
                            "DISCORD_NOTIFY_LEVEL `{raw_level}` is not a level, using error"
                        ));
                        Level::ERROR
                    }),
                };
                Some(DiscordConfig {
                    webhook_url,
                    min_level,
                })
            }
            Err(err) => {
                // the raw url embeds the webhook token
                warnings.push(format!(
                    "DISCORD_WEBHOOK_URL is invalid ({err}), alerts disabled"
                ));
                None
            }
        });

        Self {
            service,
            discord,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", |key| vars.get(key).cloned())
    }

    #[test]
    fn alerts_disabled_without_webhook() {
        let config = config_from(&[("STAGE", "production")]);

        assert!(config.discord.is_none());
        assert!(config.warnings.is_empty());
        assert_eq!(config.service.service_name, "backend");
        assert_eq!(config.service.environment, "production");
    }

    #[test]
    fn invalid_webhook_is_a_warning_not_an_error() {
        let config = config_from(&[("DISCORD_WEBHOOK_URL", "not a url")]);

        assert!(config.discord.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("not a url"));
    }

    #[test]
    fn unknown_level_falls_back_to_error() {
        let config = config_from(&[
            ("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc"),
            ("DISCORD_NOTIFY_LEVEL", "loud"),
        ]);

        let discord = config.discord.expect("discord configured");
        assert_eq!(discord.min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);
    }
}
