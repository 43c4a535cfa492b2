//! Tracing bootstrap: formatted logs filtered by `RUST_LOG`, plus optional
//! error alerts pushed to a Discord webhook.

mod alerts;
mod config;
mod layer;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use alerts::{AlertDispatcher, DiscordSink};
use config::ObservabilityConfig;
use layer::AlertLayer;

pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = config.discord.as_ref().map(|discord| {
        let dispatcher =
            AlertDispatcher::spawn(vec![Arc::new(DiscordSink::new(discord.webhook_url.clone()))]);

        AlertLayer::new(dispatcher, config.service.clone())
            .with_filter(LevelFilter::from_level(discord.min_level))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service.service_name,
            environment = %config.service.environment,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service.service_name,
        environment = %config.service.environment,
        component = %config.service.component,
        alerts_enabled = config.discord.is_some(),
        "observability: tracing initialized"
    );

    Ok(())
}
