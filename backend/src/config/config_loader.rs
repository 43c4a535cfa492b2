use anyhow::{Context, Result, bail};
use crates::email::http_sender::DEFAULT_EMAIL_API_URL;

use super::{
    config_model::{App, BackendServer, Database, DotEnvyConfig, Email, Session, Stripe},
    stage::Stage,
};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const MIN_SESSION_SECRET_LEN: usize = 32;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let optional = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let required = |key: &str| optional(key).with_context(|| format!("{key} is not set"));

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: match optional("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().context("DATABASE_MAX_CONNECTIONS is invalid")?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        },
    };

    // Both halves are needed, otherwise codes go to the log.
    let email = match (optional("EMAIL_API_KEY"), optional("EMAIL_FROM")) {
        (Some(api_key), Some(from)) => Some(Email {
            api_key,
            from,
            api_url: optional("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
        }),
        _ => None,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
    };

    let jwt_secret = required("SESSION_JWT_SECRET")?;
    if jwt_secret.len() < MIN_SESSION_SECRET_LEN {
        bail!("SESSION_JWT_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
    }
    let session = Session {
        jwt_secret,
        ttl_seconds: match optional("SESSION_TTL_SECONDS") {
            Some(raw) => raw.parse().context("SESSION_TTL_SECONDS is invalid")?,
            None => DEFAULT_SESSION_TTL_SECONDS,
        },
    };

    let app = App {
        base_url: required("APP_BASE_URL")?,
    };

    let stage = optional("STAGE")
        .map(|raw| Stage::try_from(&raw))
        .transpose()?
        .unwrap_or_default();

    Ok(DotEnvyConfig {
        backend_server,
        database,
        email,
        stripe,
        session,
        app,
        stage,
    })
}
