use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub email: Option<Email>,
    pub stripe: Stripe,
    pub session: Session,
    pub app: App,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub api_key: String,
    pub from: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub jwt_secret: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct App {
    pub base_url: String,
}
