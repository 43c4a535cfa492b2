use crate::{
    auth::SessionKeys,
    axum_http::{default_routers, routers},
    config::{config_model::DotEnvyConfig, stage::Stage},
    usecases::{
        auth_flows::AuthFlowUseCase, email_change::EmailChangeUseCase,
        rate_limiter::FixedWindowRateLimiter, registration::RegistrationUseCase,
        subscriptions::SubscriptionUseCase, verification_ledger::VerificationLedger,
    },
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    email::{HttpEmailSettings, build_email_sender},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            subscription_history::SubscriptionHistoryPostgres,
            subscription_intents::SubscriptionIntentPostgres, subscription_plans::PlanPostgres,
            user_subscriptions::UserSubscriptionPostgres, users::UserPostgres,
            verifications::VerificationPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let user_repo = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let verification_repo = Arc::new(VerificationPostgres::new(Arc::clone(&db_pool)));

    let email_sender = build_email_sender(config.email.as_ref().map(|email| HttpEmailSettings {
        api_key: email.api_key.clone(),
        from: email.from.clone(),
        api_url: email.api_url.clone(),
    }));
    let ledger = Arc::new(VerificationLedger::new(verification_repo, email_sender));
    let session_keys = Arc::new(SessionKeys::new(
        &config.session.jwt_secret,
        config.session.ttl_seconds,
    ));

    let auth_flows = Arc::new(AuthFlowUseCase::new(
        Arc::clone(&user_repo),
        Arc::clone(&ledger),
        Arc::clone(&session_keys),
    ));
    let registration = Arc::new(RegistrationUseCase::new(
        Arc::clone(&user_repo),
        Arc::clone(&ledger),
    ));
    let email_change = Arc::new(EmailChangeUseCase::new(Arc::clone(&user_repo), ledger));

    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        &config.app.base_url,
    ));
    let subscriptions = Arc::new(SubscriptionUseCase::new(
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UserSubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionHistoryPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionIntentPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&user_repo),
        stripe_client,
        Arc::new(FixedWindowRateLimiter::default()),
    ));

    // Dispatches are detached; the server does not wait for them.
    match subscriptions.recover_pending_intents().await {
        Ok(report) => info!(
            applied = report.applied,
            abandoned = report.abandoned,
            redispatched = report.dispatches.len(),
            "http: subscription intents recovered"
        ),
        Err(err) => error!(error = ?err, "http: subscription intent recovery failed"),
    }

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/auth/password",
            routers::password_auth::routes(Arc::clone(&auth_flows)),
        )
        .nest("/auth/email", routers::email_auth::routes(Arc::clone(&auth_flows)))
        .nest("/auth/session", routers::session::routes(auth_flows))
        .nest(
            "/student-registration",
            routers::student_registration::routes(registration),
        )
        .nest("/account/email", routers::account_email::routes(email_change))
        .nest("/subscription", routers::subscriptions::routes(subscriptions))
        .route("/health-check", get(default_routers::health_check))
        .layer(Extension(session_keys))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        port = config.backend_server.port,
        stage = %config.stage,
        "http: server is running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("http: server stopped");
    Ok(())
}

fn cors_layer(config: &DotEnvyConfig) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match config.stage {
        Stage::Production => {
            let origin = HeaderValue::from_str(config.app.base_url.trim_end_matches('/'))
                .context("APP_BASE_URL is not a valid origin")?;
            Ok(layer.allow_origin(origin))
        }
        _ => Ok(layer.allow_origin(Any)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "http: failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "http: failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("http: received Ctrl+C"),
        _ = terminate => info!("http: received SIGTERM"),
    }
}
