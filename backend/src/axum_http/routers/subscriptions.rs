use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        repositories::{
            subscription_history::SubscriptionHistoryRepository,
            subscription_intents::SubscriptionIntentRepository, subscription_plans::PlanRepository,
            user_subscriptions::UserSubscriptionRepository, users::UserRepository,
        },
        value_objects::subscriptions::{
            CurrentSubscriptionDto, PlanDto, SubscriptionHistoryDto, UpgradeRequest,
        },
    },
    payments::PaymentGateway,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::{FieldError, success},
        validation::{Validate, ValidJson},
    },
    usecases::subscriptions::SubscriptionUseCase,
};

impl Validate for UpgradeRequest {
    fn validate(&self) -> Vec<FieldError> {
        if self.plan_id.is_nil() {
            return vec![FieldError::new("planId", "is required")];
        }
        Vec::new()
    }
}

#[derive(Debug, Serialize)]
struct Plans {
    plans: Vec<PlanDto>,
}

#[derive(Debug, Serialize)]
struct Current {
    subscription: Option<CurrentSubscriptionDto>,
}

#[derive(Debug, Serialize)]
struct History {
    history: Vec<SubscriptionHistoryDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Cancelled {
    subscription_id: Uuid,
    cancelled_at: DateTime<Utc>,
    access_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Checkout {
    checkout_url: String,
}

pub fn routes<P, S, H, I, U, G>(usecase: Arc<SubscriptionUseCase<P, S, H, I, U, G>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/plans", get(list_plans::<P, S, H, I, U, G>))
        .route("/current", get(current::<P, S, H, I, U, G>))
        .route("/history", get(history::<P, S, H, I, U, G>))
        .route("/cancel", post(cancel::<P, S, H, I, U, G>))
        .route("/upgrade", post(upgrade::<P, S, H, I, U, G>))
        .with_state(usecase)
}

pub async fn list_plans<P, S, H, I, U, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, S, H, I, U, G>>>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.list_plans().await {
        Ok(plans) => success("Plans loaded", Plans { plans }),
        Err(err) => err.into_response(),
    }
}

pub async fn current<P, S, H, I, U, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, S, H, I, U, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.current(user_id).await {
        Ok(subscription) => success("Current subscription loaded", Current { subscription }),
        Err(err) => err.into_response(),
    }
}

pub async fn history<P, S, H, I, U, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, S, H, I, U, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.history(user_id).await {
        Ok(history) => success("Subscription history loaded", History { history }),
        Err(err) => err.into_response(),
    }
}

pub async fn cancel<P, S, H, I, U, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, S, H, I, U, G>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.cancel(&auth).await {
        // The gateway dispatch keeps running after the handle is dropped.
        Ok(receipt) => {
            info!(user_id = %auth.user_id, "subscriptions: cancel responded");
            success(
                "Subscription cancelled. You keep access until the end of the current billing period",
                Cancelled {
                    subscription_id: receipt.subscription_id,
                    cancelled_at: receipt.cancelled_at,
                    access_until: receipt.access_until,
                },
            )
        }
        Err(err) => err.into_response(),
    }
}

pub async fn upgrade<P, S, H, I, U, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, S, H, I, U, G>>>,
    auth: AuthUser,
    ValidJson(body): ValidJson<UpgradeRequest>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.upgrade(&auth, body.plan_id).await {
        Ok(checkout_url) => success("Redirect to checkout to complete the upgrade", Checkout { checkout_url }),
        Err(err) => err.into_response(),
    }
}
