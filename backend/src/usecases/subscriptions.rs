use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{
            subscription_history::InsertSubscriptionHistoryEntity,
            subscription_intents::{InsertSubscriptionIntentEntity, SubscriptionIntentEntity},
            user_subscriptions::UserSubscriptionEntity,
        },
        repositories::{
            subscription_history::SubscriptionHistoryRepository,
            subscription_intents::SubscriptionIntentRepository, subscription_plans::PlanRepository,
            user_subscriptions::UserSubscriptionRepository, users::UserRepository,
        },
        value_objects::{
            enums::{intent_statuses::IntentStatus, subscription_actions::SubscriptionAction},
            subscriptions::{CurrentSubscriptionDto, PlanDto, SubscriptionHistoryDto},
        },
    },
    payments::{CheckoutMode, CheckoutRequest, PaymentGateway},
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{auth::AuthUser, usecases::rate_limiter::FixedWindowRateLimiter};

pub const CANCEL_ACTION: &str = "subscription:cancel";
pub const UPGRADE_ACTION: &str = "subscription:upgrade";

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscriptions for this account are managed by the platform")]
    Forbidden,
    #[error("too many requests, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
    #[error("no active subscription")]
    NoActiveSubscription,
    #[error("plan not found")]
    PlanNotFound,
    #[error("already subscribed to this plan")]
    AlreadySubscribed,
    #[error("plan has no price configured for the {0} billing cycle")]
    PriceNotConfigured(String),
    #[error("payment gateway request failed")]
    Gateway(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::Forbidden => StatusCode::FORBIDDEN,
            SubscriptionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SubscriptionError::NoActiveSubscription | SubscriptionError::PlanNotFound => {
                StatusCode::NOT_FOUND
            }
            SubscriptionError::AlreadySubscribed | SubscriptionError::PriceNotConfigured(_) => {
                StatusCode::BAD_REQUEST
            }
            SubscriptionError::Gateway(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionError::Forbidden => "SUBSCRIPTION_FORBIDDEN",
            SubscriptionError::RateLimited { .. } => "RATE_LIMITED",
            SubscriptionError::NoActiveSubscription => "NO_ACTIVE_SUBSCRIPTION",
            SubscriptionError::PlanNotFound => "PLAN_NOT_FOUND",
            SubscriptionError::AlreadySubscribed => "ALREADY_SUBSCRIBED",
            SubscriptionError::PriceNotConfigured(_) => "PRICE_NOT_CONFIGURED",
            SubscriptionError::Gateway(_) => "PAYMENT_GATEWAY_ERROR",
            SubscriptionError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

/// Result of the detached cancel-at-period-end call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCancelOutcome {
    Completed,
    /// Nothing to tell the gateway: the subscription was never billed through it.
    Skipped,
    Failed(String),
}

/// Local cancellation is final once this is returned. `dispatch` resolves when
/// the gateway call settles and may be dropped.
#[derive(Debug)]
pub struct CancellationReceipt {
    pub subscription_id: Uuid,
    pub cancelled_at: DateTime<Utc>,
    pub access_until: Option<DateTime<Utc>>,
    pub dispatch: JoinHandle<GatewayCancelOutcome>,
}

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub applied: usize,
    pub abandoned: usize,
    pub dispatches: Vec<JoinHandle<GatewayCancelOutcome>>,
}

pub struct SubscriptionUseCase<P, S, H, I, U, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    history_repo: Arc<H>,
    intent_repo: Arc<I>,
    user_repo: Arc<U>,
    gateway: Arc<G>,
    rate_limiter: Arc<FixedWindowRateLimiter>,
}

impl<P, S, H, I, U, G> SubscriptionUseCase<P, S, H, I, U, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    H: SubscriptionHistoryRepository + Send + Sync + 'static,
    I: SubscriptionIntentRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        history_repo: Arc<H>,
        intent_repo: Arc<I>,
        user_repo: Arc<U>,
        gateway: Arc<G>,
        rate_limiter: Arc<FixedWindowRateLimiter>,
    ) -> Self {
        Self {
            plan_repo,
            subscription_repo,
            history_repo,
            intent_repo,
            user_repo,
            gateway,
            rate_limiter,
        }
    }

    pub async fn list_plans(&self) -> UseCaseResult<Vec<PlanDto>> {
        info!("subscriptions: listing active plans");
        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "subscriptions: failed to list active plans");
            SubscriptionError::Internal(err)
        })?;
        let plan_count = plans.len();
        info!(plan_count, "subscriptions: active plans loaded");
        Ok(plans.into_iter().map(PlanDto::from).collect())
    }

    pub async fn current(&self, user_id: Uuid) -> UseCaseResult<Option<CurrentSubscriptionDto>> {
        let subscription = match self.load_current(user_id).await? {
            Some(subscription) => subscription,
            None => {
                info!(%user_id, "subscriptions: no active subscription");
                return Ok(None);
            }
        };

        let plan = self
            .plan_repo
            .find_by_id(subscription.plan_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan_id = %subscription.plan_id,
                    db_error = ?err,
                    "subscriptions: failed to load plan"
                );
                SubscriptionError::Internal(err)
            })?
            .ok_or_else(|| {
                error!(
                    %user_id,
                    plan_id = %subscription.plan_id,
                    "subscriptions: subscription points at a missing plan"
                );
                SubscriptionError::Internal(anyhow!("plan {} not found", subscription.plan_id))
            })?;

        let billing_cycle = subscription.billing_cycle().ok_or_else(|| {
            SubscriptionError::Internal(anyhow!(
                "unknown billing cycle {:?} on subscription {}",
                subscription.billing_cycle,
                subscription.id
            ))
        })?;

        Ok(Some(CurrentSubscriptionDto {
            subscription_id: subscription.id,
            status: subscription.status(),
            billing_cycle,
            auto_renew: subscription.auto_renew,
            cancelled_at: subscription.cancelled_at,
            access_until: subscription.next_billing_date,
            plan: PlanDto::from(plan),
        }))
    }

    pub async fn history(&self, user_id: Uuid) -> UseCaseResult<Vec<SubscriptionHistoryDto>> {
        let entries = self.history_repo.list_for_user(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "subscriptions: failed to load history");
            SubscriptionError::Internal(err)
        })?;
        Ok(entries.into_iter().map(SubscriptionHistoryDto::from).collect())
    }

    /// Cancels at period end. The local row is flipped before the gateway is
    /// told, and the gateway outcome never reaches the caller.
    pub async fn cancel(&self, auth: &AuthUser) -> UseCaseResult<CancellationReceipt> {
        let user_id = auth.user_id;
        self.authorize(auth, CANCEL_ACTION)?;
        info!(%user_id, "subscriptions: cancel requested");

        let subscription = self.load_current(user_id).await?.ok_or_else(|| {
            let err = SubscriptionError::NoActiveSubscription;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "subscriptions: no active subscription to cancel"
            );
            err
        })?;

        let intent_id = self
            .intent_repo
            .create(InsertSubscriptionIntentEntity {
                user_id,
                subscription_id: subscription.id,
                action: SubscriptionAction::Cancelled.to_string(),
                status: IntentStatus::Pending.to_string(),
                provider_subscription_id: subscription.stripe_subscription_id.clone(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to record cancel intent");
                SubscriptionError::Internal(err)
            })?;

        let cancelled_at = Utc::now();
        let applied = self
            .subscription_repo
            .apply_cancellation(
                intent_id,
                subscription.id,
                cancelled_at,
                cancellation_history(&subscription),
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %intent_id,
                    db_error = ?err,
                    "subscriptions: failed to apply cancellation"
                );
                SubscriptionError::Internal(err)
            })?;

        if !applied {
            // Another request cancelled it between the read and the write.
            settle_intent(
                self.intent_repo.as_ref(),
                intent_id,
                IntentStatus::Completed,
                Some("subscription no longer current".to_string()),
            )
            .await;
            warn!(%user_id, %intent_id, "subscriptions: subscription was cancelled concurrently");
            return Err(SubscriptionError::NoActiveSubscription);
        }

        info!(
            %user_id,
            %intent_id,
            subscription_id = %subscription.id,
            "subscriptions: cancellation applied locally"
        );

        let dispatch = self.dispatch_gateway_cancel(
            intent_id,
            user_id,
            subscription.stripe_subscription_id.clone(),
        );

        Ok(CancellationReceipt {
            subscription_id: subscription.id,
            cancelled_at,
            access_until: subscription.next_billing_date,
            dispatch,
        })
    }

    /// Returns the hosted checkout URL for moving to `plan_id`. Nothing local
    /// changes until the gateway confirms the payment.
    pub async fn upgrade(&self, auth: &AuthUser, plan_id: Uuid) -> UseCaseResult<String> {
        let user_id = auth.user_id;
        self.authorize(auth, UPGRADE_ACTION)?;
        info!(%user_id, %plan_id, "subscriptions: upgrade requested");

        let plan = self
            .plan_repo
            .find_active_plan_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%user_id, %plan_id, db_error = ?err, "subscriptions: failed to load plan");
                SubscriptionError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = SubscriptionError::PlanNotFound;
                warn!(
                    %user_id,
                    %plan_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: upgrade target plan not found"
                );
                err
            })?;

        let current = self.load_current(user_id).await?.ok_or_else(|| {
            let err = SubscriptionError::NoActiveSubscription;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "subscriptions: upgrade without an active subscription"
            );
            err
        })?;

        if current.plan_id == plan.id {
            info!(%user_id, %plan_id, "subscriptions: already on requested plan");
            return Err(SubscriptionError::AlreadySubscribed);
        }

        let billing_cycle = current.billing_cycle().ok_or_else(|| {
            SubscriptionError::Internal(anyhow!(
                "unknown billing cycle {:?} on subscription {}",
                current.billing_cycle,
                current.id
            ))
        })?;

        let price_id = plan
            .stripe_price_id(billing_cycle)
            .map(str::to_string)
            .ok_or_else(|| {
                let err = SubscriptionError::PriceNotConfigured(billing_cycle.to_string());
                warn!(
                    %user_id,
                    %plan_id,
                    billing_cycle = %billing_cycle,
                    status = err.status_code().as_u16(),
                    "subscriptions: plan has no price for current cycle"
                );
                err
            })?;

        let customer_id = self.resolve_customer(auth).await?;

        let metadata = HashMap::from([
            ("userId".to_string(), user_id.to_string()),
            ("planId".to_string(), plan.id.to_string()),
            ("billingCycle".to_string(), billing_cycle.to_string()),
            ("isUpgrade".to_string(), "true".to_string()),
            ("oldSubscriptionId".to_string(), current.id.to_string()),
            ("oldPlanId".to_string(), current.plan_id.to_string()),
        ]);

        let checkout_url = self
            .gateway
            .create_checkout_session(CheckoutRequest {
                price_id,
                mode: CheckoutMode::Subscription,
                customer_id,
                metadata,
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %plan_id,
                    error = ?err,
                    "subscriptions: checkout session creation failed"
                );
                SubscriptionError::Gateway(err)
            })?;

        info!(%user_id, %plan_id, "subscriptions: upgrade checkout session created");
        Ok(checkout_url)
    }

    /// Replays cancel intents left behind by a crash or a failed gateway call.
    pub async fn recover_pending_intents(&self) -> UseCaseResult<RecoveryReport> {
        let intents = self
            .intent_repo
            .list_by_statuses(vec![
                IntentStatus::Pending,
                IntentStatus::Applied,
                IntentStatus::GatewayFailed,
            ])
            .await
            .map_err(|err| {
                error!(db_error = ?err, "subscriptions: failed to list open intents");
                SubscriptionError::Internal(err)
            })?;

        let mut report = RecoveryReport::default();
        for intent in intents {
            if SubscriptionAction::from_str(&intent.action) != Some(SubscriptionAction::Cancelled) {
                warn!(
                    intent_id = %intent.id,
                    action = %intent.action,
                    "subscriptions: skipping intent with unknown action"
                );
                continue;
            }

            match intent.status() {
                Some(IntentStatus::Pending) => {
                    if self.apply_pending_intent(&intent).await? {
                        report.applied += 1;
                        report.dispatches.push(self.dispatch_gateway_cancel(
                            intent.id,
                            intent.user_id,
                            intent.provider_subscription_id.clone(),
                        ));
                    } else {
                        report.abandoned += 1;
                    }
                }
                Some(IntentStatus::Applied) | Some(IntentStatus::GatewayFailed) => {
                    report.dispatches.push(self.dispatch_gateway_cancel(
                        intent.id,
                        intent.user_id,
                        intent.provider_subscription_id.clone(),
                    ));
                }
                _ => {}
            }
        }

        info!(
            applied = report.applied,
            abandoned = report.abandoned,
            redispatched = report.dispatches.len(),
            "subscriptions: intent recovery finished"
        );
        Ok(report)
    }

    fn authorize(&self, auth: &AuthUser, action: &'static str) -> UseCaseResult<()> {
        if !auth.role.can_self_manage_subscription() {
            let err = SubscriptionError::Forbidden;
            warn!(
                user_id = %auth.user_id,
                role = %auth.role,
                action,
                status = err.status_code().as_u16(),
                "subscriptions: role may not self-manage subscriptions"
            );
            return Err(err);
        }

        self.rate_limiter
            .check(auth.user_id, action)
            .map_err(|retry_after| SubscriptionError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            })
    }

    async fn load_current(&self, user_id: Uuid) -> UseCaseResult<Option<UserSubscriptionEntity>> {
        self.subscription_repo
            .find_current_for_user(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load current subscription"
                );
                SubscriptionError::Internal(err)
            })
    }

    async fn resolve_customer(&self, auth: &AuthUser) -> UseCaseResult<String> {
        let user_id = auth.user_id;
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load user");
                SubscriptionError::Internal(err)
            })?
            .ok_or_else(|| SubscriptionError::Internal(anyhow!("user {user_id} not found")))?;

        if let Some(existing) = user
            .stripe_customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(existing.to_string());
        }

        let customer_id = self
            .gateway
            .create_customer(&user.email, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: customer creation failed");
                SubscriptionError::Gateway(err)
            })?;

        self.user_repo
            .set_stripe_customer_id(user_id, &customer_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to persist customer id"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, "subscriptions: gateway customer created");
        Ok(customer_id)
    }

    async fn apply_pending_intent(&self, intent: &SubscriptionIntentEntity) -> UseCaseResult<bool> {
        let subscription = self
            .subscription_repo
            .find_by_id(intent.subscription_id)
            .await
            .map_err(SubscriptionError::Internal)?;

        let subscription = match subscription {
            Some(subscription) if subscription.status().is_current() => subscription,
            _ => {
                settle_intent(
                    self.intent_repo.as_ref(),
                    intent.id,
                    IntentStatus::Completed,
                    Some("subscription no longer current".to_string()),
                )
                .await;
                info!(intent_id = %intent.id, "subscriptions: pending intent abandoned");
                return Ok(false);
            }
        };

        let applied = self
            .subscription_repo
            .apply_cancellation(
                intent.id,
                subscription.id,
                intent.created_at,
                cancellation_history(&subscription),
            )
            .await
            .map_err(|err| {
                error!(
                    intent_id = %intent.id,
                    db_error = ?err,
                    "subscriptions: failed to apply pending intent"
                );
                SubscriptionError::Internal(err)
            })?;

        if !applied {
            settle_intent(
                self.intent_repo.as_ref(),
                intent.id,
                IntentStatus::Completed,
                Some("subscription no longer current".to_string()),
            )
            .await;
        }
        Ok(applied)
    }

    fn dispatch_gateway_cancel(
        &self,
        intent_id: Uuid,
        user_id: Uuid,
        provider_subscription_id: Option<String>,
    ) -> JoinHandle<GatewayCancelOutcome> {
        let gateway = Arc::clone(&self.gateway);
        let intent_repo = Arc::clone(&self.intent_repo);

        tokio::spawn(async move {
            let outcome = match provider_subscription_id.as_deref() {
                None => GatewayCancelOutcome::Skipped,
                Some(provider_id) => {
                    match gateway.cancel_subscription_at_period_end(provider_id).await {
                        Ok(()) => GatewayCancelOutcome::Completed,
                        Err(err) => GatewayCancelOutcome::Failed(format!("{err:#}")),
                    }
                }
            };

            match &outcome {
                GatewayCancelOutcome::Completed => {
                    info!(%intent_id, %user_id, "subscriptions: gateway cancel completed");
                    settle_intent(intent_repo.as_ref(), intent_id, IntentStatus::Completed, None).await;
                }
                GatewayCancelOutcome::Skipped => {
                    info!(
                        %intent_id,
                        %user_id,
                        "subscriptions: no gateway subscription, cancel skipped"
                    );
                    settle_intent(intent_repo.as_ref(), intent_id, IntentStatus::Completed, None).await;
                }
                GatewayCancelOutcome::Failed(reason) => {
                    error!(
                        %intent_id,
                        %user_id,
                        error = %reason,
                        "subscriptions: gateway cancel failed"
                    );
                    settle_intent(
                        intent_repo.as_ref(),
                        intent_id,
                        IntentStatus::GatewayFailed,
                        Some(reason.clone()),
                    )
                    .await;
                }
            }

            outcome
        })
    }
}

async fn settle_intent<I>(
    intent_repo: &I,
    intent_id: Uuid,
    status: IntentStatus,
    last_error: Option<String>,
) where
    I: SubscriptionIntentRepository + Send + Sync,
{
    if let Err(err) = intent_repo.mark_status(intent_id, status, last_error).await {
        error!(
            %intent_id,
            status = %status,
            db_error = ?err,
            "subscriptions: failed to update intent status"
        );
    }
}

fn cancellation_history(subscription: &UserSubscriptionEntity) -> InsertSubscriptionHistoryEntity {
    InsertSubscriptionHistoryEntity {
        user_id: subscription.user_id,
        subscription_id: subscription.id,
        action: SubscriptionAction::Cancelled.to_string(),
        old_plan_id: Some(subscription.plan_id),
        new_plan_id: None,
    }
}
