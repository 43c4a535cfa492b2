use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    subscription_history::SubscriptionHistoryEntity, subscription_plans::PlanEntity,
};
use crate::domain::value_objects::enums::{
    billing_cycles::BillingCycle, subscription_statuses::SubscriptionStatus,
};
use crate::domain::value_objects::plans::PlanFeatures;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDto {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price_monthly_minor: i32,
    pub price_yearly_minor: i32,
    pub features: PlanFeatures,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            slug: value.slug,
            name: value.name,
            price_monthly_minor: value.price_monthly_minor,
            price_yearly_minor: value.price_yearly_minor,
            features: value.features,
        }
    }
}

/// `status` alone does not decide access: a cancelled subscription stays usable
/// until `next_billing_date`, which `access_until` exposes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSubscriptionDto {
    pub subscription_id: Uuid,
    pub plan: PlanDto,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub auto_renew: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub access_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionHistoryDto {
    pub subscription_id: Uuid,
    pub action: String,
    pub old_plan_id: Option<Uuid>,
    pub new_plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<SubscriptionHistoryEntity> for SubscriptionHistoryDto {
    fn from(value: SubscriptionHistoryEntity) -> Self {
        Self {
            subscription_id: value.subscription_id,
            action: value.action,
            old_plan_id: value.old_plan_id,
            new_plan_id: value.new_plan_id,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub plan_id: Uuid,
}
