use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{enums::billing_cycles::BillingCycle, plans::PlanFeatures},
    infra::db::postgres::schema::subscription_plans,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntity {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price_monthly_minor: i32,
    pub price_yearly_minor: i32,
    pub stripe_price_id_monthly: Option<String>,
    pub stripe_price_id_yearly: Option<String>,
    pub is_active: bool,
    pub features: PlanFeatures,
}

impl PlanEntity {
    /// Gateway price for the given cadence; blank ids count as unconfigured.
    pub fn stripe_price_id(&self, cycle: BillingCycle) -> Option<&str> {
        let price = match cycle {
            BillingCycle::Monthly => self.stripe_price_id_monthly.as_deref(),
            BillingCycle::Yearly => self.stripe_price_id_yearly.as_deref(),
        };
        price.map(str::trim).filter(|id| !id.is_empty())
    }
}

/// Raw row used for Diesel queries. Features stay as JSON and are parsed into PlanFeatures.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_plans)]
pub struct PlanRow {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price_monthly_minor: i32,
    pub price_yearly_minor: i32,
    pub stripe_price_id_monthly: Option<String>,
    pub stripe_price_id_yearly: Option<String>,
    pub is_active: bool,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanEntity {
    fn from(value: PlanRow) -> Self {
        let features = serde_json::from_value(value.features).unwrap_or_default();

        Self {
            id: value.id,
            slug: value.slug,
            name: value.name,
            price_monthly_minor: value.price_monthly_minor,
            price_yearly_minor: value.price_yearly_minor,
            stripe_price_id_monthly: value.stripe_price_id_monthly,
            stripe_price_id_yearly: value.stripe_price_id_yearly,
            is_active: value.is_active,
            features,
        }
    }
}
