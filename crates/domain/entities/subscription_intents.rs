use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::intent_statuses::IntentStatus,
    infra::db::postgres::schema::subscription_intents,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = subscription_intents)]
pub struct SubscriptionIntentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub action: String,
    pub status: String,
    pub provider_subscription_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionIntentEntity {
    pub fn status(&self) -> Option<IntentStatus> {
        IntentStatus::from_str(&self.status)
    }
}

#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = subscription_intents)]
pub struct InsertSubscriptionIntentEntity {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub action: String,
    pub status: String,
    pub provider_subscription_id: Option<String>,
}
