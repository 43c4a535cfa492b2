use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscription_history;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = subscription_history)]
pub struct SubscriptionHistoryEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub action: String,
    pub old_plan_id: Option<Uuid>,
    pub new_plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = subscription_history)]
pub struct InsertSubscriptionHistoryEntity {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub action: String,
    pub old_plan_id: Option<Uuid>,
    pub new_plan_id: Option<Uuid>,
}
