use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*,
    result::Error as DieselError, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{subscription_history, subscription_intents, user_subscriptions},
    },
};
use domain::{
    entities::{
        subscription_history::InsertSubscriptionHistoryEntity,
        user_subscriptions::UserSubscriptionEntity,
    },
    repositories::user_subscriptions::UserSubscriptionRepository,
    value_objects::enums::{
        intent_statuses::IntentStatus, subscription_statuses::SubscriptionStatus,
    },
};

pub struct UserSubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserSubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    fn current_status_strings() -> Vec<String> {
        SubscriptionStatus::current_statuses()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

#[async_trait]
impl UserSubscriptionRepository for UserSubscriptionPostgres {
    async fn find_current_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = user_subscriptions::table
            .filter(user_subscriptions::user_id.eq(user_id))
            .filter(user_subscriptions::status.eq_any(Self::current_status_strings()))
            .order(user_subscriptions::created_at.desc())
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = user_subscriptions::table
            .filter(user_subscriptions::id.eq(subscription_id))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn apply_cancellation(
        &self,
        intent_id: Uuid,
        subscription_id: Uuid,
        cancelled_at: DateTime<Utc>,
        history: InsertSubscriptionHistoryEntity,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let applied = conn.transaction::<bool, DieselError, _>(|conn| {
            let updated = update(
                user_subscriptions::table
                    .filter(user_subscriptions::id.eq(subscription_id))
                    .filter(user_subscriptions::status.eq_any(Self::current_status_strings())),
            )
            .set((
                user_subscriptions::auto_renew.eq(false),
                user_subscriptions::cancelled_at.eq(Some(cancelled_at)),
                user_subscriptions::status.eq(SubscriptionStatus::Cancelled.to_string()),
            ))
            .execute(conn)?;

            if updated == 0 {
                return Ok(false);
            }

            insert_into(subscription_history::table)
                .values(&history)
                .execute(conn)?;

            update(subscription_intents::table.filter(subscription_intents::id.eq(intent_id)))
                .set(subscription_intents::status.eq(IntentStatus::Applied.as_str()))
                .execute(conn)?;

            Ok(true)
        })?;

        Ok(applied)
    }
}
