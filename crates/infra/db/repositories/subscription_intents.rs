use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscription_intents},
};
use domain::{
    entities::subscription_intents::{InsertSubscriptionIntentEntity, SubscriptionIntentEntity},
    repositories::subscription_intents::SubscriptionIntentRepository,
    value_objects::enums::intent_statuses::IntentStatus,
};

pub struct SubscriptionIntentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionIntentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionIntentRepository for SubscriptionIntentPostgres {
    async fn create(&self, intent: InsertSubscriptionIntentEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let id = insert_into(subscription_intents::table)
            .values(&intent)
            .returning(subscription_intents::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(id)
    }

    async fn mark_status(
        &self,
        intent_id: Uuid,
        status: IntentStatus,
        last_error: Option<String>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscription_intents::table.filter(subscription_intents::id.eq(intent_id)))
            .set((
                subscription_intents::status.eq(status.as_str()),
                subscription_intents::last_error.eq(last_error),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn list_by_statuses(
        &self,
        statuses: Vec<IntentStatus>,
    ) -> Result<Vec<SubscriptionIntentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let statuses: Vec<&str> = statuses.iter().map(IntentStatus::as_str).collect();
        let intents = subscription_intents::table
            .filter(subscription_intents::status.eq_any(statuses))
            .order(subscription_intents::created_at.asc())
            .select(SubscriptionIntentEntity::as_select())
            .load::<SubscriptionIntentEntity>(&mut conn)?;

        Ok(intents)
    }
}
