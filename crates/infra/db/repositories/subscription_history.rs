use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscription_history},
};
use domain::{
    entities::subscription_history::SubscriptionHistoryEntity,
    repositories::subscription_history::SubscriptionHistoryRepository,
};

pub struct SubscriptionHistoryPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionHistoryPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionHistoryRepository for SubscriptionHistoryPostgres {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionHistoryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entries = subscription_history::table
            .filter(subscription_history::user_id.eq(user_id))
            .order(subscription_history::created_at.desc())
            .select(SubscriptionHistoryEntity::as_select())
            .load::<SubscriptionHistoryEntity>(&mut conn)?;

        Ok(entries)
    }
}
