use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::verifications},
};
use domain::{
    entities::verifications::{UpsertVerificationEntity, VerificationEntity},
    repositories::verifications::VerificationRepository,
    value_objects::enums::verification_flows::VerificationFlow,
};

pub struct VerificationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl VerificationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl VerificationRepository for VerificationPostgres {
    async fn upsert_slot(&self, entity: UpsertVerificationEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(verifications::table)
            .values(&entity)
            .on_conflict((verifications::identifier, verifications::flow))
            .filter_target(verifications::flow.ne(VerificationFlow::SessionBridge.as_str()))
            .do_update()
            .set((
                verifications::id.eq(&entity.id),
                verifications::value.eq(&entity.value),
                verifications::attempts.eq(entity.attempts),
                verifications::expires_at.eq(entity.expires_at),
                verifications::created_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn insert(&self, entity: UpsertVerificationEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(verifications::table)
            .values(&entity)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_slot(
        &self,
        identifier: &str,
        flow: VerificationFlow,
    ) -> Result<Option<VerificationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let record = verifications::table
            .filter(verifications::identifier.eq(identifier))
            .filter(verifications::flow.eq(flow.as_str()))
            .select(VerificationEntity::as_select())
            .first::<VerificationEntity>(&mut conn)
            .optional()?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<VerificationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let record = verifications::table
            .filter(verifications::id.eq(id))
            .select(VerificationEntity::as_select())
            .first::<VerificationEntity>(&mut conn)
            .optional()?;

        Ok(record)
    }

    async fn increment_attempts(&self, id: &str) -> Result<i32> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let attempts = update(verifications::table.filter(verifications::id.eq(id)))
            .set(verifications::attempts.eq(verifications::attempts + 1))
            .returning(verifications::attempts)
            .get_result::<i32>(&mut conn)?;

        Ok(attempts)
    }

    async fn rotate_code(
        &self,
        id: &str,
        value: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(verifications::table.filter(verifications::id.eq(id)))
            .set((
                verifications::value.eq(value),
                verifications::expires_at.eq(expires_at),
                verifications::attempts.eq(0),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(verifications::table.filter(verifications::id.eq(id))).execute(&mut conn)?;

        Ok(())
    }
}
