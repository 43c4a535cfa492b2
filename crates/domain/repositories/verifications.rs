use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::{
    entities::verifications::{UpsertVerificationEntity, VerificationEntity},
    value_objects::enums::verification_flows::VerificationFlow,
};

#[async_trait]
#[automock]
pub trait VerificationRepository {
    /// Writes the `(identifier, flow)` slot, replacing id, value, attempts and expiry.
    async fn upsert_slot(&self, entity: UpsertVerificationEntity) -> Result<()>;

    /// Plain insert keyed by `entity.id`. Session bridges for the same identifier coexist.
    async fn insert(&self, entity: UpsertVerificationEntity) -> Result<()>;

    async fn find_slot(
        &self,
        identifier: &str,
        flow: VerificationFlow,
    ) -> Result<Option<VerificationEntity>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<VerificationEntity>>;

    /// Returns the attempt count after the increment.
    async fn increment_attempts(&self, id: &str) -> Result<i32>;

    /// Rotates the code in place: new value, new expiry, attempts reset.
    async fn rotate_code(&self, id: &str, value: String, expires_at: DateTime<Utc>)
    -> Result<()>;

    async fn delete_by_id(&self, id: &str) -> Result<()>;
}
