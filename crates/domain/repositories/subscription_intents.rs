use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscription_intents::{InsertSubscriptionIntentEntity, SubscriptionIntentEntity},
    value_objects::enums::intent_statuses::IntentStatus,
};

#[async_trait]
#[automock]
pub trait SubscriptionIntentRepository {
    async fn create(&self, intent: InsertSubscriptionIntentEntity) -> Result<Uuid>;

    async fn mark_status(
        &self,
        intent_id: Uuid,
        status: IntentStatus,
        last_error: Option<String>,
    ) -> Result<()>;

    async fn list_by_statuses(
        &self,
        statuses: Vec<IntentStatus>,
    ) -> Result<Vec<SubscriptionIntentEntity>>;
}
