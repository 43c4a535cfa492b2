use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscription_history::SubscriptionHistoryEntity;

/// Read side of the append-only audit log. Rows are only ever inserted, inside
/// the transaction that changes the subscription they describe.
#[async_trait]
#[automock]
pub trait SubscriptionHistoryRepository {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionHistoryEntity>>;
}
