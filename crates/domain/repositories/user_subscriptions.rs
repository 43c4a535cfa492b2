use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    subscription_history::InsertSubscriptionHistoryEntity,
    user_subscriptions::UserSubscriptionEntity,
};

#[async_trait]
#[automock]
pub trait UserSubscriptionRepository {
    /// Most recent subscription whose status is `active` or `trial`.
    async fn find_current_for_user(&self, user_id: Uuid)
    -> Result<Option<UserSubscriptionEntity>>;

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<UserSubscriptionEntity>>;

    /// Finalizes a cancellation intent in one transaction: flips the row to
    /// `cancelled` (only while it is still current), appends `history` and marks
    /// the intent `applied`. Returns `false` when the row was no longer current,
    /// in which case nothing is written.
    async fn apply_cancellation(
        &self,
        intent_id: Uuid,
        subscription_id: Uuid,
        cancelled_at: DateTime<Utc>,
        history: InsertSubscriptionHistoryEntity,
    ) -> Result<bool>;
}
