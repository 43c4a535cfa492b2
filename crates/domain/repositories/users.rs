use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::{accounts::AccountEntity, users::UserEntity},
    repositories::errors::RepositoryResult,
    value_objects::users::NewUserModel,
};

#[async_trait]
#[automock]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>>;

    async fn find_account(&self, user_id: Uuid, provider_id: &str)
    -> Result<Option<AccountEntity>>;

    /// Inserts the user and its account and deletes the consumed verification
    /// record, all in one transaction. An already registered email or username
    /// yields `RepositoryError::Conflict` and nothing is written.
    async fn create_with_account(
        &self,
        new_user: NewUserModel,
        consumed_verification_id: &str,
    ) -> RepositoryResult<UserEntity>;

    /// Moves the user (and its local accounts) to a new email and deletes the
    /// consumed verification record in the same transaction.
    async fn change_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        consumed_verification_id: &str,
    ) -> RepositoryResult<()>;

    async fn set_stripe_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()>;
}
