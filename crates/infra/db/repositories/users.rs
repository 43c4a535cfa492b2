use anyhow::Result;
use async_trait::async_trait;
use diesel::{
    Connection, OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*,
    result::Error as DieselError, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::{PgPoolSquad, classify_diesel_error},
        schema::{accounts, users, verifications},
    },
};
use domain::{
    entities::{
        accounts::{AccountEntity, InsertAccountEntity},
        users::{InsertUserEntity, UserEntity},
    },
    repositories::{
        errors::{RepositoryError, RepositoryResult},
        users::UserRepository,
    },
    value_objects::users::{CREDENTIAL_PROVIDER, EMAIL_OTP_PROVIDER, NewUserModel},
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::id.eq(user_id))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::email.eq(email))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::username.eq(username))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn find_account(
        &self,
        user_id: Uuid,
        provider_id: &str,
    ) -> Result<Option<AccountEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let account = accounts::table
            .filter(accounts::user_id.eq(user_id))
            .filter(accounts::provider_id.eq(provider_id))
            .select(AccountEntity::as_select())
            .first::<AccountEntity>(&mut conn)
            .optional()?;

        Ok(account)
    }

    async fn create_with_account(
        &self,
        new_user: NewUserModel,
        consumed_verification_id: &str,
    ) -> RepositoryResult<UserEntity> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .map_err(|err| RepositoryError::Internal(err.into()))?;

        conn.transaction::<UserEntity, DieselError, _>(|conn| {
            let insert_user = InsertUserEntity {
                email: new_user.email.clone(),
                username: new_user.username.clone(),
                first_name: new_user.first_name.clone(),
                last_name: new_user.last_name.clone(),
                role: new_user.role.to_string(),
                email_verified: new_user.email_verified,
            };

            let user = insert_into(users::table)
                .values(&insert_user)
                .returning(UserEntity::as_returning())
                .get_result::<UserEntity>(conn)?;

            let insert_account = InsertAccountEntity {
                user_id: user.id,
                provider_id: new_user.account.provider_id.clone(),
                account_id: new_user.account.account_id.clone(),
                password: new_user.account.password_hash.clone(),
            };

            insert_into(accounts::table)
                .values(&insert_account)
                .execute(conn)?;

            delete(verifications::table.filter(verifications::id.eq(consumed_verification_id)))
                .execute(conn)?;

            Ok(user)
        })
        .map_err(classify_diesel_error)
    }

    async fn change_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        consumed_verification_id: &str,
    ) -> RepositoryResult<()> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .map_err(|err| RepositoryError::Internal(err.into()))?;

        conn.transaction::<(), DieselError, _>(|conn| {
            update(users::table.filter(users::id.eq(user_id)))
                .set((users::email.eq(new_email), users::email_verified.eq(true)))
                .execute(conn)?;

            update(
                accounts::table
                    .filter(accounts::user_id.eq(user_id))
                    .filter(accounts::provider_id.eq_any(vec![CREDENTIAL_PROVIDER, EMAIL_OTP_PROVIDER])),
            )
            .set(accounts::account_id.eq(new_email))
            .execute(conn)?;

            delete(verifications::table.filter(verifications::id.eq(consumed_verification_id)))
                .execute(conn)?;

            Ok(())
        })
        .map_err(classify_diesel_error)
    }

    async fn set_stripe_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table.filter(users::id.eq(user_id)))
            .set(users::stripe_customer_id.eq(customer_id))
            .execute(&mut conn)?;

        Ok(())
    }
}
