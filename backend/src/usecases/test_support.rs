//! In-memory stores for use case tests that need state across calls.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::{
            accounts::AccountEntity,
            users::UserEntity,
            verifications::{UpsertVerificationEntity, VerificationEntity},
        },
        repositories::{
            errors::{RepositoryError, RepositoryResult},
            users::UserRepository,
            verifications::VerificationRepository,
        },
        value_objects::{
            enums::verification_flows::VerificationFlow,
            users::{NewUserModel, USERNAME_CONSTRAINT},
        },
    },
    email::{EmailSender, OtpEmail},
};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryVerifications {
    rows: Mutex<Vec<VerificationEntity>>,
}

impl InMemoryVerifications {
    pub fn count_for(&self, identifier: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.identifier == identifier)
            .count()
    }

    pub fn total(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, id: &str) -> Option<VerificationEntity> {
        self.rows.lock().unwrap().iter().find(|row| row.id == id).cloned()
    }

    pub fn shift_expiry(&self, identifier: &str, by: Duration) {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.identifier == identifier {
                row.expires_at += by;
            }
        }
    }

    pub fn set_attempts(&self, id: &str, attempts: i32) {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.id == id {
                row.attempts = attempts;
            }
        }
    }

    pub fn insert_raw(&self, identifier: &str, flow: VerificationFlow, value: &str) {
        let now = Utc::now();
        self.rows.lock().unwrap().push(VerificationEntity {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.to_string(),
            flow: flow.as_str().to_string(),
            value: value.to_string(),
            attempts: 0,
            expires_at: now + Duration::minutes(10),
            created_at: now,
            updated_at: now,
        });
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        rows.len() != before
    }
}

#[async_trait]
impl VerificationRepository for InMemoryVerifications {
    async fn upsert_slot(&self, entity: UpsertVerificationEntity) -> Result<()> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|row| !(row.identifier == entity.identifier && row.flow == entity.flow));
        rows.push(VerificationEntity {
            id: entity.id,
            identifier: entity.identifier,
            flow: entity.flow,
            value: entity.value,
            attempts: entity.attempts,
            expires_at: entity.expires_at,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn insert(&self, entity: UpsertVerificationEntity) -> Result<()> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|row| row.id == entity.id) {
            return Err(anyhow!("duplicate verification id {}", entity.id));
        }
        rows.push(VerificationEntity {
            id: entity.id,
            identifier: entity.identifier,
            flow: entity.flow,
            value: entity.value,
            attempts: entity.attempts,
            expires_at: entity.expires_at,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn find_slot(
        &self,
        identifier: &str,
        flow: VerificationFlow,
    ) -> Result<Option<VerificationEntity>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.identifier == identifier && row.flow == flow.as_str())
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<VerificationEntity>> {
        Ok(self.get(id))
    }

    async fn increment_attempts(&self, id: &str) -> Result<i32> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| anyhow!("no verification {id}"))?;
        row.attempts += 1;
        Ok(row.attempts)
    }

    async fn rotate_code(&self, id: &str, value: String, expires_at: DateTime<Utc>) -> Result<()> {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.id == id {
                row.value = value.clone();
                row.expires_at = expires_at;
                row.attempts = 0;
                row.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.remove(id);
        Ok(())
    }
}

/// Users and accounts whose creation removes the consumed verification row in
/// the same critical section, like the database transaction does.
pub struct InMemoryUsers {
    pub users: Mutex<Vec<UserEntity>>,
    pub accounts: Mutex<Vec<AccountEntity>>,
    verifications: Arc<InMemoryVerifications>,
}

impl InMemoryUsers {
    pub fn new(verifications: Arc<InMemoryVerifications>) -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            accounts: Mutex::new(Vec::new()),
            verifications,
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    pub fn seed(&self, user: UserEntity, account: Option<AccountEntity>) {
        self.users.lock().unwrap().push(user);
        if let Some(account) = account {
            self.accounts.lock().unwrap().push(account);
        }
    }
}

pub fn sample_user(email: &str, username: &str) -> UserEntity {
    let now = Utc::now();
    UserEntity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        username: username.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        role: "student".to_string(),
        banned: false,
        points: 0,
        email_verified: true,
        stripe_customer_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_account(&self, user_id: Uuid, provider_id: &str) -> Result<Option<AccountEntity>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.user_id == user_id && a.provider_id == provider_id)
            .cloned())
    }

    async fn create_with_account(
        &self,
        new_user: NewUserModel,
        consumed_verification_id: &str,
    ) -> RepositoryResult<UserEntity> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(RepositoryError::Conflict("users_email_key".to_string()));
        }
        if users.iter().any(|u| u.username == new_user.username) {
            return Err(RepositoryError::Conflict(USERNAME_CONSTRAINT.to_string()));
        }

        let mut user = sample_user(&new_user.email, &new_user.username);
        user.first_name = new_user.first_name;
        user.last_name = new_user.last_name;
        user.role = new_user.role.to_string();
        user.email_verified = new_user.email_verified;

        self.accounts.lock().unwrap().push(AccountEntity {
            id: Uuid::new_v4(),
            user_id: user.id,
            provider_id: new_user.account.provider_id,
            account_id: new_user.account.account_id,
            password: new_user.account.password_hash,
            created_at: Utc::now(),
        });
        self.verifications.remove(consumed_verification_id);
        users.push(user.clone());
        Ok(user)
    }

    async fn change_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        consumed_verification_id: &str,
    ) -> RepositoryResult<()> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_email && u.id != user_id) {
            return Err(RepositoryError::Conflict("users_email_key".to_string()));
        }
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| RepositoryError::Internal(anyhow!("no user {user_id}")))?;
        user.email = new_email.to_string();
        self.verifications.remove(consumed_verification_id);
        Ok(())
    }

    async fn set_stripe_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        for user in self.users.lock().unwrap().iter_mut() {
            if user.id == user_id {
                user.stripe_customer_id = Some(customer_id.to_string());
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SentCodes(Arc<Mutex<Vec<OtpEmail>>>);

impl SentCodes {
    pub fn last_code(&self) -> Option<String> {
        self.0.lock().unwrap().last().map(|email| email.code.clone())
    }

    pub fn last(&self) -> Option<OtpEmail> {
        self.0.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

struct RecordingEmailSender {
    sent: SentCodes,
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_otp(&self, email: OtpEmail) -> Result<()> {
        self.sent.0.lock().unwrap().push(email);
        Ok(())
    }
}

pub fn recording_email_sender() -> (Arc<dyn EmailSender>, SentCodes) {
    let sent = SentCodes::default();
    let sender = RecordingEmailSender { sent: sent.clone() };
    (Arc::new(sender), sent)
}
