use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    entities::users::UserEntity,
    repositories::{errors::RepositoryError, users::UserRepository, verifications::VerificationRepository},
    value_objects::{
        enums::{user_roles::UserRole, verification_flows::VerificationFlow},
        users::{
            CREDENTIAL_PROVIDER, EMAIL_OTP_PROVIDER, NewAccountModel, NewUserModel, USERNAME_CONSTRAINT,
            UserSummary,
        },
        verification_payloads::{LoginKind, LoginPayload},
    },
};
use rand::RngCore;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    auth::{AuthError, SessionKeys, passwords::verify_password},
    usecases::verification_ledger::{
        OTP_TTL_MINUTES, VerificationError, VerificationLedger, normalize_identifier,
    },
};

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("this account has been suspended")]
    AccountBanned,
    #[error("the new email is the same as the current one")]
    SameEmail,
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Session(#[from] AuthError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthFlowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthFlowError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthFlowError::AccountBanned => StatusCode::FORBIDDEN,
            AuthFlowError::SameEmail => StatusCode::BAD_REQUEST,
            AuthFlowError::Verification(err) => err.status_code(),
            AuthFlowError::Session(err) => err.status_code(),
            AuthFlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthFlowError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthFlowError::AccountBanned => "ACCOUNT_BANNED",
            AuthFlowError::SameEmail => "SAME_EMAIL",
            AuthFlowError::Verification(err) => err.code(),
            AuthFlowError::Session(err) => err.code(),
            AuthFlowError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type AuthFlowResult<T> = std::result::Result<T, AuthFlowError>;

/// Unique-constraint conflicts mean someone else finished first.
pub(crate) fn conflict_as_exists(err: RepositoryError) -> AuthFlowError {
    match err {
        RepositoryError::Conflict(constraint) => {
            info!(%constraint, "auth: write rejected by unique constraint");
            AuthFlowError::Verification(VerificationError::AlreadyExists)
        }
        RepositoryError::Internal(err) => AuthFlowError::Internal(err),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailLoginOutcome {
    pub email: String,
    pub session_token: String,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionGrant {
    pub access_token: String,
    pub expires_in: i64,
    pub user: UserSummary,
}

/// Username for accounts created by email sign in: the mailbox name plus a random suffix.
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(20)
        .collect::<String>()
        .to_lowercase();
    if base.is_empty() {
        base.push_str("learner");
    }

    let mut suffix = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("{base}_{}", hex::encode(suffix))
}

/// Generated usernames tried before a username conflict is reported.
const USERNAME_ATTEMPTS: u32 = 3;

pub struct AuthFlowUseCase<U, V>
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    ledger: Arc<VerificationLedger<V>>,
    session_keys: Arc<SessionKeys>,
}

impl<U, V> AuthFlowUseCase<U, V>
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        ledger: Arc<VerificationLedger<V>>,
        session_keys: Arc<SessionKeys>,
    ) -> Self {
        Self {
            user_repo,
            ledger,
            session_keys,
        }
    }

    async fn load_user_by_identifier(&self, identifier: &str) -> AuthFlowResult<Option<UserEntity>> {
        let identifier = identifier.trim();
        let lookup = if identifier.contains('@') {
            self.user_repo
                .find_by_email(&normalize_identifier(identifier))
                .await
        } else {
            self.user_repo.find_by_username(identifier).await
        };

        lookup.map_err(|err| {
            error!(db_error = ?err, "auth: failed to load user");
            AuthFlowError::Internal(err)
        })
    }

    fn ensure_not_banned(user: &UserEntity) -> AuthFlowResult<()> {
        if user.banned {
            warn!(user_id = %user.id, "auth: banned user rejected");
            return Err(AuthFlowError::AccountBanned);
        }
        Ok(())
    }

    /// Checks the password and emails a sign-in code. Returns the address it went to.
    pub async fn password_send_otp(&self, identifier: &str, password: &str) -> AuthFlowResult<String> {
        let user = self
            .load_user_by_identifier(identifier)
            .await?
            .ok_or(AuthFlowError::InvalidCredentials)?;
        Self::ensure_not_banned(&user)?;

        let stored_hash = self
            .user_repo
            .find_account(user.id, CREDENTIAL_PROVIDER)
            .await
            .map_err(AuthFlowError::Internal)?
            .and_then(|account| account.password)
            .ok_or_else(|| {
                info!(user_id = %user.id, "auth: user has no password account");
                AuthFlowError::InvalidCredentials
            })?;

        if !verify_password(password, &stored_hash) {
            info!(user_id = %user.id, "auth: password rejected");
            return Err(AuthFlowError::InvalidCredentials);
        }

        let payload = LoginPayload {
            user_id: Some(user.id),
            email: user.email.clone(),
            otp: String::new(),
            kind: Some(LoginKind::Password),
        };
        let issued = self
            .ledger
            .issue(VerificationFlow::PasswordLogin, &user.email, payload, OTP_TTL_MINUTES)
            .await?;

        info!(user_id = %user.id, "auth: password login code sent");
        Ok(issued.email)
    }

    /// Returns a session bridge token.
    pub async fn password_verify(&self, email: &str, otp: &str) -> AuthFlowResult<String> {
        let verified = self
            .ledger
            .verify::<LoginPayload>(VerificationFlow::PasswordLogin, email, otp)
            .await?;
        let user_id = verified
            .payload
            .user_id
            .ok_or(AuthFlowError::Verification(VerificationError::Corrupt))?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(AuthFlowError::Internal)?
            .ok_or(AuthFlowError::InvalidCredentials)?;
        Self::ensure_not_banned(&user)?;

        self.ledger.consume(&verified.record_id).await?;
        let token = self.ledger.mint_session_bridge(user.id, &user.email).await?;

        info!(user_id = %user.id, "auth: password login verified");
        Ok(token)
    }

    pub async fn password_resend(&self, email: &str) -> AuthFlowResult<()> {
        self.ledger
            .resend(VerificationFlow::PasswordLogin, email)
            .await?;
        Ok(())
    }

    /// Sends a sign-in code to any address; unknown addresses get an account on verify.
    pub async fn email_send_otp(&self, email: &str) -> AuthFlowResult<String> {
        let email = normalize_identifier(email);
        let existing = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(AuthFlowError::Internal)?;
        if let Some(user) = existing.as_ref() {
            Self::ensure_not_banned(user)?;
        }

        let payload = LoginPayload {
            user_id: existing.as_ref().map(|user| user.id),
            email: email.clone(),
            otp: String::new(),
            kind: Some(LoginKind::Email),
        };
        let issued = self
            .ledger
            .issue(VerificationFlow::EmailLogin, &email, payload, OTP_TTL_MINUTES)
            .await?;

        info!(known_user = existing.is_some(), "auth: email login code sent");
        Ok(issued.email)
    }

    pub async fn email_verify(&self, email: &str, otp: &str) -> AuthFlowResult<EmailLoginOutcome> {
        let verified = self
            .ledger
            .verify::<LoginPayload>(VerificationFlow::EmailLogin, email, otp)
            .await?;
        let email = normalize_identifier(&verified.payload.email);

        let existing = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(AuthFlowError::Internal)?;

        let (user, created) = match existing {
            Some(user) => {
                Self::ensure_not_banned(&user)?;
                self.ledger.consume(&verified.record_id).await?;
                (user, false)
            }
            None => {
                let user = self
                    .create_email_login_user(&email, &verified.record_id)
                    .await?;
                info!(user_id = %user.id, "auth: user created from email login");
                (user, true)
            }
        };

        let session_token = self.ledger.mint_session_bridge(user.id, &user.email).await?;

        Ok(EmailLoginOutcome {
            email: user.email,
            session_token,
            created,
        })
    }

    async fn create_email_login_user(
        &self,
        email: &str,
        consumed_verification_id: &str,
    ) -> AuthFlowResult<UserEntity> {
        let mut attempt = 1;
        loop {
            let new_user = NewUserModel {
                email: email.to_string(),
                username: username_from_email(email),
                first_name: email.split('@').next().unwrap_or_default().to_string(),
                last_name: String::new(),
                role: UserRole::Student,
                email_verified: true,
                account: NewAccountModel {
                    provider_id: EMAIL_OTP_PROVIDER.to_string(),
                    account_id: email.to_string(),
                    password_hash: None,
                },
            };

            match self
                .user_repo
                .create_with_account(new_user, consumed_verification_id)
                .await
            {
                Ok(user) => return Ok(user),
                Err(RepositoryError::Conflict(constraint))
                    if constraint == USERNAME_CONSTRAINT && attempt < USERNAME_ATTEMPTS =>
                {
                    warn!(attempt, "auth: generated username taken, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(conflict_as_exists(err)),
            }
        }
    }

    pub async fn email_resend(&self, email: &str) -> AuthFlowResult<()> {
        self.ledger.resend(VerificationFlow::EmailLogin, email).await?;
        Ok(())
    }

    /// Trades a session bridge token for a signed session.
    pub async fn exchange_session(&self, bridge_token: &str) -> AuthFlowResult<SessionGrant> {
        let bridge = self.ledger.redeem_session_bridge(bridge_token).await?;

        let user = self
            .user_repo
            .find_by_id(bridge.user_id)
            .await
            .map_err(AuthFlowError::Internal)?
            .ok_or(AuthFlowError::InvalidCredentials)?;
        Self::ensure_not_banned(&user)?;

        let summary = user.summary();
        let access_token = self.session_keys.issue(&summary)?;

        info!(user_id = %user.id, "auth: session issued");
        Ok(SessionGrant {
            access_token,
            expires_in: self.session_keys.ttl_seconds(),
            user: summary,
        })
    }
}
