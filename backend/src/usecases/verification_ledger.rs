use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::verifications::UpsertVerificationEntity,
        repositories::verifications::VerificationRepository,
        value_objects::{
            enums::verification_flows::VerificationFlow,
            verification_payloads::{OtpPayload, SessionBridgePayload},
        },
    },
    email::{EmailSender, OtpEmail},
};
use rand::{Rng, RngCore};
use serde::{Serialize, de::DeserializeOwned};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const OTP_TTL_MINUTES: i64 = 10;
pub const RESEND_TTL_MINUTES: i64 = 10;
pub const SESSION_BRIDGE_TTL_MINUTES: i64 = 5;
/// Failed submissions allowed against one code before the slot is dropped.
pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("no pending verification for this address")]
    NotFound,
    #[error("verification code has expired")]
    Expired,
    #[error("stored verification record is unreadable")]
    Corrupt,
    #[error("verification code does not match")]
    Mismatch,
    #[error("verification record does not belong to this address")]
    EmailMismatch,
    #[error("an account with these details already exists")]
    AlreadyExists,
    #[error("too many failed attempts, request a new code")]
    TooManyAttempts,
    #[error("failed to send verification email")]
    Email(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VerificationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerificationError::NotFound => StatusCode::NOT_FOUND,
            VerificationError::Expired
            | VerificationError::Mismatch
            | VerificationError::EmailMismatch => StatusCode::BAD_REQUEST,
            VerificationError::AlreadyExists => StatusCode::CONFLICT,
            VerificationError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            VerificationError::Email(_) => StatusCode::BAD_GATEWAY,
            VerificationError::Corrupt | VerificationError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::NotFound => "OTP_NOT_FOUND",
            VerificationError::Expired => "OTP_EXPIRED",
            VerificationError::Corrupt => "OTP_CORRUPT",
            VerificationError::Mismatch => "OTP_MISMATCH",
            VerificationError::EmailMismatch => "OTP_EMAIL_MISMATCH",
            VerificationError::AlreadyExists => "ALREADY_EXISTS",
            VerificationError::TooManyAttempts => "OTP_TOO_MANY_ATTEMPTS",
            VerificationError::Email(_) => "EMAIL_DELIVERY_FAILED",
            VerificationError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, VerificationError>;

#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCode {
    pub record_id: String,
    /// Address the code was sent to.
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Slot a code lives in and the address it is mailed to.
///
/// Most flows key the slot by the address itself. [`SlotKey::scoped`] prefixes
/// the owner so two users asking for the same address get separate slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKey {
    identifier: String,
    email: String,
}

impl SlotKey {
    pub fn address(email: &str) -> Self {
        let email = normalize_identifier(email);
        Self {
            identifier: email.clone(),
            email,
        }
    }

    pub fn scoped(owner: Uuid, email: &str) -> Self {
        let email = normalize_identifier(email);
        Self {
            identifier: format!("{owner}:{email}"),
            email,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<&str> for SlotKey {
    fn from(email: &str) -> Self {
        SlotKey::address(email)
    }
}

impl From<&String> for SlotKey {
    fn from(email: &String) -> Self {
        SlotKey::address(email)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verified<P> {
    pub record_id: String,
    pub payload: P,
}

pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

fn generate_bridge_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn codes_match(submitted: &str, stored: &str) -> bool {
    submitted.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// One-time code store keyed by `(slot identifier, flow)`. Issuing again replaces
/// the slot, so only the latest code for a flow is ever valid.
pub struct VerificationLedger<V>
where
    V: VerificationRepository + Send + Sync + 'static,
{
    verification_repo: Arc<V>,
    email_sender: Arc<dyn EmailSender>,
}

impl<V> VerificationLedger<V>
where
    V: VerificationRepository + Send + Sync + 'static,
{
    pub fn new(verification_repo: Arc<V>, email_sender: Arc<dyn EmailSender>) -> Self {
        Self {
            verification_repo,
            email_sender,
        }
    }

    pub async fn issue<P>(
        &self,
        flow: VerificationFlow,
        slot: impl Into<SlotKey>,
        mut payload: P,
        ttl_minutes: i64,
    ) -> LedgerResult<IssuedCode>
    where
        P: OtpPayload + Serialize + Send,
    {
        let slot = slot.into();
        let code = generate_otp();
        payload.set_otp(code.clone());

        let value = serde_json::to_string(&payload).map_err(|err| {
            error!(%flow, error = ?err, "verification: failed to encode payload");
            VerificationError::Internal(err.into())
        })?;

        let record_id = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

        self.verification_repo
            .upsert_slot(UpsertVerificationEntity {
                id: record_id.clone(),
                identifier: slot.identifier().to_string(),
                flow: flow.as_str().to_string(),
                value,
                attempts: 0,
                expires_at,
            })
            .await
            .map_err(|err| {
                error!(%flow, db_error = ?err, "verification: failed to store code");
                VerificationError::Internal(err)
            })?;

        self.send_code(flow, slot.email(), code, ttl_minutes).await?;

        info!(%flow, %expires_at, "verification: code issued");
        Ok(IssuedCode {
            record_id,
            email: slot.email,
            expires_at,
        })
    }

    /// Checks `otp` against the slot without consuming it.
    pub async fn verify<P>(
        &self,
        flow: VerificationFlow,
        slot: impl Into<SlotKey>,
        otp: &str,
    ) -> LedgerResult<Verified<P>>
    where
        P: OtpPayload + DeserializeOwned + Send,
    {
        let slot = slot.into();

        let record = self
            .verification_repo
            .find_slot(slot.identifier(), flow)
            .await
            .map_err(|err| {
                error!(%flow, db_error = ?err, "verification: failed to load slot");
                VerificationError::Internal(err)
            })?
            .ok_or_else(|| {
                info!(%flow, "verification: no pending code");
                VerificationError::NotFound
            })?;

        if record.is_expired_at(Utc::now()) {
            self.discard(&record.id).await?;
            info!(%flow, record_id = %record.id, "verification: code expired");
            return Err(VerificationError::Expired);
        }

        if record.attempts >= MAX_ATTEMPTS {
            self.discard(&record.id).await?;
            return Err(VerificationError::TooManyAttempts);
        }

        let payload: P = serde_json::from_str(&record.value).map_err(|err| {
            error!(%flow, record_id = %record.id, error = ?err, "verification: stored payload unreadable");
            VerificationError::Corrupt
        })?;

        if !codes_match(otp.trim(), payload.otp()) {
            let attempts = self
                .verification_repo
                .increment_attempts(&record.id)
                .await
                .map_err(VerificationError::Internal)?;

            if attempts >= MAX_ATTEMPTS {
                self.discard(&record.id).await?;
                warn!(%flow, record_id = %record.id, attempts, "verification: slot locked after failed attempts");
                return Err(VerificationError::TooManyAttempts);
            }

            info!(%flow, record_id = %record.id, attempts, "verification: code mismatch");
            return Err(VerificationError::Mismatch);
        }

        if normalize_identifier(payload.email()) != slot.email() {
            warn!(%flow, record_id = %record.id, "verification: payload email differs from identifier");
            return Err(VerificationError::EmailMismatch);
        }

        Ok(Verified {
            record_id: record.id,
            payload,
        })
    }

    /// Single use: the record is gone afterwards.
    pub async fn consume(&self, record_id: &str) -> LedgerResult<()> {
        self.verification_repo
            .delete_by_id(record_id)
            .await
            .map_err(|err| {
                error!(%record_id, db_error = ?err, "verification: failed to consume record");
                VerificationError::Internal(err)
            })
    }

    pub async fn verify_and_consume<P>(
        &self,
        flow: VerificationFlow,
        slot: impl Into<SlotKey>,
        otp: &str,
    ) -> LedgerResult<P>
    where
        P: OtpPayload + DeserializeOwned + Send,
    {
        let verified = self.verify::<P>(flow, slot, otp).await?;
        self.consume(&verified.record_id).await?;
        Ok(verified.payload)
    }

    /// Rotates the code of the existing slot, expired or not. Attempts are reset.
    pub async fn resend(
        &self,
        flow: VerificationFlow,
        slot: impl Into<SlotKey>,
    ) -> LedgerResult<IssuedCode> {
        let slot = slot.into();

        let record = self
            .verification_repo
            .find_slot(slot.identifier(), flow)
            .await
            .map_err(VerificationError::Internal)?
            .ok_or(VerificationError::NotFound)?;

        let mut value: serde_json::Value =
            serde_json::from_str(&record.value).map_err(|_| VerificationError::Corrupt)?;
        let fields = value.as_object_mut().ok_or(VerificationError::Corrupt)?;
        if !fields.contains_key("otp") {
            return Err(VerificationError::NotFound);
        }

        let code = generate_otp();
        fields.insert("otp".to_string(), serde_json::Value::String(code.clone()));

        let expires_at = Utc::now() + Duration::minutes(RESEND_TTL_MINUTES);
        self.verification_repo
            .rotate_code(&record.id, value.to_string(), expires_at)
            .await
            .map_err(|err| {
                error!(%flow, record_id = %record.id, db_error = ?err, "verification: failed to rotate code");
                VerificationError::Internal(err)
            })?;

        self.send_code(flow, slot.email(), code, RESEND_TTL_MINUTES)
            .await?;

        info!(%flow, record_id = %record.id, "verification: code resent");
        Ok(IssuedCode {
            record_id: record.id,
            email: slot.email,
            expires_at,
        })
    }

    /// Short-lived token the client trades for a session after a successful code check.
    pub async fn mint_session_bridge(&self, user_id: Uuid, email: &str) -> LedgerResult<String> {
        let email = normalize_identifier(email);
        let token = generate_bridge_token();
        let value = serde_json::to_string(&SessionBridgePayload::new(user_id, email.clone()))
            .map_err(|err| VerificationError::Internal(err.into()))?;

        self.verification_repo
            .insert(UpsertVerificationEntity {
                id: token.clone(),
                identifier: email,
                flow: VerificationFlow::SessionBridge.as_str().to_string(),
                value,
                attempts: 0,
                expires_at: Utc::now() + Duration::minutes(SESSION_BRIDGE_TTL_MINUTES),
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "verification: failed to mint session bridge");
                VerificationError::Internal(err)
            })?;

        info!(%user_id, "verification: session bridge minted");
        Ok(token)
    }

    pub async fn redeem_session_bridge(&self, token: &str) -> LedgerResult<SessionBridgePayload> {
        let record = self
            .verification_repo
            .find_by_id(token.trim())
            .await
            .map_err(VerificationError::Internal)?
            .filter(|record| record.flow == VerificationFlow::SessionBridge.as_str())
            .ok_or(VerificationError::NotFound)?;

        if record.is_expired_at(Utc::now()) {
            self.discard(&record.id).await?;
            return Err(VerificationError::Expired);
        }

        let payload: SessionBridgePayload =
            serde_json::from_str(&record.value).map_err(|_| VerificationError::Corrupt)?;

        self.consume(&record.id).await?;
        info!(user_id = %payload.user_id, "verification: session bridge redeemed");
        Ok(payload)
    }

    async fn discard(&self, record_id: &str) -> LedgerResult<()> {
        self.verification_repo
            .delete_by_id(record_id)
            .await
            .map_err(VerificationError::Internal)
    }

    async fn send_code(
        &self,
        flow: VerificationFlow,
        identifier: &str,
        code: String,
        ttl_minutes: i64,
    ) -> LedgerResult<()> {
        self.email_sender
            .send_otp(OtpEmail {
                to: identifier.to_string(),
                code,
                flow,
                ttl_minutes,
            })
            .await
            .map_err(|err| {
                error!(%flow, error = ?err, "verification: failed to send code email");
                VerificationError::Email(err)
            })
    }
}
