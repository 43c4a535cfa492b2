use std::sync::Arc;

use crates::domain::{
    repositories::{users::UserRepository, verifications::VerificationRepository},
    value_objects::{
        enums::{user_roles::UserRole, verification_flows::VerificationFlow},
        users::{CREDENTIAL_PROVIDER, NewAccountModel, NewUserModel, UserSummary},
        verification_payloads::RegistrationPayload,
    },
};
use tracing::{error, info, warn};

use crate::{
    auth::passwords::hash_password,
    usecases::{
        auth_flows::{AuthFlowError, AuthFlowResult, conflict_as_exists},
        verification_ledger::{OTP_TTL_MINUTES, VerificationError, VerificationLedger, normalize_identifier},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRegistration {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct RegistrationUseCase<U, V>
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    ledger: Arc<VerificationLedger<V>>,
}

impl<U, V> RegistrationUseCase<U, V>
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, ledger: Arc<VerificationLedger<V>>) -> Self {
        Self { user_repo, ledger }
    }

    /// Parks the registration in the ledger until the emailed code comes back.
    pub async fn send_otp(&self, registration: StudentRegistration) -> AuthFlowResult<String> {
        let email = normalize_identifier(&registration.email);
        let username = registration.username.trim().to_string();

        let email_taken = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(AuthFlowError::Internal)?
            .is_some();
        let username_taken = self
            .user_repo
            .find_by_username(&username)
            .await
            .map_err(AuthFlowError::Internal)?
            .is_some();
        if email_taken || username_taken {
            info!(email_taken, username_taken, "registration: details already in use");
            return Err(AuthFlowError::Verification(VerificationError::AlreadyExists));
        }

        let password_hash = hash_password(&registration.password).map_err(|err| {
            error!(error = ?err, "registration: failed to hash password");
            AuthFlowError::Internal(err)
        })?;

        let payload = RegistrationPayload {
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            username,
            email: email.clone(),
            password: password_hash,
            otp: String::new(),
        };
        let issued = self
            .ledger
            .issue(VerificationFlow::Registration, &email, payload, OTP_TTL_MINUTES)
            .await?;

        info!("registration: code sent");
        Ok(issued.email)
    }

    /// Creates the user and its password account and drops the record, atomically.
    pub async fn verify(&self, email: &str, otp: &str) -> AuthFlowResult<UserSummary> {
        let email = normalize_identifier(email);

        let verified = match self
            .ledger
            .verify::<RegistrationPayload>(VerificationFlow::Registration, &email, otp)
            .await
        {
            Ok(verified) => verified,
            Err(VerificationError::NotFound) => {
                // a finished registration consumed the record
                let registered = self
                    .user_repo
                    .find_by_email(&email)
                    .await
                    .map_err(AuthFlowError::Internal)?
                    .is_some();
                return Err(AuthFlowError::Verification(if registered {
                    VerificationError::AlreadyExists
                } else {
                    VerificationError::NotFound
                }));
            }
            Err(err) => return Err(err.into()),
        };

        if self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(AuthFlowError::Internal)?
            .is_some()
        {
            warn!("registration: email registered while code was pending");
            self.ledger.consume(&verified.record_id).await?;
            return Err(AuthFlowError::Verification(VerificationError::AlreadyExists));
        }

        let payload = verified.payload;
        let new_user = NewUserModel {
            email: email.clone(),
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            role: UserRole::Student,
            email_verified: true,
            account: NewAccountModel {
                provider_id: CREDENTIAL_PROVIDER.to_string(),
                account_id: email,
                password_hash: Some(payload.password),
            },
        };

        let user = self
            .user_repo
            .create_with_account(new_user, &verified.record_id)
            .await
            .map_err(conflict_as_exists)?;

        info!(user_id = %user.id, "registration: student created");
        Ok(user.summary())
    }

    pub async fn resend(&self, email: &str) -> AuthFlowResult<()> {
        self.ledger
            .resend(VerificationFlow::Registration, email)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::passwords::verify_password,
        usecases::test_support::{
            InMemoryUsers, InMemoryVerifications, SentCodes, recording_email_sender, sample_user,
        },
    };

    struct Harness {
        usecase: Arc<RegistrationUseCase<InMemoryUsers, InMemoryVerifications>>,
        users: Arc<InMemoryUsers>,
        verifications: Arc<InMemoryVerifications>,
        sent: SentCodes,
    }

    fn harness() -> Harness {
        let verifications = Arc::new(InMemoryVerifications::default());
        let users = Arc::new(InMemoryUsers::new(Arc::clone(&verifications)));
        let (sender, sent) = recording_email_sender();
        let ledger = Arc::new(VerificationLedger::new(Arc::clone(&verifications), sender));

        Harness {
            usecase: Arc::new(RegistrationUseCase::new(Arc::clone(&users), ledger)),
            users,
            verifications,
            sent,
        }
    }

    fn registration() -> StudentRegistration {
        StudentRegistration {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: "ada".to_string(),
            email: "A@B.com".to_string(),
            password: "correct-horse".to_string(),
        }
    }

    #[tokio::test]
    async fn verify_creates_one_user_and_account_and_clears_ledger() {
        let harness = harness();
        harness.usecase.send_otp(registration()).await.unwrap();
        let code = harness.sent.last_code().unwrap();

        let user = harness.usecase.verify("a@b.com", &code).await.unwrap();

        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.role, UserRole::Student);
        assert_eq!(harness.users.user_count(), 1);
        assert_eq!(harness.users.account_count(), 1);
        assert_eq!(harness.verifications.total(), 0);

        let stored = harness.users.accounts.lock().unwrap()[0].clone();
        assert_eq!(stored.provider_id, CREDENTIAL_PROVIDER);
        assert!(verify_password("correct-horse", stored.password.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn repeated_verify_reports_already_exists() {
        let harness = harness();
        harness.usecase.send_otp(registration()).await.unwrap();
        let code = harness.sent.last_code().unwrap();

        harness.usecase.verify("a@b.com", &code).await.unwrap();
        let second = harness.usecase.verify("a@b.com", &code).await;

        assert!(matches!(
            second,
            Err(AuthFlowError::Verification(VerificationError::AlreadyExists))
        ));
        assert_eq!(harness.users.user_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_verifies_create_a_single_user() {
        let harness = harness();
        harness.usecase.send_otp(registration()).await.unwrap();
        let code = harness.sent.last_code().unwrap();

        let first = {
            let usecase = Arc::clone(&harness.usecase);
            let code = code.clone();
            tokio::spawn(async move { usecase.verify("a@b.com", &code).await })
        };
        let second = {
            let usecase = Arc::clone(&harness.usecase);
            tokio::spawn(async move { usecase.verify("a@b.com", &code).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let created = results.iter().filter(|result| result.is_ok()).count();

        assert_eq!(created, 1);
        assert!(results.iter().any(|result| matches!(
            result,
            Err(AuthFlowError::Verification(VerificationError::AlreadyExists))
        )));
        assert_eq!(harness.users.user_count(), 1);
    }

    #[tokio::test]
    async fn taken_username_is_rejected_before_sending() {
        let harness = harness();
        harness.users.seed(sample_user("other@b.com", "ada"), None);

        let result = harness.usecase.send_otp(registration()).await;

        assert!(matches!(
            result,
            Err(AuthFlowError::Verification(VerificationError::AlreadyExists))
        ));
        assert_eq!(harness.sent.count(), 0);
    }

    #[tokio::test]
    async fn stored_payload_holds_hash_not_password() {
        let harness = harness();
        let issued = harness.usecase.send_otp(registration()).await.unwrap();
        assert_eq!(issued, "a@b.com");

        let slot = harness
            .verifications
            .find_slot("a@b.com", VerificationFlow::Registration)
            .await
            .unwrap()
            .unwrap();
        assert!(!slot.value.contains("correct-horse"));
        assert!(slot.value.contains("$argon2"));
    }
}
