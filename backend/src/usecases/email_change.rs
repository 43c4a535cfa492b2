use std::sync::Arc;

use crates::domain::{
    repositories::{users::UserRepository, verifications::VerificationRepository},
    value_objects::{
        enums::verification_flows::VerificationFlow,
        verification_payloads::{LoginKind, LoginPayload},
    },
};
use tracing::{info, warn};

use crate::{
    auth::AuthUser,
    usecases::{
        auth_flows::{AuthFlowError, AuthFlowResult, conflict_as_exists},
        verification_ledger::{
            OTP_TTL_MINUTES, SlotKey, VerificationError, VerificationLedger, normalize_identifier,
        },
    },
};

/// Moves a signed-in user to a new address once a code sent there comes back.
///
/// Pending changes are slotted per user, so asking for an address someone else
/// is also trying to claim never disturbs their code. The first to verify wins.
pub struct EmailChangeUseCase<U, V>
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    ledger: Arc<VerificationLedger<V>>,
}

impl<U, V> EmailChangeUseCase<U, V>
where
    U: UserRepository + Send + Sync + 'static,
    V: VerificationRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, ledger: Arc<VerificationLedger<V>>) -> Self {
        Self { user_repo, ledger }
    }

    pub async fn send_otp(&self, auth: &AuthUser, new_email: &str) -> AuthFlowResult<String> {
        let new_email = normalize_identifier(new_email);
        let current = self
            .user_repo
            .find_by_id(auth.user_id)
            .await
            .map_err(AuthFlowError::Internal)?
            .ok_or(AuthFlowError::Verification(VerificationError::NotFound))?;
        if new_email == normalize_identifier(&current.email) {
            return Err(AuthFlowError::SameEmail);
        }

        if self
            .user_repo
            .find_by_email(&new_email)
            .await
            .map_err(AuthFlowError::Internal)?
            .is_some()
        {
            info!(user_id = %auth.user_id, "email_change: target address already registered");
            return Err(AuthFlowError::Verification(VerificationError::AlreadyExists));
        }

        let payload = LoginPayload {
            user_id: Some(auth.user_id),
            email: new_email.clone(),
            otp: String::new(),
            kind: Some(LoginKind::EmailChange),
        };
        let issued = self
            .ledger
            .issue(
                VerificationFlow::EmailChange,
                SlotKey::scoped(auth.user_id, &new_email),
                payload,
                OTP_TTL_MINUTES,
            )
            .await?;

        info!(user_id = %auth.user_id, "email_change: code sent to new address");
        Ok(issued.email)
    }

    pub async fn verify(&self, auth: &AuthUser, new_email: &str, otp: &str) -> AuthFlowResult<String> {
        let verified = self
            .ledger
            .verify::<LoginPayload>(
                VerificationFlow::EmailChange,
                SlotKey::scoped(auth.user_id, new_email),
                otp,
            )
            .await?;

        if verified.payload.user_id != Some(auth.user_id) {
            warn!(user_id = %auth.user_id, "email_change: code was requested by another user");
            return Err(AuthFlowError::Verification(VerificationError::NotFound));
        }

        let new_email = normalize_identifier(&verified.payload.email);
        self.user_repo
            .change_email(auth.user_id, &new_email, &verified.record_id)
            .await
            .map_err(conflict_as_exists)?;

        info!(user_id = %auth.user_id, "email_change: email updated");
        Ok(new_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{
        InMemoryUsers, InMemoryVerifications, SentCodes, recording_email_sender, sample_user,
    };
    use crates::domain::value_objects::enums::user_roles::UserRole;
    use uuid::Uuid;

    struct Harness {
        usecase: EmailChangeUseCase<InMemoryUsers, InMemoryVerifications>,
        users: Arc<InMemoryUsers>,
        verifications: Arc<InMemoryVerifications>,
        sent: SentCodes,
        auth: AuthUser,
    }

    fn harness() -> Harness {
        let verifications = Arc::new(InMemoryVerifications::default());
        let users = Arc::new(InMemoryUsers::new(Arc::clone(&verifications)));
        let (sender, sent) = recording_email_sender();
        let ledger = Arc::new(VerificationLedger::new(Arc::clone(&verifications), sender));

        let user = sample_user("old@b.com", "ada");
        let auth = AuthUser {
            user_id: user.id,
            email: user.email.clone(),
            role: UserRole::Student,
        };
        users.seed(user, None);

        Harness {
            usecase: EmailChangeUseCase::new(Arc::clone(&users), ledger),
            users,
            verifications,
            sent,
            auth,
        }
    }

    #[tokio::test]
    async fn code_sent_to_new_address_changes_email() {
        let harness = harness();

        harness.usecase.send_otp(&harness.auth, "New@B.com").await.unwrap();
        let sent = harness.sent.last().unwrap();
        assert_eq!(sent.to, "new@b.com");

        let email = harness
            .usecase
            .verify(&harness.auth, "new@b.com", &sent.code)
            .await
            .unwrap();

        assert_eq!(email, "new@b.com");
        let users = harness.users.users.lock().unwrap();
        assert_eq!(users[0].email, "new@b.com");
    }

    #[tokio::test]
    async fn same_address_is_rejected() {
        let harness = harness();

        let result = harness.usecase.send_otp(&harness.auth, "OLD@b.com").await;

        assert!(matches!(result, Err(AuthFlowError::SameEmail)));
    }

    #[tokio::test]
    async fn another_users_code_does_not_apply() {
        let harness = harness();
        harness.usecase.send_otp(&harness.auth, "new@b.com").await.unwrap();
        let code = harness.sent.last_code().unwrap();

        let intruder = AuthUser {
            user_id: Uuid::new_v4(),
            email: "intruder@b.com".to_string(),
            role: UserRole::Student,
        };
        let result = harness.usecase.verify(&intruder, "new@b.com", &code).await;

        assert!(matches!(
            result,
            Err(AuthFlowError::Verification(VerificationError::NotFound))
        ));
    }

    #[tokio::test]
    async fn second_user_claiming_same_address_leaves_first_code_valid() {
        let harness = harness();
        harness.usecase.send_otp(&harness.auth, "new@b.com").await.unwrap();
        let first_code = harness.sent.last_code().unwrap();

        let other = sample_user("other@b.com", "grace");
        let other_auth = AuthUser {
            user_id: other.id,
            email: other.email.clone(),
            role: UserRole::Student,
        };
        harness.users.seed(other, None);
        harness.usecase.send_otp(&other_auth, "new@b.com").await.unwrap();
        let second_code = harness.sent.last_code().unwrap();
        assert_eq!(harness.verifications.total(), 2);

        let email = harness
            .usecase
            .verify(&harness.auth, "new@b.com", &first_code)
            .await
            .unwrap();
        assert_eq!(email, "new@b.com");

        let late = harness.usecase.verify(&other_auth, "new@b.com", &second_code).await;
        assert!(matches!(
            late,
            Err(AuthFlowError::Verification(VerificationError::AlreadyExists))
        ));
    }

    #[tokio::test]
    async fn same_address_check_uses_stored_email() {
        let harness = harness();
        harness.users.users.lock().unwrap()[0].email = "moved@b.com".to_string();

        let stale = harness.usecase.send_otp(&harness.auth, "moved@b.com").await;
        assert!(matches!(stale, Err(AuthFlowError::SameEmail)));

        let back = harness.usecase.send_otp(&harness.auth, "old@b.com").await;
        assert!(back.is_ok());
    }

    #[tokio::test]
    async fn address_taken_meanwhile_is_a_conflict() {
        let harness = harness();
        harness.usecase.send_otp(&harness.auth, "new@b.com").await.unwrap();
        let code = harness.sent.last_code().unwrap();
        harness.users.seed(sample_user("new@b.com", "someone"), None);

        let result = harness.usecase.verify(&harness.auth, "new@b.com", &code).await;

        assert!(matches!(
            result,
            Err(AuthFlowError::Verification(VerificationError::AlreadyExists))
        ));
    }
}
