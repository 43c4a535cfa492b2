use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::enums::user_roles::UserRole;

/// Provider id of the password account created by student registration.
pub const CREDENTIAL_PROVIDER: &str = "credential";

/// Provider id of the account created by email-code sign in.
pub const EMAIL_OTP_PROVIDER: &str = "email-otp";

/// Unique constraint on `users.username`, as reported by a conflicting insert.
pub const USERNAME_CONSTRAINT: &str = "users_username_key";

/// A user plus its first account, created together in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserModel {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub email_verified: bool,
    pub account: NewAccountModel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccountModel {
    pub provider_id: String,
    /// Provider-side identifier, the email for both local providers.
    pub account_id: String,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: UserRole,
}
