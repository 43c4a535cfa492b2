use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::verifications;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = verifications)]
pub struct VerificationEntity {
    pub id: String,
    pub identifier: String,
    pub flow: String,
    pub value: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationEntity {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Row written into the `(identifier, flow)` slot, or inserted on its own for
/// session bridges.
#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = verifications)]
pub struct UpsertVerificationEntity {
    pub id: String,
    pub identifier: String,
    pub flow: String,
    pub value: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
}
