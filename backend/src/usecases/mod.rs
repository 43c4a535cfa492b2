pub mod auth_flows;
pub mod email_change;
pub mod rate_limiter;
pub mod registration;
pub mod subscriptions;
pub mod verification_ledger;

#[cfg(test)]
pub(crate) mod test_support;
