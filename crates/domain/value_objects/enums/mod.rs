pub mod billing_cycles;
pub mod intent_statuses;
pub mod subscription_actions;
pub mod subscription_statuses;
pub mod user_roles;
pub mod verification_flows;
