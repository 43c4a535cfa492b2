pub mod subscription_history;
pub mod subscription_intents;
pub mod subscription_plans;
pub mod user_subscriptions;
pub mod users;
pub mod verifications;
