pub mod stripe_client;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

/// Checkout session request. `metadata` is echoed back by the gateway on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub mode: CheckoutMode,
    pub customer_id: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Payment => "payment",
        }
    }
}

#[async_trait]
#[automock]
pub trait PaymentGateway: Send + Sync {
    /// Returns the gateway customer id.
    async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String>;

    /// Returns the hosted checkout URL.
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<String>;

    async fn cancel_subscription_at_period_end(&self, provider_subscription_id: &str)
    -> Result<()>;
}
