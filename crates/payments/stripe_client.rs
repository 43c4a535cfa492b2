use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::{CheckoutRequest, PaymentGateway};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe REST client over reqwest, form-encoded as the API expects.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerResp {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutResp {
    url: Option<String>,
}

impl StripeClient {
    /// Checkout return URLs hang off the public application URL.
    pub fn new(secret_key: String, app_base_url: &str) -> Self {
        let base = app_base_url.trim_end_matches('/');
        Self {
            http: reqwest::Client::new(),
            api_base: STRIPE_API_BASE.to_string(),
            secret_key,
            success_url: format!("{base}/subscription/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/subscription/cancel"),
        }
    }

    pub fn success_url(&self) -> &str {
        &self.success_url
    }

    pub fn cancel_url(&self) -> &str {
        &self.cancel_url
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = resp.text().await.unwrap_or_default();
        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.clone()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.clone()),
            context = %context,
            "payments: stripe request failed"
        );

        bail!("stripe {context} failed with status {status}");
    }
}

/// Form body for a checkout session, minus credentials.
pub(crate) fn checkout_form(
    request: &CheckoutRequest,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let mut body = vec![
        ("mode".to_string(), request.mode.as_str().to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("customer".to_string(), request.customer_id.clone()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
    ];

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        body.push((format!("metadata[{key}]"), value.clone()));
        // mirrored so the subscription created by checkout carries it too
        body.push((format!("subscription_data[metadata][{key}]"), value.clone()));
    }

    body
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String> {
        let body = [
            ("email", email.to_string()),
            ("metadata[userId]", user_id.to_string()),
        ];

        let resp = self
            .http
            .post(format!("{}/customers", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        let parsed: CustomerResp = resp.json().await?;
        info!(%user_id, customer_id = %parsed.id, "payments: stripe customer created");
        Ok(parsed.id)
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<String> {
        let body = checkout_form(&request, &self.success_url, &self.cancel_url);

        let resp = self
            .http
            .post(format!("{}/checkout/sessions", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        let parsed: CheckoutResp = resp.json().await?;
        parsed
            .url
            .ok_or_else(|| anyhow!("stripe checkout session has no url"))
    }

    async fn cancel_subscription_at_period_end(
        &self,
        provider_subscription_id: &str,
    ) -> Result<()> {
        let body = [("cancel_at_period_end", "true")];

        let resp = self
            .http
            .post(format!(
                "{}/subscriptions/{}",
                self.api_base, provider_subscription_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        Self::ensure_success(resp, "cancel subscription").await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::payments::CheckoutMode;

    #[test]
    fn return_urls_follow_app_base_url() {
        let client = StripeClient::new("sk_test".to_string(), "https://learnhub.test/");

        assert_eq!(
            client.success_url(),
            "https://learnhub.test/subscription/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(client.cancel_url(), "https://learnhub.test/subscription/cancel");
    }

    #[test]
    fn checkout_form_carries_metadata_on_session_and_subscription() {
        let mut metadata = HashMap::new();
        metadata.insert("isUpgrade".to_string(), "true".to_string());
        metadata.insert("planId".to_string(), "p1".to_string());
        let request = CheckoutRequest {
            price_id: "price_123".to_string(),
            mode: CheckoutMode::Subscription,
            customer_id: "cus_1".to_string(),
            metadata,
        };

        let form = checkout_form(&request, "https://s", "https://c");
        let has = |key: &str, value: &str| {
            form.iter()
                .any(|(k, v)| k.as_str() == key && v.as_str() == value)
        };

        assert!(has("mode", "subscription"));
        assert!(has("line_items[0][price]", "price_123"));
        assert!(has("customer", "cus_1"));
        assert!(has("metadata[isUpgrade]", "true"));
        assert!(has("subscription_data[metadata][planId]", "p1"));
    }
}
