//! Payment gateway client
//!
//! The platform never processes card details itself: it opens a hosted
//! checkout with the gateway and is told about the outcome through the
//! pay-confirmation webhook. With a secret key configured the checkout is
//! initialized over the gateway REST API; without one (local/dev) the
//! hosted-payment URL is derived from the base URL and the transaction
//! reference, so no network is involved.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::time::Duration;

/// Checkout initialization timeout
const GATEWAY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub enum PaymentGatewayError {
    /// Request failed or timed out; safe to retry
    Http(String),
    /// The gateway answered with something we cannot use
    Malformed(String),
}

impl std::fmt::Display for PaymentGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentGatewayError::Http(msg) => write!(f, "gateway request failed: {}", msg),
            PaymentGatewayError::Malformed(msg) => write!(f, "gateway response malformed: {}", msg),
        }
    }
}

impl std::error::Error for PaymentGatewayError {}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    data: InitializeData,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
}

/// Payment gateway client plus the platform fee policy
#[derive(Clone)]
pub struct PaymentGatewayService {
    client: reqwest::Client,
    secret_key: Option<String>,
    base_url: String,
    webhook_secret: Option<String>,
    fee_bps: u32,
}

impl PaymentGatewayService {
    pub fn new(
        secret_key: Option<String>,
        base_url: String,
        webhook_secret: Option<String>,
        fee_bps: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            webhook_secret,
            fee_bps,
        }
    }

    /// Platform fee for an escrow amount, rounded to 2 dp. Deducted from
    /// the seller payout; the transaction amount stays equal to the offer
    /// amount.
    pub fn charge_for(&self, amount: Decimal) -> Decimal {
        (amount * Decimal::from(self.fee_bps) / Decimal::from(10_000u32))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Obtain a hosted checkout link for a transaction reference
    pub async fn create_checkout(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<String, PaymentGatewayError> {
        let Some(secret_key) = &self.secret_key else {
            return Ok(format!("{}/pay/{}", self.base_url, reference));
        };

        let body = serde_json::json!({
            "reference": reference,
            "amount": amount.to_string(),
        });

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentGatewayError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentGatewayError::Http(format!(
                "status {}",
                response.status()
            )));
        }

        let parsed: InitializeResponse = response
            .json()
            .await
            .map_err(|e| PaymentGatewayError::Malformed(e.to_string()))?;
        Ok(parsed.data.authorization_url)
    }

    /// Check the shared secret carried by a webhook delivery. With no
    /// secret configured (local/dev) every delivery is accepted.
    pub fn verify_webhook(&self, provided: Option<&str>) -> bool {
        match &self.webhook_secret {
            None => true,
            Some(expected) => provided == Some(expected.as_str()),
        }
    }
}
