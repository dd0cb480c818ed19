//! Payment gateway integrations
//!
//! Each provider creates a hosted payment session for a pending order and
//! turns its signed webhook callbacks into a [`WebhookEvent`]. Order state
//! changes happen in `services::reconcile`, never here.

mod paymob;
mod stripe;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

pub use paymob::{PaymobClient, PaymobTransaction};
pub use stripe::StripeClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider { Paymob, Stripe }

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Paymob => "paymob", Self::Stripe => "stripe" }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentProvider {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paymob" => Ok(Self::Paymob),
            "stripe" => Ok(Self::Stripe),
            other => Err(PaymentError::MalformedPayload(format!("unknown payment provider {other}"))),
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error talking to payment provider: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Payment provider rejected the request: {0}")]
    Provider(String),
    #[error("Webhook signature mismatch")]
    InvalidSignature,
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// What a provider needs to charge for one order.
#[derive(Clone, Debug)]
pub struct PaymentOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub email: String,
    pub customer: BillingDetails,
    pub items: Vec<PaymentItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub locale: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BillingDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}

#[derive(Clone, Debug)]
pub struct PaymentItem { pub name: String, pub unit_amount_cents: i64, pub quantity: u32 }

#[derive(Clone, Debug, Serialize)]
pub struct PaymentSession {
    /// Provider-side identifier (Paymob order id, Stripe session id).
    pub reference: String,
    pub redirect_url: String,
}

/// Raw callback as received by the HTTP layer.
pub struct WebhookRequest<'a> {
    pub headers: &'a HeaderMap,
    pub query: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded { reference: String },
    Failed { reason: String },
    /// Verified, but carries nothing that changes an order.
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Unique per provider, used for idempotency.
    pub event_id: String,
    pub event_type: String,
    pub order_id: Option<Uuid>,
    pub outcome: PaymentOutcome,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn create_session(&self, order: &PaymentOrder) -> Result<PaymentSession, PaymentError>;

    /// Verifies the callback signature, then extracts the event.
    fn parse_webhook(&self, request: &WebhookRequest<'_>) -> Result<WebhookEvent, PaymentError>;
}

/// Providers enabled by configuration.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    pub paymob: Option<Arc<PaymobClient>>,
    pub stripe: Option<Arc<StripeClient>>,
}

impl PaymentGateways {
    pub fn from_config(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            paymob: config.paymob.clone().map(|c| Arc::new(PaymobClient::new(c, http.clone()))),
            stripe: config.stripe.clone().map(|c| Arc::new(StripeClient::new(c, http.clone()))),
        }
    }

    pub fn get(&self, provider: PaymentProvider) -> Option<Arc<dyn PaymentGateway>> {
        match provider {
            PaymentProvider::Paymob => self.paymob.clone().map(|c| c as Arc<dyn PaymentGateway>),
            PaymentProvider::Stripe => self.stripe.clone().map(|c| c as Arc<dyn PaymentGateway>),
        }
    }

    pub fn enabled(&self) -> Vec<PaymentProvider> {
        let mut out = Vec::new();
        if self.paymob.is_some() { out.push(PaymentProvider::Paymob); }
        if self.stripe.is_some() { out.push(PaymentProvider::Stripe); }
        out
    }
}

/// Lower-case hex HMAC comparison in constant time.
pub(crate) fn verify_hex_mac<M: hmac::Mac>(mac: M, signature_hex: &str) -> Result<(), PaymentError> {
    let expected = hex::decode(signature_hex.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    mac.verify_slice(&expected).map_err(|_| PaymentError::InvalidSignature)
}
