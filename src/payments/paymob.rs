//! Paymob Accept integration
//!
//! Session flow: authentication token, order registration, payment key, then
//! the hosted iframe URL. Callbacks are signed with HMAC-SHA512 over a fixed
//! concatenation of transaction fields.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha512;
use uuid::Uuid;

use super::{
    verify_hex_mac, PaymentError, PaymentGateway, PaymentOrder, PaymentOutcome, PaymentProvider,
    PaymentSession, WebhookEvent, WebhookRequest,
};
use crate::config::PaymobConfig;

/// Transaction fields covered by the callback HMAC, in signing order.
const HMAC_FIELDS: [&str; 20] = [
    "amount_cents",
    "created_at",
    "currency",
    "error_occured",
    "has_parent_transaction",
    "id",
    "integration_id",
    "is_3d_secure",
    "is_auth",
    "is_capture",
    "is_refunded",
    "is_standalone_payment",
    "is_voided",
    "order.id",
    "owner",
    "pending",
    "source_data.pan",
    "source_data.sub_type",
    "source_data.type",
    "success",
];

/// Payment keys expire after this many seconds.
const PAYMENT_KEY_TTL: u32 = 3600;

pub struct PaymobClient {
    config: PaymobConfig,
    http: reqwest::Client,
}

/// Transaction state as reported by a callback, after signature checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymobTransaction {
    pub transaction_id: String,
    pub merchant_order_id: Option<Uuid>,
    pub success: bool,
    pub pending: bool,
    pub message: Option<String>,
}

impl PaymobTransaction {
    pub fn outcome(&self) -> PaymentOutcome {
        if self.pending {
            PaymentOutcome::Ignored
        } else if self.success {
            PaymentOutcome::Succeeded { reference: self.transaction_id.clone() }
        } else {
            PaymentOutcome::Failed { reason: self.message.clone().unwrap_or_else(|| "declined".into()) }
        }
    }

    fn state(&self) -> &'static str {
        match (self.pending, self.success) {
            (true, _) => "pending",
            (false, true) => "success",
            (false, false) => "failed",
        }
    }

    /// Keyed by transaction id and state. The server callback and the
    /// browser return for one settled payment share a key, while a pending
    /// notice never blocks the settlement that follows it.
    pub fn to_event(&self) -> WebhookEvent {
        WebhookEvent {
            event_id: format!("paymob:{}:{}", self.transaction_id, self.state()),
            event_type: "TRANSACTION".into(),
            order_id: self.merchant_order_id,
            outcome: self.outcome(),
        }
    }
}

/// Scalar JSON value as Paymob stringifies it for signing.
fn signing_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

fn lookup<'a>(obj: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(obj, |v, key| v.get(key))
}

fn query_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

impl PaymobClient {
    pub fn new(config: PaymobConfig, http: reqwest::Client) -> Self { Self { config, http } }

    fn mac(&self) -> Result<Hmac<Sha512>, PaymentError> {
        Hmac::<Sha512>::new_from_slice(self.config.hmac_secret.as_bytes())
            .map_err(|_| PaymentError::Provider("invalid HMAC secret".into()))
    }

    /// Concatenation signed by Paymob for a transaction-processed callback.
    pub fn signing_string(obj: &Value) -> String {
        HMAC_FIELDS.iter().map(|f| signing_value(lookup(obj, f))).collect()
    }

    pub fn verify_transaction(&self, obj: &Value, signature: &str) -> Result<(), PaymentError> {
        let mut mac = self.mac()?;
        mac.update(Self::signing_string(obj).as_bytes());
        verify_hex_mac(mac, signature)
    }

    /// Parses a transaction-processed callback (`POST`, JSON body, `hmac` query).
    pub fn parse_transaction_callback(&self, query: Option<&str>, body: &[u8]) -> Result<PaymobTransaction, PaymentError> {
        let pairs = query_pairs(query.unwrap_or_default());
        let signature = query_param(&pairs, "hmac").ok_or(PaymentError::InvalidSignature)?;
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| PaymentError::MalformedPayload(format!("invalid JSON: {e}")))?;
        let obj = payload.get("obj").ok_or_else(|| PaymentError::MalformedPayload("missing obj".into()))?;
        self.verify_transaction(obj, signature)?;

        let transaction_id = signing_value(obj.get("id"));
        if transaction_id.is_empty() {
            return Err(PaymentError::MalformedPayload("missing transaction id".into()));
        }
        Ok(PaymobTransaction {
            transaction_id,
            merchant_order_id: lookup(obj, "order.merchant_order_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok()),
            success: obj.get("success").and_then(Value::as_bool).unwrap_or(false),
            pending: obj.get("pending").and_then(Value::as_bool).unwrap_or(false),
            message: lookup(obj, "data.message").and_then(Value::as_str).map(String::from),
        })
    }

    /// Parses the browser return redirect (`GET`), which carries the same
    /// fields flattened into the query string.
    pub fn parse_return(&self, query: &str) -> Result<PaymobTransaction, PaymentError> {
        let pairs = query_pairs(query);
        let signature = query_param(&pairs, "hmac").ok_or(PaymentError::InvalidSignature)?;
        let concatenated: String = HMAC_FIELDS
            .iter()
            .map(|f| {
                // The redirect names the order id plainly `order`.
                let key = if *f == "order.id" { "order" } else { *f };
                query_param(&pairs, key).unwrap_or_default()
            })
            .collect();
        let mut mac = self.mac()?;
        mac.update(concatenated.as_bytes());
        verify_hex_mac(mac, signature)?;

        let transaction_id = query_param(&pairs, "id").unwrap_or_default().to_string();
        if transaction_id.is_empty() {
            return Err(PaymentError::MalformedPayload("missing transaction id".into()));
        }
        Ok(PaymobTransaction {
            transaction_id,
            merchant_order_id: query_param(&pairs, "merchant_order_id").and_then(|s| Uuid::parse_str(s).ok()),
            success: query_param(&pairs, "success") == Some("true"),
            pending: query_param(&pairs, "pending") == Some("true"),
            message: query_param(&pairs, "data.message").map(String::from),
        })
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, PaymentError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        let payload: Value = resp.json().await?;
        if !status.is_success() {
            return Err(PaymentError::Provider(format!("{path} returned {status}: {payload}")));
        }
        Ok(payload)
    }

    async fn auth_token(&self) -> Result<String, PaymentError> {
        let resp = self.post_json("/api/auth/tokens", json!({ "api_key": self.config.api_key })).await?;
        resp["token"].as_str().map(String::from).ok_or_else(|| PaymentError::Provider("auth response missing token".into()))
    }
}

/// Malformed query strings yield no pairs, which then fail signature checks.
fn query_pairs(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(query).unwrap_or_default()
}

#[async_trait]
impl PaymentGateway for PaymobClient {
    fn provider(&self) -> PaymentProvider { PaymentProvider::Paymob }

    async fn create_session(&self, order: &PaymentOrder) -> Result<PaymentSession, PaymentError> {
        let token = self.auth_token().await?;

        let items: Vec<Value> = order.items.iter().map(|i| json!({
            "name": i.name,
            "amount_cents": i.unit_amount_cents,
            "quantity": i.quantity,
            "description": i.name,
        })).collect();
        let registered = self.post_json("/api/ecommerce/orders", json!({
            "auth_token": token,
            "delivery_needed": false,
            "amount_cents": order.amount_cents,
            "currency": order.currency,
            "merchant_order_id": order.order_id.to_string(),
            "items": items,
        })).await?;
        let paymob_order_id = registered["id"]
            .as_i64()
            .ok_or_else(|| PaymentError::Provider("order registration missing id".into()))?;

        let c = &order.customer;
        let or_na = |s: &str| if s.trim().is_empty() { "NA".to_string() } else { s.to_string() };
        let key = self.post_json("/api/acceptance/payment_keys", json!({
            "auth_token": token,
            "amount_cents": order.amount_cents,
            "expiration": PAYMENT_KEY_TTL,
            "order_id": paymob_order_id,
            "currency": order.currency,
            "integration_id": self.config.integration_id,
            "lock_order_when_paid": true,
            "billing_data": {
                "email": order.email,
                "first_name": or_na(&c.first_name),
                "last_name": or_na(&c.last_name),
                "phone_number": or_na(&c.phone),
                "street": or_na(&c.street),
                "city": or_na(&c.city),
                "country": or_na(&c.country),
                "postal_code": or_na(&c.postal_code),
                "apartment": "NA", "floor": "NA", "building": "NA", "shipping_method": "NA", "state": "NA",
            },
        })).await?;
        let payment_token = key["token"]
            .as_str()
            .ok_or_else(|| PaymentError::Provider("payment key response missing token".into()))?;

        tracing::info!(order_id = %order.order_id, paymob_order_id, "paymob session created");
        Ok(PaymentSession {
            reference: paymob_order_id.to_string(),
            redirect_url: format!(
                "{}/api/acceptance/iframes/{}?payment_token={}",
                self.config.base_url.trim_end_matches('/'), self.config.iframe_id, payment_token
            ),
        })
    }

    fn parse_webhook(&self, request: &WebhookRequest<'_>) -> Result<WebhookEvent, PaymentError> {
        Ok(self.parse_transaction_callback(request.query, request.body)?.to_event())
    }
}
