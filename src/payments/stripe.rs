//! Stripe Checkout via the REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use super::{
    verify_hex_mac, PaymentError, PaymentGateway, PaymentOrder, PaymentOutcome, PaymentProvider,
    PaymentSession, WebhookEvent, WebhookRequest,
};
use crate::config::StripeConfig;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook, in seconds.
const SIGNATURE_TOLERANCE: i64 = 300;

pub struct StripeClient {
    config: StripeConfig,
    http: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig, http: reqwest::Client) -> Self { Self { config, http } }

    /// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`)
    /// against the raw payload at time `now`.
    pub fn verify_signature_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), PaymentError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            if let Some(t) = part.trim().strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(v) = part.trim().strip_prefix("v1=") {
                signatures.push(v);
            }
        }
        let timestamp = timestamp.ok_or_else(|| PaymentError::MalformedPayload("Stripe-Signature missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::MalformedPayload("Stripe-Signature missing v1 signature".into()));
        }

        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|_| PaymentError::Provider("invalid webhook secret".into()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        // Several v1 entries appear while a secret is being rolled.
        if !signatures.iter().any(|sig| verify_hex_mac(mac.clone(), sig).is_ok()) {
            return Err(PaymentError::InvalidSignature);
        }

        let ts: i64 = timestamp.parse().map_err(|_| PaymentError::MalformedPayload("invalid timestamp".into()))?;
        if (now - ts).abs() > SIGNATURE_TOLERANCE {
            return Err(PaymentError::StaleTimestamp);
        }
        Ok(())
    }

    /// Maps a verified event body to a [`WebhookEvent`].
    pub fn interpret_event(event: &Value) -> Result<WebhookEvent, PaymentError> {
        let event_id = event["id"].as_str().ok_or_else(|| PaymentError::MalformedPayload("event missing id".into()))?;
        let event_type = event["type"].as_str().unwrap_or_default();
        let session = &event["data"]["object"];
        let order_id = session["client_reference_id"]
            .as_str()
            .or_else(|| session["metadata"]["order_id"].as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let session_id = session["id"].as_str().unwrap_or_default().to_string();

        let outcome = match event_type {
            "checkout.session.completed" if session["payment_status"] == "paid" => {
                PaymentOutcome::Succeeded { reference: session_id }
            }
            "checkout.session.async_payment_succeeded" => PaymentOutcome::Succeeded { reference: session_id },
            "checkout.session.async_payment_failed" => PaymentOutcome::Failed { reason: "payment failed".into() },
            "checkout.session.expired" => PaymentOutcome::Failed { reason: "checkout session expired".into() },
            _ => PaymentOutcome::Ignored,
        };

        Ok(WebhookEvent { event_id: event_id.to_string(), event_type: event_type.to_string(), order_id, outcome })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn provider(&self) -> PaymentProvider { PaymentProvider::Stripe }

    async fn create_session(&self, order: &PaymentOrder) -> Result<PaymentSession, PaymentError> {
        let currency = order.currency.to_lowercase();
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), order.success_url.clone()),
            ("cancel_url".into(), order.cancel_url.clone()),
            ("customer_email".into(), order.email.clone()),
            ("client_reference_id".into(), order.order_id.to_string()),
            ("metadata[order_id]".into(), order.order_id.to_string()),
            ("metadata[order_number]".into(), order.order_number.clone()),
            ("locale".into(), order.locale.clone()),
        ];
        for (i, item) in order.items.iter().enumerate() {
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
            form.push((format!("line_items[{i}][price_data][currency]"), currency.clone()));
            form.push((format!("line_items[{i}][price_data][unit_amount]"), item.unit_amount_cents.to_string()));
            form.push((format!("line_items[{i}][price_data][product_data][name]"), item.name.clone()));
        }

        let items_total: i64 = order.items.iter().map(|i| i.unit_amount_cents * i64::from(i.quantity)).sum();
        let adjustment = order.amount_cents - items_total;
        if adjustment > 0 {
            // Shipping on top of the goods.
            let i = order.items.len();
            form.push((format!("line_items[{i}][quantity]"), "1".into()));
            form.push((format!("line_items[{i}][price_data][currency]"), currency.clone()));
            form.push((format!("line_items[{i}][price_data][unit_amount]"), adjustment.to_string()));
            form.push((format!("line_items[{i}][price_data][product_data][name]"), "Shipping".into()));
        } else if adjustment < 0 {
            // Coupon discounts larger than shipping are charged as one summary line.
            form.retain(|(k, _)| !k.starts_with("line_items["));
            form.push(("line_items[0][quantity]".into(), "1".into()));
            form.push(("line_items[0][price_data][currency]".into(), currency.clone()));
            form.push(("line_items[0][price_data][unit_amount]".into(), order.amount_cents.to_string()));
            form.push(("line_items[0][price_data][product_data][name]".into(), format!("Order {}", order.order_number)));
        }

        let resp: Value = self.http
            .post(format!("{API_BASE}/checkout/sessions"))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        match (resp["id"].as_str(), resp["url"].as_str()) {
            (Some(id), Some(url)) => {
                tracing::info!(order_id = %order.order_id, session_id = id, "stripe checkout session created");
                Ok(PaymentSession { reference: id.to_string(), redirect_url: url.to_string() })
            }
            _ => Err(PaymentError::Provider(format!("checkout session creation failed: {}", resp["error"]["message"]))),
        }
    }

    fn parse_webhook(&self, request: &WebhookRequest<'_>) -> Result<WebhookEvent, PaymentError> {
        let header = request
            .headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or(PaymentError::InvalidSignature)?;
        self.verify_signature_at(request.body, header, chrono::Utc::now().timestamp())?;
        let event: Value = serde_json::from_slice(request.body)
            .map_err(|e| PaymentError::MalformedPayload(format!("invalid JSON: {e}")))?;
        Self::interpret_event(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test123secret456";

    fn client() -> StripeClient {
        StripeClient::new(StripeConfig { secret_key: "sk_test_xxx".into(), webhook_secret: SECRET.into() }, reqwest::Client::new())
    }

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, String::from_utf8_lossy(payload)).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    const PAYLOAD: &[u8] = b"{\"type\":\"checkout.session.completed\"}";

    #[test]
    fn test_valid_signature() {
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign(PAYLOAD, SECRET, now));
        assert!(client().verify_signature_at(PAYLOAD, &header, now + 10).is_ok());
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let now = 1_700_000_000;
        let header = format!("t={now},v1={},v1={}", sign(PAYLOAD, "old_secret", now), sign(PAYLOAD, SECRET, now));
        assert!(client().verify_signature_at(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign(PAYLOAD, "wrong_secret", now));
        assert!(matches!(client().verify_signature_at(PAYLOAD, &header, now), Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_modified_payload() {
        let now = 1_700_000_000;
        let header = format!("t={},v1={}", now, sign(PAYLOAD, SECRET, now));
        let modified = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
        assert!(matches!(client().verify_signature_at(modified, &header, now), Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let then = 1_700_000_000;
        let header = format!("t={},v1={}", then, sign(PAYLOAD, SECRET, then));
        assert!(matches!(client().verify_signature_at(PAYLOAD, &header, then + 600), Err(PaymentError::StaleTimestamp)));
    }

    #[test]
    fn test_malformed_headers() {
        assert!(client().verify_signature_at(PAYLOAD, "v1=abc", 0).is_err());
        assert!(client().verify_signature_at(PAYLOAD, "t=123", 0).is_err());
        assert!(client().verify_signature_at(PAYLOAD, "garbage", 0).is_err());
        assert!(client().verify_signature_at(PAYLOAD, "", 0).is_err());
    }

    #[test]
    fn test_interpret_completed_session() {
        let order_id = Uuid::new_v4();
        let event = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_1", "payment_status": "paid", "client_reference_id": order_id.to_string() } }
        });
        let parsed = StripeClient::interpret_event(&event).unwrap();
        assert_eq!(parsed.order_id, Some(order_id));
        assert_eq!(parsed.outcome, PaymentOutcome::Succeeded { reference: "cs_test_1".into() });
    }

    #[test]
    fn test_unpaid_completion_and_expiry() {
        let order_id = Uuid::new_v4();
        let completed_unpaid = json!({
            "id": "evt_2", "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_2", "payment_status": "unpaid", "metadata": { "order_id": order_id.to_string() } } }
        });
        assert_eq!(StripeClient::interpret_event(&completed_unpaid).unwrap().outcome, PaymentOutcome::Ignored);

        let expired = json!({ "id": "evt_3", "type": "checkout.session.expired", "data": { "object": { "id": "cs_3" } } });
        let parsed = StripeClient::interpret_event(&expired).unwrap();
        assert!(matches!(parsed.outcome, PaymentOutcome::Failed { .. }));
        assert_eq!(parsed.order_id, None);
    }
}
