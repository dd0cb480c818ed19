//! Turns a cart into a pending order and a hosted payment session.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::{carts, orders};
use crate::domain::aggregates::{Order, Pricing};
use crate::domain::value_objects::Money;
use crate::error::{AppError, AppResult};
use crate::locale::Locale;
use crate::payments::{BillingDetails, PaymentItem, PaymentOrder, PaymentProvider};
use crate::state::AppState;

use super::cart::{self as cart_service, CartOwner};
use super::order_number;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 5, max = 30))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(equal = 2))]
    pub country: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub postal_code: String,
}

impl From<&ShippingAddress> for BillingDetails {
    fn from(a: &ShippingAddress) -> Self {
        Self {
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            phone: a.phone.clone(),
            street: a.street.clone(),
            city: a.city.clone(),
            country: a.country.to_uppercase(),
            postal_code: a.postal_code.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub provider: PaymentProvider,
    /// Required for guests; signed-in customers use their account email.
    #[validate(email)]
    pub email: Option<String>,
    #[validate]
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub provider: PaymentProvider,
    pub total: i64,
    pub currency: String,
    pub redirect_url: String,
}

pub async fn checkout(
    state: &AppState,
    user: Option<&CurrentUser>,
    owner: Option<CartOwner>,
    locale: Locale,
    req: CheckoutRequest,
) -> AppResult<CheckoutResponse> {
    req.validate()?;
    let gateway = state
        .gateways
        .get(req.provider)
        .ok_or_else(|| AppError::validation(format!("Payment provider {} is not enabled", req.provider)))?;
    let email = match (user, req.email.as_deref()) {
        (Some(user), _) => user.email.clone(),
        (None, Some(email)) => email.trim().to_lowercase(),
        (None, None) => return Err(AppError::validation("Email is required for guest checkout")),
    };
    let owner = owner.ok_or_else(|| AppError::business("Cart is empty"))?;
    let currency = state.currency().to_string();

    let mut tx = state.db.begin().await?;
    let row = cart_service::find(&mut *tx, &owner).await?.ok_or_else(|| AppError::business("Cart is empty"))?;
    // Serializes concurrent checkouts of the same cart.
    carts::find_for_update(&mut *tx, row.id).await?;
    let cart = cart_service::load(&mut tx, row.id, &currency, locale, state.config.default_locale).await?;
    if cart.is_empty() {
        return Err(AppError::business("Cart is empty"));
    }
    if let Err(issues) = cart.validate_stock() {
        let skus: Vec<&str> = issues.iter().map(|i| i.sku.as_str()).collect();
        return Err(AppError::business(format!("Insufficient stock for {}", skus.join(", "))));
    }

    let subtotal = cart.subtotal();
    let discount = match row.coupon_code.as_deref() {
        Some(code) => cart_service::coupon_discount(&mut *tx, code, &subtotal).await??,
        None => Money::zero(&currency),
    };
    let pricing = Pricing::compute(subtotal, discount, &state.shipping_policy())?;
    let sequence = orders::next_number_sequence(&mut *tx).await?;
    let mut order = Order::place(order_number(Utc::now().date_naive(), sequence), &cart, pricing)?;
    let shipping_address = serde_json::to_value(&req.shipping_address).map_err(|e| AppError::Internal(e.to_string()))?;
    orders::insert(
        &mut tx,
        &order,
        orders::NewOrder {
            user_id: user.map(|u| u.id),
            cart_id: row.id,
            email: &email,
            provider: req.provider.as_str(),
            coupon_code: row.coupon_code.as_deref(),
            locale: locale.code(),
            shipping_address: &shipping_address,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id(),
        order_number = order.order_number(),
        provider = %req.provider,
        total = order.pricing().total.to_minor(),
        "order placed"
    );
    state.events.publish_all(order.take_events()).await;

    let base = state.config.public_base_url.trim_end_matches('/');
    let payment = PaymentOrder {
        order_id: order.id(),
        order_number: order.order_number().to_string(),
        amount_cents: order.pricing().total.to_minor(),
        currency: currency.clone(),
        email,
        customer: BillingDetails::from(&req.shipping_address),
        items: order
            .items()
            .iter()
            .map(|i| PaymentItem { name: i.name.clone(), unit_amount_cents: i.unit_price.to_minor(), quantity: i.quantity })
            .collect(),
        success_url: format!("{base}/checkout/success?order={}", order.id()),
        cancel_url: format!("{base}/checkout/cancel?order={}", order.id()),
        locale: locale.code().to_string(),
    };

    let session = match gateway.create_session(&payment).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(order_id = %order.id(), provider = %gateway.provider(), error = %e, "payment session creation failed");
            if order.mark_payment_failed("payment session could not be created") {
                orders::save_status(&state.db, &order).await?;
                state.events.publish_all(order.take_events()).await;
            }
            return Err(e.into());
        }
    };
    orders::set_payment_reference(&state.db, order.id(), &session.reference).await?;

    Ok(CheckoutResponse {
        order_id: order.id(),
        order_number: order.order_number().to_string(),
        provider: req.provider,
        total: order.pricing().total.to_minor(),
        currency,
        redirect_url: session.redirect_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address() -> serde_json::Value {
        json!({
            "first_name": "Mona", "last_name": "Adel", "phone": "+201001234567",
            "street": "12 Tahrir St", "city": "Cairo", "country": "eg"
        })
    }

    #[test]
    fn test_request_parsing_and_validation() {
        let req: CheckoutRequest = serde_json::from_value(json!({
            "provider": "paymob", "email": "mona@example.com", "shipping_address": address()
        }))
        .unwrap();
        assert_eq!(req.provider, PaymentProvider::Paymob);
        assert!(req.validate().is_ok());
        assert_eq!(BillingDetails::from(&req.shipping_address).country, "EG");
    }

    #[test]
    fn test_invalid_email_and_address_rejected() {
        let mut addr = address();
        addr["city"] = json!("");
        let req: CheckoutRequest = serde_json::from_value(json!({
            "provider": "stripe", "email": "not-an-email", "shipping_address": addr
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.errors().contains_key("email"));
        assert!(errors.errors().contains_key("shipping_address"));
    }

    #[test]
    fn test_unknown_provider_fails_to_parse() {
        let parsed = serde_json::from_value::<CheckoutRequest>(json!({
            "provider": "paypal", "shipping_address": address()
        }));
        assert!(parsed.is_err());
    }
}
