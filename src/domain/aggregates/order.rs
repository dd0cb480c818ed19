//! Order Aggregate

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    order_number: String,
    status: OrderStatus,
    payment: PaymentStatus,
    items: Vec<LineItem>,
    pricing: Pricing,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LineItem { pub product_id: Uuid, pub variant_id: Uuid, pub name: String, pub sku: String, pub quantity: u32, pub unit_price: Money, pub total: Money }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Paid, Processing, Shipped, Delivered, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Paid => "paid", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => Self::Pending, "paid" => Self::Paid, "processing" => Self::Processing,
            "shipped" => Self::Shipped, "delivered" => Self::Delivered, "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            _ => return None,
        })
    }

    /// Transitions an operator may request. `Paid` is only reachable through
    /// a verified payment.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Cancelled)
                | (Paid, Processing) | (Paid, Cancelled) | (Paid, Refunded)
                | (Processing, Shipped) | (Processing, Cancelled) | (Processing, Refunded)
                | (Shipped, Delivered) | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed", Self::Refunded => "refunded" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => Self::Pending, "paid" => Self::Paid, "failed" => Self::Failed, "refunded" => Self::Refunded,
            _ => return None,
        })
    }
}

/// Flat-rate shipping, waived when the discounted subtotal reaches the threshold.
#[derive(Clone, Debug)]
pub struct ShippingPolicy { pub flat_rate: Money, pub free_threshold: Option<Money> }

impl ShippingPolicy {
    pub fn cost_for(&self, discounted_subtotal: &Money) -> Money {
        let free = self.free_threshold.as_ref().is_some_and(|t| discounted_subtotal.amount() >= t.amount());
        if free || discounted_subtotal.is_zero() { Money::zero(discounted_subtotal.currency()) } else { self.flat_rate.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pricing { pub subtotal: Money, pub discount: Money, pub shipping: Money, pub total: Money }

impl Pricing {
    pub fn compute(subtotal: Money, discount: Money, shipping: &ShippingPolicy) -> Result<Self, MoneyError> {
        let discount = discount.min(subtotal.clone());
        let discounted = subtotal.saturating_sub(&discount)?;
        let shipping = shipping.cost_for(&discounted);
        let total = discounted.add(&shipping)?;
        Ok(Self { subtotal, discount, shipping, total })
    }
}

impl Order {
    /// Snapshots the cart into a pending order.
    pub fn place(order_number: impl Into<String>, cart: &Cart, pricing: Pricing) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let items = cart.items().iter().map(|l| LineItem {
            product_id: l.product_id, variant_id: l.variant_id, name: l.name.clone(), sku: l.sku.clone(),
            quantity: l.quantity, unit_price: l.unit_price.clone(), total: l.line_total(),
        }).collect();
        let mut order = Self {
            id: Uuid::now_v7(), order_number: order_number.into(), status: OrderStatus::Pending,
            payment: PaymentStatus::Pending, items, pricing, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(),
            total_cents: order.pricing.total.to_minor(), currency: order.pricing.total.currency().to_string(),
        }));
        Ok(order)
    }

    /// Rebuilds an order's status state from storage.
    pub fn restore(id: Uuid, order_number: String, status: OrderStatus, payment: PaymentStatus, pricing: Pricing) -> Self {
        Self { id, order_number, status, payment, items: vec![], pricing, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn pricing(&self) -> &Pricing { &self.pricing }

    /// Returns `Ok(false)` when the order was already paid.
    pub fn mark_paid(&mut self, provider: &str, reference: &str) -> Result<bool, OrderError> {
        if self.payment == PaymentStatus::Paid { return Ok(false); }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Paid });
        }
        self.status = OrderStatus::Paid;
        self.payment = PaymentStatus::Paid;
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, provider: provider.into(), reference: reference.into() }));
        Ok(true)
    }

    /// Cancels a pending order after a declined payment. Returns `false`
    /// when the order had already left `Pending`.
    pub fn mark_payment_failed(&mut self, reason: &str) -> bool {
        if self.status != OrderStatus::Pending { return false; }
        self.status = OrderStatus::Cancelled;
        self.payment = PaymentStatus::Failed;
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id, reason: reason.into() }));
        true
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        // Money taken for an order that will not ship goes back.
        if next == OrderStatus::Refunded || (next == OrderStatus::Cancelled && self.payment == PaymentStatus::Paid) {
            self.payment = PaymentStatus::Refunded;
        }
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id, from: from.as_str().into(), to: next.as_str().into(),
        }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("No items")]
    NoItems,
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
