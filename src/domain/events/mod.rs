//! Domain events
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, slug: String },
    Published { product_id: Uuid },
    Archived { product_id: Uuid },
    InventoryDepleted { product_id: Uuid, variant_id: Uuid, sku: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, total_cents: i64, currency: String },
    Paid { order_id: Uuid, provider: String, reference: String },
    PaymentFailed { order_id: Uuid, reason: String },
    StatusChanged { order_id: Uuid, from: String, to: String },
}

impl DomainEvent {
    /// NATS subject, `storefront.<aggregate>.<event>`.
    pub fn subject(&self) -> String {
        let (aggregate, event) = match self {
            DomainEvent::Product(e) => ("product", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::Published { .. } => "published",
                ProductEvent::Archived { .. } => "archived",
                ProductEvent::InventoryDepleted { .. } => "inventory_depleted",
            }),
            DomainEvent::Order(e) => ("order", match e {
                OrderEvent::Placed { .. } => "placed",
                OrderEvent::Paid { .. } => "paid",
                OrderEvent::PaymentFailed { .. } => "payment_failed",
                OrderEvent::StatusChanged { .. } => "status_changed",
            }),
        };
        format!("storefront.{aggregate}.{event}")
    }
}
