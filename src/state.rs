//! Shared application state handed to every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::JwtService;
use crate::config::Config;
use crate::domain::aggregates::ShippingPolicy;
use crate::domain::value_objects::Money;
use crate::payments::PaymentGateways;
use crate::publisher::EventPublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub jwt: JwtService,
    pub gateways: PaymentGateways,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, events: EventPublisher) -> Self {
        let jwt = JwtService::new(&config.jwt);
        let gateways = PaymentGateways::from_config(&config);
        Self { db, config: Arc::new(config), jwt, gateways, events }
    }

    pub fn currency(&self) -> &str { &self.config.store.currency }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        let store = &self.config.store;
        ShippingPolicy {
            flat_rate: Money::from_minor(store.shipping_flat_cents, &store.currency),
            free_threshold: store.free_shipping_threshold_cents.map(|c| Money::from_minor(c, &store.currency)),
        }
    }
}
