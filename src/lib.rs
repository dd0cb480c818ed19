//! Storefront
//!
//! Multi-locale e-commerce storefront service.
//!
//! ## Features
//! - Localized product catalog with search and a category tree
//! - Guest and customer carts, merged on sign-in
//! - Coupons and flat-rate shipping with a free-shipping threshold
//! - Checkout through Paymob or Stripe hosted payment pages
//! - Signed, idempotent payment webhooks
//! - Back-office API for catalog, coupons, orders and a dashboard

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod locale;
pub mod payments;
pub mod publisher;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
