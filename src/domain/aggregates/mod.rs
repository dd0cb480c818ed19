//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;

pub use product::{Product, ProductError, ProductStatus, Variant};
pub use order::{LineItem, Order, OrderError, OrderStatus, PaymentStatus, Pricing, ShippingPolicy};
pub use cart::{Cart, CartError, CartLine, MergeReport, StockIssue};
pub use coupon::{normalize_code, Coupon, CouponError, DiscountKind};
