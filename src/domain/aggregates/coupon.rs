//! Coupon Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DiscountKind {
    /// Whole percent, 1..=100.
    Percentage(u8),
    /// Fixed amount in minor units of the store currency.
    Fixed(i64),
}

#[derive(Clone, Debug)]
pub struct Coupon {
    pub code: String,
    pub kind: DiscountKind,
    pub min_subtotal: Money,
    pub max_uses: Option<u32>,
    pub used_count: u32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Canonical form used for storage and lookup.
pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

impl Coupon {
    pub fn validate_kind(kind: &DiscountKind) -> Result<(), CouponError> {
        match kind {
            DiscountKind::Percentage(p) if *p == 0 || *p > 100 => Err(CouponError::InvalidValue),
            DiscountKind::Fixed(v) if *v <= 0 => Err(CouponError::InvalidValue),
            _ => Ok(()),
        }
    }

    pub fn check_applicable(&self, subtotal: &Money, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.active { return Err(CouponError::Inactive); }
        if self.starts_at.is_some_and(|s| now < s) { return Err(CouponError::NotYetValid); }
        if self.expires_at.is_some_and(|e| now >= e) { return Err(CouponError::Expired); }
        if self.max_uses.is_some_and(|m| self.used_count >= m) { return Err(CouponError::Exhausted); }
        if subtotal.currency() != self.min_subtotal.currency() { return Err(CouponError::InvalidValue); }
        if subtotal.amount() < self.min_subtotal.amount() {
            return Err(CouponError::BelowMinimum(self.min_subtotal.clone()));
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`; never more than the subtotal.
    pub fn discount_for(&self, subtotal: &Money, now: DateTime<Utc>) -> Result<Money, CouponError> {
        self.check_applicable(subtotal, now)?;
        let discount = match self.kind {
            DiscountKind::Percentage(p) => subtotal.percentage(p),
            DiscountKind::Fixed(minor) => Money::from_minor(minor, subtotal.currency()),
        };
        Ok(discount.min(subtotal.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not valid yet")]
    NotYetValid,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit reached")]
    Exhausted,
    #[error("Order subtotal must be at least {0}")]
    BelowMinimum(Money),
    #[error("Invalid discount value")]
    InvalidValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(kind: DiscountKind) -> Coupon {
        Coupon {
            code: "SAVE".into(), kind, min_subtotal: Money::zero("EGP"), max_uses: None, used_count: 0,
            starts_at: None, expires_at: None, active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let c = coupon(DiscountKind::Percentage(10));
        let d = c.discount_for(&Money::from_minor(25_000, "EGP"), Utc::now()).unwrap();
        assert_eq!(d.to_minor(), 2_500);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let c = coupon(DiscountKind::Fixed(10_000));
        let d = c.discount_for(&Money::from_minor(4_000, "EGP"), Utc::now()).unwrap();
        assert_eq!(d.to_minor(), 4_000);
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        let mut c = coupon(DiscountKind::Percentage(5));
        c.starts_at = Some(now + Duration::hours(1));
        assert_eq!(c.check_applicable(&Money::from_minor(100, "EGP"), now), Err(CouponError::NotYetValid));
        c.starts_at = None;
        c.expires_at = Some(now);
        assert_eq!(c.check_applicable(&Money::from_minor(100, "EGP"), now), Err(CouponError::Expired));
    }

    #[test]
    fn test_usage_and_minimum() {
        let mut c = coupon(DiscountKind::Fixed(500));
        c.max_uses = Some(3);
        c.used_count = 3;
        assert_eq!(c.check_applicable(&Money::from_minor(1_000, "EGP"), Utc::now()), Err(CouponError::Exhausted));
        c.used_count = 0;
        c.min_subtotal = Money::from_minor(5_000, "EGP");
        assert!(matches!(c.check_applicable(&Money::from_minor(4_999, "EGP"), Utc::now()), Err(CouponError::BelowMinimum(_))));
        c.active = false;
        assert_eq!(c.check_applicable(&Money::from_minor(9_999, "EGP"), Utc::now()), Err(CouponError::Inactive));
    }

    #[test]
    fn test_kind_validation_and_code() {
        assert_eq!(Coupon::validate_kind(&DiscountKind::Percentage(0)), Err(CouponError::InvalidValue));
        assert_eq!(Coupon::validate_kind(&DiscountKind::Percentage(101)), Err(CouponError::InvalidValue));
        assert!(Coupon::validate_kind(&DiscountKind::Fixed(1)).is_ok());
        assert_eq!(normalize_code("  summer24 "), "SUMMER24");
    }
}
