//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        if value.chars().any(char::is_whitespace) { return Err(SkuError::Whitespace); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
    #[error("SKU must not contain whitespace")]
    Whitespace,
}

/// URL handle for products and categories.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into();
        if value.is_empty() || value.len() > 120 { return Err(SlugError::Length); }
        let valid = value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid || value.starts_with('-') || value.ends_with('-') || value.contains("--") {
            return Err(SlugError::Format);
        }
        Ok(Self(value))
    }

    /// Derives a slug from a display title, collapsing every run of
    /// non-alphanumeric characters into a single dash. Titles with nothing
    /// ASCII to keep (Arabic names, for one) get a generated `item-` slug.
    pub fn from_title(title: &str) -> Self {
        let mut out = String::with_capacity(title.len());
        for c in title.trim().chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.truncate(120);
        let out = out.trim_end_matches('-');
        if out.is_empty() {
            return Self(format!("item-{}", &Uuid::new_v4().simple().to_string()[..12]));
        }
        Self(out.to_string())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("slug must be 1-120 characters")]
    Length,
    #[error("slug may only contain lowercase letters, digits and single dashes")]
    Format,
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }

    /// Builds from an integer amount of minor units (cents, piasters).
    pub fn from_minor(minor: i64, currency: &str) -> Self { Self::new(Decimal::new(minor, 2), currency) }

    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }

    pub fn to_minor(&self) -> i64 {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new((self.amount - other.amount).max(Decimal::ZERO), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    pub fn percentage(&self, percent: u8) -> Money {
        let value = self.amount * Decimal::from(percent) / Decimal::ONE_HUNDRED;
        Money::new(value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), &self.currency)
    }

    pub fn min(self, other: Money) -> Money { if other.amount < self.amount { other } else { self } }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    /// `None` when `other` exceeds what is held.
    pub fn subtract(&self, other: u32) -> Option<Self> { self.0.checked_sub(other).map(Self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }

    #[test]
    fn test_sku_rejects_inner_space() { assert_eq!(Sku::new("A B"), Err(SkuError::Whitespace)); }

    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "usd");
        let b = Money::new(Decimal::new(50, 0), "USD");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::zero("EGP")), Err(MoneyError::CurrencyMismatch));
    }

    #[test]
    fn test_money_minor_units() {
        let m = Money::from_minor(12_345, "egp");
        assert_eq!(m.amount(), Decimal::new(12345, 2));
        assert_eq!(m.currency(), "EGP");
        assert_eq!(m.to_minor(), 12_345);
    }

    #[test]
    fn test_money_percentage_rounds_half_up() {
        // 15% of 0.99 = 0.1485
        let m = Money::from_minor(99, "USD").percentage(15);
        assert_eq!(m.to_minor(), 15);
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let m = Money::from_minor(500, "USD").saturating_sub(&Money::from_minor(900, "USD")).unwrap();
        assert!(m.is_zero());
    }

    #[test]
    fn test_slug_from_non_ascii_title() {
        let slug = Slug::from_title("فستان صيفي");
        assert!(slug.as_str().starts_with("item-"));
        assert_eq!(Slug::new(slug.as_str()), Ok(slug.clone()));
        assert_ne!(slug, Slug::from_title("!!!"));
    }

    #[test]
    fn test_quantity_subtract() {
        let q = Quantity::new(3);
        assert_eq!(q.subtract(2), Some(Quantity::new(1)));
        assert_eq!(q.subtract(4), None);
        assert_eq!(q.add(u32::MAX).value(), u32::MAX);
    }

    #[test]
    fn test_slug_from_title() {
        assert_eq!(Slug::from_title("  Summer Dress -- Blue!  ").as_str(), "summer-dress-blue");
        assert_eq!(Slug::from_title("عباية Abaya 2").as_str(), "abaya-2");
        assert_eq!(Slug::new("Bad Slug"), Err(SlugError::Format));
    }
}
