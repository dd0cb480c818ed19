//! Cart Aggregate

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

/// Upper bound on the quantity of a single variant in one cart.
pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    currency: String,
    items: Vec<CartLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Stock on hand when the line was loaded.
    pub stock: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

/// A line whose quantity exceeds the stock currently available.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockIssue { pub variant_id: Uuid, pub sku: String, pub requested: u32, pub available: u32 }

/// Outcome of folding a guest cart into a customer's cart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub merged: Vec<Uuid>,
    pub clamped: Vec<Uuid>,
    pub dropped: Vec<Uuid>,
}

impl Cart {
    pub fn new(id: Uuid, currency: &str) -> Self {
        Self { id, currency: currency.to_uppercase(), items: vec![] }
    }

    /// Rebuilds a cart from stored lines without re-running stock checks.
    pub fn restore(id: Uuid, currency: &str, items: Vec<CartLine>) -> Self {
        Self { id, currency: currency.to_uppercase(), items }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn line(&self, variant_id: Uuid) -> Option<&CartLine> {
        self.items.iter().find(|i| i.variant_id == variant_id)
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc))
    }

    pub fn add_item(&mut self, item: CartLine) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        let existing = self.line(item.variant_id).map(|l| l.quantity).unwrap_or(0);
        let wanted = existing.saturating_add(item.quantity);
        if wanted > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)); }
        if wanted > item.stock {
            return Err(CartError::InsufficientStock { sku: item.sku, available: item.stock });
        }
        match self.items.iter_mut().find(|i| i.variant_id == item.variant_id) {
            Some(line) => {
                line.quantity = wanted;
                line.stock = item.stock;
                line.unit_price = item.unit_price;
            }
            None => self.items.push(item),
        }
        Ok(())
    }

    pub fn update_quantity(&mut self, variant_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return self.remove_item(variant_id); }
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit(MAX_LINE_QUANTITY)); }
        let line = self.items.iter_mut().find(|i| i.variant_id == variant_id).ok_or(CartError::ItemNotFound)?;
        if quantity > line.stock {
            return Err(CartError::InsufficientStock { sku: line.sku.clone(), available: line.stock });
        }
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, variant_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.variant_id != variant_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); }

    /// Folds `guest` into this cart. Quantities of the same variant are
    /// summed, then clamped to stock and the per-line cap; lines with no
    /// stock left are dropped.
    pub fn merge_from(&mut self, guest: &Cart) -> MergeReport {
        let mut report = MergeReport::default();
        for incoming in &guest.items {
            let current = self.line(incoming.variant_id).map(|l| l.quantity).unwrap_or(0);
            let limit = incoming.stock.min(MAX_LINE_QUANTITY);
            if limit == 0 {
                self.items.retain(|i| i.variant_id != incoming.variant_id);
                report.dropped.push(incoming.variant_id);
                continue;
            }
            let wanted = current.saturating_add(incoming.quantity);
            let quantity = wanted.min(limit);
            if quantity < wanted { report.clamped.push(incoming.variant_id); }
            match self.items.iter_mut().find(|i| i.variant_id == incoming.variant_id) {
                Some(line) => {
                    line.quantity = quantity;
                    line.stock = incoming.stock;
                }
                None => self.items.push(CartLine { quantity, ..incoming.clone() }),
            }
            report.merged.push(incoming.variant_id);
        }
        report
    }

    pub fn validate_stock(&self) -> Result<(), Vec<StockIssue>> {
        let issues: Vec<StockIssue> = self.items.iter()
            .filter(|i| i.quantity > i.stock)
            .map(|i| StockIssue { variant_id: i.variant_id, sku: i.sku.clone(), requested: i.quantity, available: i.stock })
            .collect();
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item not found")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("At most {0} of a single item per order")]
    QuantityLimit(u32),
    #[error("Only {available} of {sku} left in stock")]
    InsufficientStock { sku: String, available: u32 },
    #[error("Item price is in a different currency than the cart")]
    CurrencyMismatch,
}
