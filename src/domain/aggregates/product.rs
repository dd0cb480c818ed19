//! Product Aggregate

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Quantity, Sku, Slug};

#[derive(Clone, Debug)]
pub struct Product {
    id: Uuid,
    slug: Slug,
    name: String,
    status: ProductStatus,
    variants: Vec<Variant>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug)]
pub struct Variant { pub id: Uuid, pub sku: Sku, pub title: String, pub price: Money, pub compare_at_price: Option<Money>, pub stock: Quantity }

impl Variant {
    pub fn add_stock(&mut self, quantity: u32) { self.stock = self.stock.add(quantity); }

    pub fn remove_stock(&mut self, quantity: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(quantity).ok_or_else(|| ProductError::InsufficientStock {
            sku: self.sku.to_string(),
            requested: quantity,
            available: self.stock.value(),
        })?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl Product {
    pub fn create(slug: Slug, name: impl Into<String>) -> Self {
        let id = Uuid::now_v7();
        let mut product = Self {
            id, slug: slug.clone(), name: name.into(), status: ProductStatus::Draft,
            variants: vec![], events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, slug: slug.to_string() }));
        product
    }

    /// Rebuilds a product from persisted state without raising events.
    pub fn restore(id: Uuid, slug: Slug, name: String, status: ProductStatus, variants: Vec<Variant>) -> Self {
        Self { id, slug, name, status, variants, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn slug(&self) -> &Slug { &self.slug }
    pub fn name(&self) -> &str { &self.name }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn variants(&self) -> &[Variant] { &self.variants }
    pub fn is_in_stock(&self) -> bool { self.variants.iter().any(|v| !v.stock.is_zero()) }

    pub fn add_variant(&mut self, variant: Variant) -> Result<(), ProductError> {
        if self.variants.iter().any(|v| v.sku == variant.sku) {
            return Err(ProductError::DuplicateSku(variant.sku.to_string()));
        }
        if let Some(compare) = &variant.compare_at_price {
            if compare.currency() != variant.price.currency() { return Err(ProductError::CurrencyMismatch); }
        }
        self.variants.push(variant);
        Ok(())
    }

    /// Cheapest and dearest variant price.
    pub fn price_range(&self) -> Option<(Money, Money)> {
        let mut prices = self.variants.iter().map(|v| &v.price);
        let first = prices.next()?;
        let (min, max) = prices.fold((first, first), |(lo, hi), p| {
            (if p.amount() < lo.amount() { p } else { lo }, if p.amount() > hi.amount() { p } else { hi })
        });
        Some((min.clone(), max.clone()))
    }

    fn variant_mut(&mut self, variant_id: Uuid) -> Result<&mut Variant, ProductError> {
        self.variants.iter_mut().find(|v| v.id == variant_id).ok_or(ProductError::VariantNotFound(variant_id))
    }

    pub fn add_stock(&mut self, variant_id: Uuid, quantity: u32) -> Result<(), ProductError> {
        self.variant_mut(variant_id)?.add_stock(quantity);
        Ok(())
    }

    /// Fails without touching stock when fewer than `quantity` units are on
    /// hand. Raises `InventoryDepleted` when the variant reaches zero.
    pub fn remove_stock(&mut self, variant_id: Uuid, quantity: u32) -> Result<(), ProductError> {
        let product_id = self.id;
        let variant = self.variant_mut(variant_id)?;
        let was_empty = variant.stock.is_zero();
        variant.remove_stock(quantity)?;
        if variant.stock.is_zero() && !was_empty {
            let sku = variant.sku.to_string();
            self.raise_event(DomainEvent::Product(ProductEvent::InventoryDepleted { product_id, variant_id, sku }));
        }
        Ok(())
    }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.variants.is_empty() { return Err(ProductError::NoVariants); }
        if self.status == ProductStatus::Active { return Ok(()); }
        self.status = ProductStatus::Active;
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) {
        if self.status == ProductStatus::Archived { return; }
        self.status = ProductStatus::Archived;
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Product needs at least one variant")]
    NoVariants,
    #[error("Duplicate SKU {0}")]
    DuplicateSku(String),
    #[error("Compare-at price currency differs from price currency")]
    CurrencyMismatch,
    #[error("Variant {0} not found")]
    VariantNotFound(Uuid),
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock { sku: String, requested: u32, available: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(sku: &str, cents: i64, stock: u32) -> Variant {
        Variant {
            id: Uuid::new_v4(), sku: Sku::new(sku).unwrap(), title: "Default".into(),
            price: Money::from_minor(cents, "EGP"), compare_at_price: None, stock: Quantity::new(stock),
        }
    }

    #[test]
    fn test_product_create() {
        let mut p = Product::create(Slug::new("test-product").unwrap(), "Test Product");
        assert_eq!(p.name(), "Test Product");
        assert_eq!(p.status(), ProductStatus::Draft);
        assert_eq!(p.take_events().len(), 1);
    }

    #[test]
    fn test_publish_requires_variant() {
        let mut p = Product::create(Slug::new("p").unwrap(), "P");
        assert_eq!(p.publish(), Err(ProductError::NoVariants));
        p.add_variant(variant("P-1", 1000, 3)).unwrap();
        assert!(p.is_in_stock());
        p.publish().unwrap();
        assert_eq!(p.status(), ProductStatus::Active);
    }

    #[test]
    fn test_duplicate_sku_rejected() {
        let mut p = Product::create(Slug::new("p").unwrap(), "P");
        p.add_variant(variant("P-1", 1000, 3)).unwrap();
        assert!(matches!(p.add_variant(variant("p-1", 900, 1)), Err(ProductError::DuplicateSku(_))));
    }

    #[test]
    fn test_price_range() {
        let mut p = Product::create(Slug::new("p").unwrap(), "P");
        assert_eq!(p.price_range(), None);
        p.add_variant(variant("P-S", 1_500, 1)).unwrap();
        p.add_variant(variant("P-M", 900, 1)).unwrap();
        p.add_variant(variant("P-L", 2_100, 1)).unwrap();
        let (min, max) = p.price_range().unwrap();
        assert_eq!((min.to_minor(), max.to_minor()), (900, 2_100));
    }

    #[test]
    fn test_stock_add_and_remove() {
        let mut p = Product::create(Slug::new("p").unwrap(), "P");
        let v = variant("P-1", 1000, 2);
        let id = v.id;
        p.add_variant(v).unwrap();
        p.take_events();

        p.add_stock(id, 3).unwrap();
        p.remove_stock(id, 4).unwrap();
        assert_eq!(p.variants()[0].stock.value(), 1);
        assert!(p.take_events().is_empty());

        assert_eq!(
            p.remove_stock(id, 2),
            Err(ProductError::InsufficientStock { sku: "P-1".into(), requested: 2, available: 1 })
        );
        assert_eq!(p.variants()[0].stock.value(), 1);

        p.remove_stock(id, 1).unwrap();
        assert!(!p.is_in_stock());
        let events = p.take_events();
        assert!(matches!(&events[..], [DomainEvent::Product(ProductEvent::InventoryDepleted { sku, .. })] if sku == "P-1"));

        assert_eq!(p.add_stock(Uuid::nil(), 1), Err(ProductError::VariantNotFound(Uuid::nil())));
    }

}
