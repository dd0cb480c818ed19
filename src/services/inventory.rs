//! Stock movements driven by orders.
//!
//! Units leave stock when a payment settles and come back when an operator
//! cancels an order that was already paid. Both run through the product
//! aggregate with its variant rows locked.

use std::collections::BTreeMap;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::orders::OrderItemRow;
use crate::db::{products, variants};
use crate::domain::aggregates::{Product, ProductError};
use crate::domain::events::DomainEvent;
use crate::error::AppResult;
use crate::locale::Locale;

/// Order items grouped by product, in a stable order so concurrent
/// reconciliations lock variant rows in the same sequence.
fn by_product(items: &[OrderItemRow]) -> BTreeMap<Uuid, Vec<&OrderItemRow>> {
    let mut grouped: BTreeMap<Uuid, Vec<&OrderItemRow>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.product_id).or_default().push(item);
    }
    grouped
}

async fn load_for_update(conn: &mut PgConnection, product_id: Uuid, currency: &str, locale: Locale) -> AppResult<Option<Product>> {
    let Some(row) = products::find_by_id(&mut *conn, product_id, locale, locale).await? else {
        return Ok(None);
    };
    let variants = variants::list_for_product_for_update(conn, product_id)
        .await?
        .iter()
        .map(|v| v.to_domain(currency))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(row.to_domain(variants)?))
}

async fn save_stock(conn: &mut PgConnection, product: &Product, touched: &[Uuid]) -> AppResult<()> {
    for variant in product.variants().iter().filter(|v| touched.contains(&v.id)) {
        let stock = i32::try_from(variant.stock.value()).unwrap_or(i32::MAX);
        variants::set_stock(&mut *conn, variant.id, stock).await?;
    }
    Ok(())
}

/// Takes the units of a paid order out of stock. A line asking for more than
/// is on hand empties the variant and is logged as oversold; the payment has
/// already been captured at this point.
pub async fn take_for_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    items: &[OrderItemRow],
    currency: &str,
    locale: Locale,
) -> AppResult<Vec<DomainEvent>> {
    let mut events = Vec::new();
    for (product_id, lines) in by_product(items) {
        let Some(mut product) = load_for_update(conn, product_id, currency, locale).await? else {
            tracing::warn!(%order_id, %product_id, "paid product no longer exists");
            continue;
        };
        let mut touched = Vec::with_capacity(lines.len());
        for item in lines {
            let quantity = item.quantity.max(0) as u32;
            match product.remove_stock(item.variant_id, quantity) {
                Ok(()) => {}
                Err(ProductError::InsufficientStock { available, .. }) => {
                    tracing::warn!(
                        %order_id,
                        sku = %item.sku,
                        shortfall = quantity - available,
                        "oversold: paid quantity exceeded stock"
                    );
                    product.remove_stock(item.variant_id, available)?;
                }
                Err(ProductError::VariantNotFound(_)) => {
                    tracing::warn!(%order_id, variant_id = %item.variant_id, "paid item's variant no longer exists");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            touched.push(item.variant_id);
        }
        save_stock(conn, &product, &touched).await?;
        events.extend(product.take_events());
    }
    Ok(events)
}

/// Puts the units of a cancelled, previously paid order back into stock.
pub async fn restock_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    items: &[OrderItemRow],
    currency: &str,
    locale: Locale,
) -> AppResult<()> {
    for (product_id, lines) in by_product(items) {
        let Some(mut product) = load_for_update(conn, product_id, currency, locale).await? else {
            continue;
        };
        let mut touched = Vec::with_capacity(lines.len());
        for item in lines {
            match product.add_stock(item.variant_id, item.quantity.max(0) as u32) {
                Ok(()) => touched.push(item.variant_id),
                Err(ProductError::VariantNotFound(_)) => {
                    tracing::debug!(%order_id, variant_id = %item.variant_id, "skipping restock of removed variant");
                }
                Err(e) => return Err(e.into()),
            }
        }
        save_stock(conn, &product, &touched).await?;
    }
    tracing::info!(%order_id, lines = items.len(), "order stock returned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: Uuid, sku: &str) -> OrderItemRow {
        OrderItemRow {
            id: Uuid::new_v4(), product_id, variant_id: Uuid::new_v4(), sku: sku.into(),
            name: sku.into(), quantity: 1, unit_price: 1_000, total: 1_000,
        }
    }

    #[test]
    fn test_items_grouped_by_product_in_stable_order() {
        let (a, b) = (Uuid::from_u128(2), Uuid::from_u128(1));
        let items = vec![item(a, "A-1"), item(b, "B-1"), item(a, "A-2")];
        let grouped = by_product(&items);
        let keys: Vec<Uuid> = grouped.keys().copied().collect();
        assert_eq!(keys, vec![b, a]);
        let skus: Vec<&str> = grouped[&a].iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(skus, vec!["A-1", "A-2"]);
    }
}
