//! Public catalog: product listing, product pages and the category tree.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::PaginatedResponse;
use crate::catalog::{ProductFilter, ProductQuery, StatusScope};
use crate::db::categories::{self, CategoryRow};
use crate::db::products::{self, ProductRow, ProductSummaryRow};
use crate::db::variants::{self, VariantRow};
use crate::domain::aggregates::Product;
use crate::error::{AppError, AppResult};
use crate::locale::{Locale, RequestLocale};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:slug", get(get_product))
        .route("/categories", get(list_categories))
        .route("/categories/:slug", get(get_category))
}

/// Envelope carrying the resolved locale, so clients can set `dir`.
#[derive(Debug, Serialize)]
pub struct Localized<T> {
    pub locale: Locale,
    pub rtl: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Localized<T> {
    pub fn new(locale: Locale, body: T) -> Self { Self { locale, rtl: locale.is_rtl(), body } }
}

/// GET /api/v1/products
async fn list_products(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<Localized<PaginatedResponse<ProductSummaryRow>>>> {
    let filter = ProductFilter::from_query(query, StatusScope::ActiveOnly);
    let (data, total) = products::search(&state.db, &filter, locale, state.config.default_locale).await?;
    tracing::debug!(q = ?filter.q, category = ?filter.category, total, "catalog search");
    let page = PaginatedResponse { data, total, page: filter.page, per_page: filter.per_page };
    Ok(Json(Localized::new(locale, page)))
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: ProductRow,
    pub variants: Vec<VariantRow>,
    pub category: Option<CategoryRow>,
    pub in_stock: bool,
    pub price_range: Option<PriceRange>,
}

/// Minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    pub fn of(product: &Product) -> Option<Self> {
        product.price_range().map(|(min, max)| Self { min: min.to_minor(), max: max.to_minor() })
    }
}

/// GET /api/v1/products/:slug
async fn get_product(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
    Path(slug): Path<String>,
) -> AppResult<Json<Localized<ProductDetail>>> {
    let fallback = state.config.default_locale;
    let product = products::find_by_slug(&state.db, &slug, locale, fallback)
        .await?
        .filter(|p| p.status == "active")
        .ok_or_else(|| AppError::not_found(format!("Product {slug} not found")))?;
    let variants = variants::list_for_product(&state.db, product.id).await?;
    let category = match product.category_id {
        Some(id) => categories::find_by_id(&state.db, id, locale, fallback).await?,
        None => None,
    };
    let aggregate = product.to_domain(
        variants.iter().map(|v| v.to_domain(state.currency())).collect::<Result<Vec<_>, _>>()?,
    )?;
    let in_stock = aggregate.is_in_stock();
    let price_range = PriceRange::of(&aggregate);
    Ok(Json(Localized::new(locale, ProductDetail { product, variants, category, in_stock, price_range })))
}

#[derive(Debug, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: CategoryRow,
    pub children: Vec<CategoryNode>,
}

/// Nests a flat category list under its parents. Categories whose parent is
/// missing from the list become roots.
pub fn build_tree(rows: Vec<CategoryRow>) -> Vec<CategoryNode> {
    let ids: std::collections::HashSet<Uuid> = rows.iter().map(|c| c.id).collect();
    let (roots, rest): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|c| c.parent_id.map_or(true, |p| !ids.contains(&p)));

    fn attach(parent: &mut CategoryNode, pool: &mut Vec<CategoryRow>) {
        let (mine, others): (Vec<_>, Vec<_>) =
            std::mem::take(pool).into_iter().partition(|c| c.parent_id == Some(parent.category.id));
        *pool = others;
        for category in mine {
            let mut node = CategoryNode { category, children: vec![] };
            attach(&mut node, pool);
            parent.children.push(node);
        }
    }

    let mut pool = rest;
    roots
        .into_iter()
        .map(|category| {
            let mut node = CategoryNode { category, children: vec![] };
            attach(&mut node, &mut pool);
            node
        })
        .collect()
}

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
) -> AppResult<Json<Localized<CategoryList>>> {
    let rows = categories::list(&state.db, locale, state.config.default_locale).await?;
    Ok(Json(Localized::new(locale, CategoryList { categories: build_tree(rows) })))
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<CategoryNode>,
}

#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    pub category: CategoryRow,
    pub children: Vec<CategoryRow>,
}

/// GET /api/v1/categories/:slug
async fn get_category(
    State(state): State<AppState>,
    RequestLocale(locale): RequestLocale,
    Path(slug): Path<String>,
) -> AppResult<Json<Localized<CategoryDetail>>> {
    let fallback = state.config.default_locale;
    let category = categories::find_by_slug(&state.db, &slug, locale, fallback)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Category {slug} not found")))?;
    let children = categories::children(&state.db, category.id, locale, fallback).await?;
    Ok(Json(Localized::new(locale, CategoryDetail { category, children })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(slug: &str, id: Uuid, parent_id: Option<Uuid>) -> CategoryRow {
        CategoryRow {
            id, slug: slug.into(), parent_id, image_url: None, position: 0,
            name: slug.to_uppercase(), description: None, updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree_nests_children() {
        let (men, shirts, linen, sale) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tree = build_tree(vec![
            category("men", men, None),
            category("sale", sale, None),
            category("shirts", shirts, Some(men)),
            category("linen", linen, Some(shirts)),
        ]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.slug, "men");
        assert_eq!(tree[0].children[0].category.slug, "shirts");
        assert_eq!(tree[0].children[0].children[0].category.slug, "linen");
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_orphans_become_roots() {
        let tree = build_tree(vec![category("lost", Uuid::new_v4(), Some(Uuid::new_v4()))]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_price_range_in_minor_units() {
        use crate::domain::aggregates::{ProductStatus, Variant};
        use crate::domain::value_objects::{Money, Quantity, Sku, Slug};

        let variant = |sku: &str, cents: i64| Variant {
            id: Uuid::new_v4(), sku: Sku::new(sku).unwrap(), title: sku.into(),
            price: Money::from_minor(cents, "EGP"), compare_at_price: None, stock: Quantity::new(1),
        };
        let product = Product::restore(
            Uuid::new_v4(), Slug::new("abaya").unwrap(), "Abaya".into(), ProductStatus::Active,
            vec![variant("AB-S", 120_000), variant("AB-L", 95_000)],
        );
        assert_eq!(PriceRange::of(&product), Some(PriceRange { min: 95_000, max: 120_000 }));
        let empty = Product::restore(Uuid::new_v4(), Slug::new("x").unwrap(), "X".into(), ProductStatus::Draft, vec![]);
        assert_eq!(PriceRange::of(&empty), None);
    }

    #[test]
    fn test_localized_envelope() {
        let json = serde_json::to_value(Localized::new(Locale::Ar, CategoryList { categories: vec![] })).unwrap();
        assert_eq!(json["locale"], "ar");
        assert_eq!(json["rtl"], true);
        assert!(json["categories"].as_array().unwrap().is_empty());
    }
}
