//! Product and variant management.
//!
//! Lifecycle changes (publish, archive) load the product aggregate so its
//! rules run against the stored variants.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::default_translation;
use crate::api::PaginatedResponse;
use crate::auth::AdminUser;
use crate::catalog::{ProductFilter, ProductQuery, StatusScope};
use crate::db::products::{self, ProductRow, ProductSummaryRow, ProductWrite};
use crate::db::variants::{self, VariantRow, VariantWrite};
use crate::db::Translation;
use crate::domain::aggregates::{Product, ProductStatus, Variant};
use crate::domain::value_objects::{Money, Quantity, Sku, Slug};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/:id", get(detail).put(update).delete(remove))
        .route("/products/:id/publish", post(publish))
        .route("/products/:id/archive", post(archive))
        .route("/products/:id/variants", post(add_variant))
        .route("/products/:id/variants/:variant_id", put(update_variant).delete(delete_variant))
}

#[derive(Debug, Deserialize, Validate)]
pub struct VariantInput {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub compare_at_price: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub position: i32,
}

impl VariantInput {
    fn to_domain(&self, id: Uuid, currency: &str) -> AppResult<Variant> {
        Ok(Variant {
            id,
            sku: Sku::new(self.sku.trim())?,
            title: self.title.trim().to_string(),
            price: Money::from_minor(self.price, currency),
            compare_at_price: self.compare_at_price.map(|c| Money::from_minor(c, currency)),
            stock: Quantity::new(self.stock.max(0) as u32),
        })
    }

    fn write<'a>(&'a self, sku: &'a Sku, options: &'a serde_json::Value) -> VariantWrite<'a> {
        VariantWrite {
            sku: sku.as_str(),
            title: self.title.trim(),
            price: self.price,
            compare_at_price: self.compare_at_price,
            stock: self.stock,
            options,
            position: self.position,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    /// Derived from the default-locale name when absent.
    pub slug: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    pub product: ProductInput,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantInput>,
    /// Publish right away; requires at least one variant.
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: ProductRow,
    pub variants: Vec<VariantRow>,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ProductStatus>,
}

fn empty_options(options: &serde_json::Value) -> serde_json::Value {
    if options.is_null() { serde_json::json!({}) } else { options.clone() }
}

impl ProductInput {
    /// Slug and default-locale name after validation.
    fn resolve(&self, state: &AppState) -> AppResult<(Slug, String)> {
        let name = default_translation(&self.translations, state.config.default_locale)?.name.trim().to_string();
        let slug = match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => Slug::new(slug)?,
            None => Slug::from_title(&name),
        };
        Ok((slug, name))
    }

    fn write<'a>(&'a self, slug: &'a Slug) -> ProductWrite<'a> {
        ProductWrite {
            slug: slug.as_str(),
            category_id: self.category_id,
            featured: self.featured,
            images: &self.images,
            tags: &self.tags,
            translations: &self.translations,
        }
    }
}

async fn load_detail(state: &AppState, id: Uuid) -> AppResult<ProductDetail> {
    let fallback = state.config.default_locale;
    let product = products::find_by_id(&state.db, id, fallback, fallback)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;
    let variants = variants::list_for_product(&state.db, id).await?;
    let translations = products::translations(&state.db, id)
        .await?
        .into_iter()
        .filter_map(|(locale, name, description)| Some(Translation { locale: locale.parse().ok()?, name, description }))
        .collect();
    Ok(ProductDetail { product, variants, translations })
}

/// Rebuilds the aggregate from storage so lifecycle rules run against the
/// current variants.
async fn load_aggregate(state: &AppState, id: Uuid) -> AppResult<Product> {
    let detail = load_detail(state, id).await?;
    let variants = detail
        .variants
        .iter()
        .map(|v| v.to_domain(state.currency()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(detail.product.to_domain(variants)?)
}

/// GET /api/v1/admin/products
async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ProductQuery>,
    Query(status): Query<StatusFilter>,
) -> AppResult<Json<PaginatedResponse<ProductSummaryRow>>> {
    let scope = StatusScope::Exactly(status.status.map(|s| s.as_str()));
    let filter = ProductFilter::from_query(query, scope);
    let fallback = state.config.default_locale;
    let (data, total) = products::search(&state.db, &filter, fallback, fallback).await?;
    Ok(Json(PaginatedResponse { data, total, page: filter.page, per_page: filter.per_page }))
}

/// POST /api/v1/admin/products
async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ProductDetail>)> {
    req.validate()?;
    let (slug, name) = req.product.resolve(&state)?;
    let mut product = Product::create(slug.clone(), name);
    for input in &req.variants {
        product.add_variant(input.to_domain(Uuid::now_v7(), state.currency())?)?;
    }
    if req.publish {
        product.publish()?;
    }

    let mut tx = state.db.begin().await?;
    products::insert(&mut tx, product.id(), product.status().as_str(), req.product.write(&slug)).await?;
    for (input, variant) in req.variants.iter().zip(product.variants()) {
        let options = empty_options(&input.options);
        variants::insert(&mut *tx, variant.id, product.id(), input.write(&variant.sku, &options)).await?;
    }
    tx.commit().await?;

    tracing::info!(product_id = %product.id(), slug = %product.slug(), admin_id = %admin.id, status = product.status().as_str(), "product created");
    state.events.publish_all(product.take_events()).await;
    Ok((StatusCode::CREATED, Json(load_detail(&state, product.id()).await?)))
}

/// GET /api/v1/admin/products/:id
async fn detail(State(state): State<AppState>, _admin: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<ProductDetail>> {
    Ok(Json(load_detail(&state, id).await?))
}

/// PUT /api/v1/admin/products/:id
async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductInput>,
) -> AppResult<Json<ProductDetail>> {
    req.validate()?;
    let (slug, _) = req.resolve(&state)?;
    let mut tx = state.db.begin().await?;
    if !products::update(&mut tx, id, req.write(&slug)).await? {
        return Err(AppError::not_found(format!("Product {id} not found")));
    }
    tx.commit().await?;
    tracing::info!(product_id = %id, admin_id = %admin.id, "product updated");
    Ok(Json(load_detail(&state, id).await?))
}

/// POST /api/v1/admin/products/:id/publish
async fn publish(State(state): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<ProductDetail>> {
    let mut product = load_aggregate(&state, id).await?;
    product.publish()?;
    products::set_status(&state.db, id, product.status().as_str()).await?;
    tracing::info!(product_id = %id, admin_id = %admin.id, in_stock = product.is_in_stock(), "product published");
    state.events.publish_all(product.take_events()).await;
    Ok(Json(load_detail(&state, id).await?))
}

/// POST /api/v1/admin/products/:id/archive
async fn archive(State(state): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<ProductDetail>> {
    let mut product = load_aggregate(&state, id).await?;
    product.archive();
    products::set_status(&state.db, id, product.status().as_str()).await?;
    tracing::info!(product_id = %id, admin_id = %admin.id, "product archived");
    state.events.publish_all(product.take_events()).await;
    Ok(Json(load_detail(&state, id).await?))
}

/// DELETE /api/v1/admin/products/:id
async fn remove(State(state): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !products::delete(&state.db, id).await? {
        return Err(AppError::not_found(format!("Product {id} not found")));
    }
    tracing::info!(product_id = %id, admin_id = %admin.id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/products/:id/variants
async fn add_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<VariantInput>,
) -> AppResult<(StatusCode, Json<VariantRow>)> {
    req.validate()?;
    let mut product = load_aggregate(&state, id).await?;
    let variant = req.to_domain(Uuid::now_v7(), state.currency())?;
    product.add_variant(variant.clone())?;
    let options = empty_options(&req.options);
    let row = variants::insert(&state.db, variant.id, id, req.write(&variant.sku, &options)).await?;
    tracing::info!(product_id = %id, variant_id = %row.id, sku = %row.sku, "variant added");
    Ok((StatusCode::CREATED, Json(row)))
}

/// Partial variant update; absent fields keep their value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVariantRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub compare_at_price: Option<i64>,
    /// Drops the compare-at price.
    #[serde(default)]
    pub clear_compare_at_price: bool,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub options: Option<serde_json::Value>,
    pub position: Option<i32>,
}

impl UpdateVariantRequest {
    fn apply(self, current: VariantRow) -> AppResult<VariantInput> {
        let sku = match self.sku {
            Some(sku) => Sku::new(sku.trim())?.to_string(),
            None => current.sku,
        };
        let compare_at_price = if self.clear_compare_at_price { None } else { self.compare_at_price.or(current.compare_at_price) };
        Ok(VariantInput {
            sku,
            title: self.title.unwrap_or(current.title),
            price: self.price.unwrap_or(current.price),
            compare_at_price,
            stock: self.stock.unwrap_or(current.stock),
            options: self.options.unwrap_or(current.options),
            position: self.position.unwrap_or(current.position),
        })
    }
}

async fn product_variant(state: &AppState, product_id: Uuid, variant_id: Uuid) -> AppResult<VariantRow> {
    variants::find(&state.db, variant_id)
        .await?
        .filter(|v| v.product_id == product_id)
        .ok_or_else(|| AppError::not_found(format!("Variant {variant_id} not found")))
}

/// PUT /api/v1/admin/products/:id/variants/:variant_id
async fn update_variant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((id, variant_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateVariantRequest>,
) -> AppResult<Json<VariantRow>> {
    req.validate()?;
    let current = product_variant(&state, id, variant_id).await?;
    let previous_stock = current.stock;
    let input = req.apply(current)?;
    let sku = Sku::new(input.sku.as_str())?;
    let options = empty_options(&input.options);
    let row = variants::update(&state.db, variant_id, input.write(&sku, &options))
        .await?
        .ok_or_else(|| AppError::not_found(format!("Variant {variant_id} not found")))?;
    tracing::info!(
        product_id = %id,
        variant_id = %variant_id,
        admin_id = %admin.id,
        stock_before = previous_stock,
        stock_after = row.stock,
        "variant updated"
    );
    Ok(Json(row))
}

/// DELETE /api/v1/admin/products/:id/variants/:variant_id
async fn delete_variant(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((id, variant_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    product_variant(&state, id, variant_id).await?;
    variants::delete(&state.db, variant_id).await?;
    tracing::info!(product_id = %id, variant_id = %variant_id, "variant deleted");
    Ok(StatusCode::NO_CONTENT)
}
