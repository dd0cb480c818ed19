//! Catalog search: filter normalisation and SQL generation.

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::locale::Locale;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl SortOrder {
    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id",
            Self::PriceAsc => " ORDER BY v.price_from ASC NULLS LAST, p.id",
            Self::PriceDesc => " ORDER BY v.price_from DESC NULLS LAST, p.id",
            Self::Name => " ORDER BY name ASC, p.id",
        }
    }
}

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: Option<bool>,
    pub sort: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Which product statuses a listing may return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusScope {
    ActiveOnly,
    /// Admin listings; `None` means every status.
    Exactly(Option<&'static str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: bool,
    pub sort: SortOrder,
    pub page: u32,
    pub per_page: u32,
    pub scope: StatusScope,
}

impl ProductFilter {
    pub fn from_query(query: ProductQuery, scope: StatusScope) -> Self {
        let clean = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let (mut min_price, mut max_price) = (query.min_price.filter(|p| *p >= 0), query.max_price.filter(|p| *p >= 0));
        if let (Some(lo), Some(hi)) = (min_price, max_price) {
            if lo > hi {
                (min_price, max_price) = (Some(hi), Some(lo));
            }
        }
        Self {
            q: clean(query.q),
            category: clean(query.category).map(|c| c.to_lowercase()),
            min_price,
            max_price,
            in_stock: query.in_stock.unwrap_or(false),
            sort: query.sort.unwrap_or_default(),
            page: query.page.unwrap_or(1).max(1),
            per_page: query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
            scope,
        }
    }

    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }

    /// Builds the listing query. Every row carries `total_count`, the number
    /// of matches before pagination.
    pub fn build_query(&self, locale: Locale, fallback: Locale) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.slug, p.category_id, p.status, p.images, p.created_at, \
             COALESCE(t.name, d.name, p.slug) AS name, \
             COALESCE(t.description, d.description) AS description, \
             v.price_from, v.compare_at_from, COALESCE(v.total_stock, 0) AS total_stock, \
             COUNT(*) OVER() AS total_count \
             FROM products p \
             LEFT JOIN product_translations t ON t.product_id = p.id AND t.locale = ",
        );
        qb.push_bind(locale.code());
        qb.push(" LEFT JOIN product_translations d ON d.product_id = p.id AND d.locale = ");
        qb.push_bind(fallback.code());
        qb.push(
            " LEFT JOIN LATERAL (SELECT MIN(price) AS price_from, MIN(compare_at_price) AS compare_at_from, \
             SUM(stock)::BIGINT AS total_stock FROM product_variants WHERE product_id = p.id) v ON TRUE \
             WHERE TRUE",
        );

        match self.scope {
            StatusScope::ActiveOnly => { qb.push(" AND p.status = 'active'"); }
            StatusScope::Exactly(Some(status)) => { qb.push(" AND p.status = ").push_bind(status); }
            StatusScope::Exactly(None) => {}
        }

        if let Some(q) = &self.q {
            let pattern = format!("%{}%", escape_like(q));
            qb.push(" AND (COALESCE(t.name, d.name) ILIKE ").push_bind(pattern.clone());
            qb.push(" OR COALESCE(t.description, d.description) ILIKE ").push_bind(pattern.clone());
            qb.push(" OR EXISTS (SELECT 1 FROM product_variants sv WHERE sv.product_id = p.id AND sv.sku ILIKE ")
                .push_bind(pattern)
                .push("))");
        }

        if let Some(slug) = &self.category {
            qb.push(
                " AND p.category_id IN (WITH RECURSIVE tree AS (SELECT id FROM categories WHERE slug = ",
            )
            .push_bind(slug.clone())
            .push(" UNION ALL SELECT c.id FROM categories c JOIN tree ON c.parent_id = tree.id) SELECT id FROM tree)");
        }

        if let Some(min) = self.min_price { qb.push(" AND v.price_from >= ").push_bind(min); }
        if let Some(max) = self.max_price { qb.push(" AND v.price_from <= ").push_bind(max); }
        if self.in_stock { qb.push(" AND COALESCE(v.total_stock, 0) > 0"); }

        qb.push(self.sort.order_by());
        qb.push(" LIMIT ").push_bind(i64::from(self.per_page));
        qb.push(" OFFSET ").push_bind(self.offset());
        qb
    }
}

/// Escapes `LIKE` metacharacters so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') { out.push('\\'); }
        out.push(c);
    }
    out
}
