//! Category management. Deleting a category moves its children up to its parent.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::default_translation;
use crate::auth::AdminUser;
use crate::db::categories::{self, CategoryRow, CategoryWrite};
use crate::db::Translation;
use crate::domain::value_objects::Slug;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create))
        .route("/categories/:id", put(update).delete(remove))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    pub slug: Option<String>,
    pub parent_id: Option<Uuid>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    pub translations: Vec<Translation>,
}

impl CategoryRequest {
    fn slug(&self, state: &AppState) -> AppResult<Slug> {
        let name = &default_translation(&self.translations, state.config.default_locale)?.name;
        match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => Ok(Slug::new(slug)?),
            None => Ok(Slug::from_title(name)),
        }
    }

    fn write<'a>(&'a self, slug: &'a Slug) -> CategoryWrite<'a> {
        CategoryWrite {
            slug: slug.as_str(),
            parent_id: self.parent_id,
            image_url: self.image_url.as_deref(),
            position: self.position,
            translations: &self.translations,
        }
    }
}

async fn fetch(state: &AppState, id: Uuid) -> AppResult<CategoryRow> {
    let fallback = state.config.default_locale;
    categories::find_by_id(&state.db, id, fallback, fallback)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Category {id} not found")))
}

/// POST /api/v1/admin/categories
async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryRow>)> {
    req.validate()?;
    let slug = req.slug(&state)?;
    if let Some(parent) = req.parent_id {
        let fallback = state.config.default_locale;
        if categories::find_by_id(&state.db, parent, fallback, fallback).await?.is_none() {
            return Err(AppError::validation("Parent category does not exist"));
        }
    }

    let mut tx = state.db.begin().await?;
    let id = categories::create(&mut tx, req.write(&slug)).await?;
    tx.commit().await?;
    tracing::info!(category_id = %id, slug = %slug, admin_id = %admin.id, "category created");
    Ok((StatusCode::CREATED, Json(fetch(&state, id).await?)))
}

/// PUT /api/v1/admin/categories/:id
async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryRequest>,
) -> AppResult<Json<CategoryRow>> {
    req.validate()?;
    let slug = req.slug(&state)?;
    if let Some(parent) = req.parent_id {
        if categories::is_self_or_descendant(&state.db, id, parent).await? {
            return Err(AppError::validation("A category cannot be moved under itself or its descendants"));
        }
    }

    let mut tx = state.db.begin().await?;
    if !categories::update(&mut tx, id, req.write(&slug)).await? {
        return Err(AppError::not_found(format!("Category {id} not found")));
    }
    tx.commit().await?;
    tracing::info!(category_id = %id, admin_id = %admin.id, "category updated");
    Ok(Json(fetch(&state, id).await?))
}

/// DELETE /api/v1/admin/categories/:id
///
/// Children move up to the deleted category's parent.
async fn remove(State(state): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    if !categories::delete(&mut tx, id).await? {
        return Err(AppError::not_found(format!("Category {id} not found")));
    }
    tx.commit().await?;
    tracing::info!(category_id = %id, admin_id = %admin.id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
