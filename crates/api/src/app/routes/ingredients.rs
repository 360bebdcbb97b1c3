use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::{IntoResponse, Response},
    routing::{get, put},
};

use bakery_auth::Permission;
use bakery_core::IngredientId;
use bakery_inventory::IngredientDraft;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_ingredients).post(create_ingredient))
        .route("/movements", get(list_movements))
        .route("/:id", put(update_ingredient).delete(delete_ingredient))
        .route("/:id/movements", get(ingredient_movements))
}

pub async fn list_ingredients(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::INVENTORY_READ)?;
    Ok(dto::items(services.services.list_ingredients().await?))
}

pub async fn create_ingredient(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<IngredientDraft>,
) -> ApiResult<Response> {
    require(&principal, &Permission::INVENTORY_WRITE)?;
    let ingredient = services.services.create_ingredient(principal.principal(), body).await?;
    Ok(dto::created(ingredient))
}

pub async fn update_ingredient(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<IngredientDraft>,
) -> ApiResult<Response> {
    require(&principal, &Permission::INVENTORY_WRITE)?;
    let id: IngredientId = dto::parse(&id)?;
    let ingredient = services
        .services
        .update_ingredient(principal.principal(), id, body)
        .await?;
    Ok(Json(ingredient).into_response())
}

pub async fn delete_ingredient(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::INVENTORY_DELETE)?;
    let id: IngredientId = dto::parse(&id)?;
    services.services.delete_ingredient(id).await?;
    Ok(dto::message("ingredient deleted"))
}

/// Whole kardex, optionally narrowed with `?ingredient_id=`.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Query(query): Query<dto::MovementsQuery>,
) -> ApiResult<Response> {
    require(&principal, &Permission::INVENTORY_READ)?;
    Ok(dto::items(services.services.list_movements(query.ingredient_id).await?))
}

pub async fn ingredient_movements(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::INVENTORY_READ)?;
    let id: IngredientId = dto::parse(&id)?;
    Ok(dto::items(services.services.list_movements(Some(id)).await?))
}
