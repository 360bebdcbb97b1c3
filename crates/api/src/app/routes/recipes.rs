use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::{delete, get, post},
};

use bakery_auth::Permission;
use bakery_core::{ProductId, RecipeLineId};
use bakery_infra::services::NewRecipeLine;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/product/:id", get(get_recipe))
        .route("/", post(add_line))
        .route("/:id", delete(remove_line))
}

pub async fn get_recipe(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::RECIPES_READ)?;
    let product_id: ProductId = dto::parse(&id)?;
    Ok(dto::items(services.services.get_recipe(product_id).await?))
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<NewRecipeLine>,
) -> ApiResult<Response> {
    require(&principal, &Permission::RECIPES_WRITE)?;
    Ok(dto::created(services.services.add_recipe_line(body).await?))
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::RECIPES_WRITE)?;
    let id: RecipeLineId = dto::parse(&id)?;
    services.services.remove_recipe_line(id).await?;
    Ok(dto::message("recipe line removed"))
}
