use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::get,
};

use bakery_auth::Permission;
use bakery_catalog::ProductDraft;
use bakery_core::ProductId;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

/// Catalog reads are public; writes need a token.
pub fn router() -> Router {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Response> {
    Ok(dto::items(services.services.list_categories().await?))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<dto::CreateCategoryRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::CATEGORIES_WRITE)?;
    let category = services.services.create_category(&body.name, body.image_url).await?;
    Ok(dto::created(category))
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Response> {
    Ok(dto::items(services.services.list_products().await?))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id: ProductId = dto::parse(&id)?;
    Ok(Json(services.services.get_product(id).await?).into_response())
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<ProductDraft>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTS_WRITE)?;
    Ok(dto::created(services.services.create_product(body).await?))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ProductDraft>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTS_WRITE)?;
    let id: ProductId = dto::parse(&id)?;
    Ok(Json(services.services.update_product(id, body).await?).into_response())
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTS_WRITE)?;
    let id: ProductId = dto::parse(&id)?;
    services.services.delete_product(id).await?;
    Ok(dto::message("product deleted"))
}
