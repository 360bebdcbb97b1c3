use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};

use bakery_auth::Permission;
use bakery_core::ProductionOrderId;
use bakery_production::{NewProductionOrder, ProductionStatus};

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", delete(delete_order))
        .route("/:id/status", put(change_status))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTION_READ)?;
    Ok(dto::items(services.services.list_production_orders().await?))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<NewProductionOrder>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTION_WRITE)?;
    Ok(dto::created(services.services.create_production_order(body).await?))
}

/// Finishing an order stocks the showcase and backflushes the recipe.
pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::StatusRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTION_WRITE)?;
    let id: ProductionOrderId = dto::parse(&id)?;
    let status: ProductionStatus = dto::parse(&body.status)?;
    let order = services
        .services
        .change_production_status(principal.principal(), id, status)
        .await?;
    Ok(Json(order).into_response())
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PRODUCTION_DELETE)?;
    let id: ProductionOrderId = dto::parse(&id)?;
    services.services.delete_production_order(id).await?;
    Ok(dto::message("production order deleted"))
}
