use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use bakery_auth::Permission;
use bakery_core::OrderId;
use bakery_infra::services::PlaceOrder;
use bakery_sales::OrderStatus;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/mine", get(my_orders))
        .route("/:id/status", put(update_status))
        .route("/:id/payments/confirm", post(confirm_payment))
}

/// Acting for another customer or pre-assigning a driver is checked by the
/// service against the caller's role.
pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<PlaceOrder>,
) -> ApiResult<Response> {
    require(&principal, &Permission::ORDERS_PLACE)?;
    let order = services.services.place_order(principal.principal(), body).await?;
    Ok(dto::created(order))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::ORDERS_READ_ALL)?;
    Ok(dto::items(services.services.list_orders().await?))
}

pub async fn my_orders(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::ORDERS_READ_OWN)?;
    Ok(dto::items(services.services.list_my_orders(principal.principal()).await?))
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::StatusRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::ORDERS_UPDATE_STATUS)?;
    let id: OrderId = dto::parse(&id)?;
    let status: OrderStatus = dto::parse(&body.status)?;
    Ok(Json(services.services.update_order_status(id, status).await?).into_response())
}

pub async fn confirm_payment(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::PAYMENTS_CONFIRM)?;
    let id: OrderId = dto::parse(&id)?;
    Ok(Json(services.services.confirm_payment(id).await?).into_response())
}
