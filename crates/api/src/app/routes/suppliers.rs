use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::{get, put},
};

use bakery_auth::Permission;
use bakery_core::SupplierId;
use bakery_inventory::SupplierDraft;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/:id", put(update_supplier).delete(delete_supplier))
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::SUPPLIERS_READ)?;
    Ok(dto::items(services.services.list_suppliers().await?))
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<SupplierDraft>,
) -> ApiResult<Response> {
    require(&principal, &Permission::SUPPLIERS_WRITE)?;
    Ok(dto::created(services.services.create_supplier(body).await?))
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<SupplierDraft>,
) -> ApiResult<Response> {
    require(&principal, &Permission::SUPPLIERS_WRITE)?;
    let id: SupplierId = dto::parse(&id)?;
    Ok(Json(services.services.update_supplier(id, body).await?).into_response())
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::SUPPLIERS_DELETE)?;
    let id: SupplierId = dto::parse(&id)?;
    services.services.delete_supplier(id).await?;
    Ok(dto::message("supplier deleted"))
}
