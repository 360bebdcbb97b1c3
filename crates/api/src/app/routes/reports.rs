use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::{IntoResponse, Response},
    routing::get,
};

use bakery_auth::Permission;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/sales", get(sales))
        .route("/top-products", get(top_products))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::REPORTS_READ)?;
    Ok(Json(services.services.dashboard_stats().await?).into_response())
}

pub async fn sales(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::REPORTS_READ)?;
    Ok(dto::items(services.services.sales_report().await?))
}

pub async fn top_products(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::REPORTS_READ)?;
    Ok(dto::items(services.services.top_products().await?))
}
