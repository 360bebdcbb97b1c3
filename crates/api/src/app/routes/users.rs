use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::{get, put},
};

use bakery_auth::Permission;
use bakery_core::UserId;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", put(update_user).delete(deactivate_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::USERS_MANAGE)?;
    Ok(dto::items(services.services.list_users().await?))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<dto::CreateUserRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let user = services.services.create_user(body.into_new_user()?).await?;
    Ok(dto::created(user))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::UpdateUserRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let id: UserId = dto::parse(&id)?;
    let user = services.services.update_user(id, body.into_update()?).await?;
    Ok(Json(user).into_response())
}

/// Soft delete: the account becomes `inactive`.
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let id: UserId = dto::parse(&id)?;
    services.services.deactivate_user(principal.principal(), id).await?;
    Ok(dto::message("user deactivated"))
}
