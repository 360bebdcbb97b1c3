use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use bakery_infra::services::Registration;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::LoginRequest>,
) -> ApiResult<Response> {
    let session = services.services.login(&body.email, &body.password).await?;
    Ok(Json(session).into_response())
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<Registration>,
) -> ApiResult<Response> {
    let user_id = services.services.register(body).await?;
    Ok(dto::created(json!({
        "message": "user registered",
        "user_id": user_id,
    })))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    let profile = services.services.me(principal.principal()).await?;
    Ok(Json(profile).into_response())
}
