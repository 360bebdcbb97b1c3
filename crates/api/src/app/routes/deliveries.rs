use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, FromRequest, Multipart, Path, Query, Request},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use uuid::Uuid;

use bakery_auth::Permission;
use bakery_core::DeliveryId;
use bakery_delivery::DeliveryStatus;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::{self, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_dispatch))
        .route("/assign", post(assign))
        .route("/available", get(available))
        .route("/claim", post(claim))
        .route("/mine", get(mine))
        .route(
            "/:id/status",
            put(update_status).layer(DefaultBodyLimit::max(EVIDENCE_MAX_BYTES)),
        )
}

const EVIDENCE_MAX_BYTES: usize = 10 * 1024 * 1024;

pub async fn list_dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Query(query): Query<dto::DispatchQuery>,
) -> ApiResult<Response> {
    require(&principal, &Permission::DELIVERIES_READ_ALL)?;
    Ok(dto::items(services.services.list_dispatch(query.from, query.to).await?))
}

pub async fn assign(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<dto::AssignDeliveryRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::DELIVERIES_ASSIGN)?;
    let delivery = services.services.assign_delivery(body.order_id, body.driver_id).await?;
    Ok(Json(delivery).into_response())
}

pub async fn available(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::DELIVERIES_DRIVE)?;
    Ok(dto::items(services.services.available_deliveries().await?))
}

pub async fn mine(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> ApiResult<Response> {
    require(&principal, &Permission::DELIVERIES_DRIVE)?;
    Ok(dto::items(services.services.my_deliveries(principal.principal()).await?))
}

/// First driver wins; a delivery that is already taken answers 409.
pub async fn claim(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    JsonBody(body): JsonBody<dto::ClaimDeliveryRequest>,
) -> ApiResult<Response> {
    require(&principal, &Permission::DELIVERIES_DRIVE)?;
    let id: DeliveryId = dto::parse(&body.delivery_id)?;
    let delivery = services.services.claim_delivery(principal.principal(), id).await?;
    Ok(Json(delivery).into_response())
}

/// Photo received with a status change, held in memory until the change is
/// known to be a delivery.
struct Evidence {
    bytes: axum::body::Bytes,
    extension: String,
}

/// Accepts `{"status": ...}` as JSON, or a multipart form with a `status`
/// field and an optional `evidence` photo.
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    req: Request,
) -> Response {
    if let Err(e) = require(&principal, &Permission::DELIVERIES_DRIVE) {
        return ApiError::from(e).into_response();
    }
    let (status, evidence) = match read_status_body(req).await {
        Ok(body) => body,
        Err(rejection) => return rejection,
    };
    apply_status(&services, &principal, &id, &status, evidence)
        .await
        .unwrap_or_else(|rejection| rejection)
}

/// The photo is written only for `delivered`, and removed again when the
/// update is rejected.
async fn apply_status(
    services: &AppServices,
    principal: &PrincipalContext,
    id: &str,
    status: &str,
    evidence: Option<Evidence>,
) -> Result<Response, Response> {
    let id: DeliveryId = dto::parse(id).map_err(|e| ApiError::from(e).into_response())?;
    let status: DeliveryStatus = dto::parse(status).map_err(|e| ApiError::from(e).into_response())?;

    let stored = match evidence {
        Some(evidence) if status == DeliveryStatus::Delivered => Some(store_evidence(services, evidence).await?),
        _ => None,
    };
    let evidence_url = stored.as_ref().map(|(_, url)| url.clone());

    match services
        .services
        .update_delivery_status(principal.principal(), id, status, evidence_url)
        .await
    {
        Ok(delivery) => {
            // A repeated `delivered` is a no-op that keeps the first photo.
            if let Some((path, url)) = stored {
                if delivery.evidence_url.as_deref() != Some(url.as_str()) {
                    discard_evidence(&path).await;
                }
            }
            Ok(Json(delivery).into_response())
        }
        Err(err) => {
            if let Some((path, _)) = stored {
                discard_evidence(&path).await;
            }
            Err(ApiError::from(err).into_response())
        }
    }
}

async fn discard_evidence(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(error = %e, path = %path.display(), "failed to remove unused evidence");
    }
}

async fn store_evidence(services: &AppServices, evidence: Evidence) -> Result<(PathBuf, String), Response> {
    let file_name = format!("evidence-{}.{}", Uuid::now_v7(), evidence.extension);
    let path = services.upload_dir().join(&file_name);
    tokio::fs::write(&path, &evidence.bytes).await.map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "failed to store evidence");
        errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upload_error",
            "could not store evidence photo",
        )
    })?;
    Ok((path, format!("uploads/{file_name}")))
}

async fn read_status_body(req: Request) -> Result<(String, Option<Evidence>), Response> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let JsonBody(body) = JsonBody::<dto::StatusRequest>::from_request(req, &()).await?;
        return Ok((body.status, None));
    }

    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| invalid_body(e.body_text()))?;
    let mut status = None;
    let mut evidence = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| invalid_body(e.body_text()))? {
        match field.name() {
            Some("status") => {
                status = Some(field.text().await.map_err(|e| invalid_body(e.body_text()))?);
            }
            Some("evidence") => {
                let extension = extension(field.file_name());
                let bytes = field.bytes().await.map_err(|e| invalid_body(e.body_text()))?;
                if !bytes.is_empty() {
                    evidence = Some(Evidence { bytes, extension });
                }
            }
            _ => {}
        }
    }

    let status = status.ok_or_else(|| invalid_body("status is required".to_string()))?;
    Ok((status, evidence))
}

/// Lowercase alphanumeric extension of the uploaded file name, `jpg` otherwise.
fn extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string())
}

fn invalid_body(message: String) -> Response {
    errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", message)
}
