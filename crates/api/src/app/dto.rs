use std::str::FromStr;

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use bakery_auth::{NewUser, Role, UserStatus, UserUpdate};
use bakery_core::{DomainError, IngredientId, OrderId, UserId};

use crate::app::errors::{self, ApiError};

// -------------------------
// Extraction helpers
// -------------------------

/// `Json<T>` whose rejections use the API error body (400 `invalid_body`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                rejection.body_text(),
            )),
        }
    }
}

/// Parse a path or body string into an id or enum, as a 400 on failure.
pub fn parse<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

/// List responses are wrapped as `{"items": [...]}`.
pub fn items<T: Serialize>(items: Vec<T>) -> Response {
    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

pub fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn message(text: &str) -> Response {
    (StatusCode::OK, Json(json!({ "message": text }))).into_response()
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub default_address: Option<String>,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> Result<NewUser, ApiError> {
        let role: Role = parse(&self.role)?;
        Ok(NewUser {
            full_name: self.full_name,
            email: self.email,
            password: self.password,
            role,
            phone: self.phone,
            default_address: self.default_address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub default_address: Option<String>,
}

impl UpdateUserRequest {
    pub fn into_update(self) -> Result<UserUpdate, ApiError> {
        let role = self.role.as_deref().map(parse::<Role>).transpose()?;
        let status = self.status.as_deref().map(parse::<UserStatus>).transpose()?;
        Ok(UserUpdate {
            full_name: self.full_name,
            role,
            phone: self.phone,
            status,
            default_address: self.default_address,
        })
    }
}

/// Body of every `/:id/status` endpoint. Parsed per resource.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignDeliveryRequest {
    pub order_id: OrderId,
    pub driver_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ClaimDeliveryRequest {
    pub delivery_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DispatchQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub ingredient_id: Option<IngredientId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_core::OrderId;

    #[test]
    fn parse_maps_bad_ids_to_domain_errors() {
        assert!(parse::<OrderId>("not-a-uuid").is_err());
        let id = OrderId::new();
        assert_eq!(parse::<OrderId>(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn create_user_request_rejects_unknown_roles() {
        let req = CreateUserRequest {
            full_name: "Ana".into(),
            email: "ana@example.com".into(),
            password: "secret1".into(),
            role: "owner".into(),
            phone: None,
            default_address: None,
        };
        assert!(req.into_new_user().is_err());
    }

    #[test]
    fn update_user_request_parses_optional_enums() {
        let req = UpdateUserRequest {
            full_name: None,
            role: Some("driver".into()),
            phone: None,
            status: Some("suspended".into()),
            default_address: None,
        };
        let update = req.into_update().unwrap();
        assert_eq!(update.role, Some(Role::Driver));
        assert_eq!(update.status, Some(UserStatus::Suspended));
    }
}
