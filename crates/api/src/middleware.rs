use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use bakery_auth::{JwtValidator, Principal};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolve the caller from `Authorization: Bearer <token>` (or `?token=` for
/// EventSource clients that cannot set headers).
///
/// No credentials: the request continues anonymously and protected handlers
/// reject it with 401. Malformed header: 401. Bad or expired token: 403.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(token) = extract_token(req.headers(), req.uri())? else {
        return Ok(next.run(req).await);
    };

    let claims = state.jwt.validate(&token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        json_error(StatusCode::FORBIDDEN, "invalid_token", "invalid or expired token")
    })?;

    req.extensions_mut().insert(PrincipalContext::new(
        Principal::new(claims.sub, claims.role),
        claims.email,
    ));

    Ok(next.run(req).await)
}

fn extract_token(headers: &HeaderMap, uri: &Uri) -> Result<Option<String>, Response> {
    let malformed = || json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "malformed authorization header");

    if let Some(header) = headers.get(axum::http::header::AUTHORIZATION) {
        let header = header.to_str().map_err(|_| malformed())?;
        let token = header.strip_prefix("Bearer ").ok_or_else(malformed)?.trim();
        if token.is_empty() {
            return Err(malformed());
        }
        return Ok(Some(token.to_string()));
    }

    Ok(uri.query().and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == "token")
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.is_empty())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        let uri: Uri = "/api/stream?token=xyz".parse().unwrap();
        assert_eq!(extract_token(&headers, &uri).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn query_token_is_used_without_header() {
        let uri: Uri = "/api/stream?a=1&token=xyz".parse().unwrap();
        assert_eq!(extract_token(&HeaderMap::new(), &uri).unwrap().as_deref(), Some("xyz"));
        let bare: Uri = "/api/products".parse().unwrap();
        assert_eq!(extract_token(&HeaderMap::new(), &bare).unwrap(), None);
    }

    #[test]
    fn non_bearer_scheme_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic Zm9v"));
        let uri: Uri = "/".parse().unwrap();
        let res = extract_token(&headers, &uri).unwrap_err();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
