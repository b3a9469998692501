//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::AppState;

/// Browsers cannot set headers on a WebSocket upgrade, so the credential may
/// also arrive as `?token=`.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Middleware that resolves the request's credential to an `Identity`.
///
/// If valid, inserts the identity into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the credential
    let credential = credential_from(req.headers(), &query).ok_or_else(|| {
        debug!("Request carried no credential.");
        StatusCode::UNAUTHORIZED
    })?;

    // 2. Resolve it to an identity
    let identity = state
        .identity
        .resolve(&credential)
        .await
        .map_err(|e| {
            error!("Failed to resolve credential: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Insert the identity into request extensions
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Picks the credential from `Authorization: Bearer|Token <value>`, falling
/// back to the `token` query parameter.
pub fn credential_from(headers: &HeaderMap, query: &TokenQuery) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("Token "))
        })
        .map(str::trim)
        .filter(|v| !v.is_empty());

    from_header
        .map(str::to_string)
        .or_else(|| {
            query
                .token
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}
