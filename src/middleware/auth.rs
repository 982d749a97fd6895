use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::config::AuthCheck;
use crate::handlers::ApiError;

/// Route layer guarding the metrics endpoint with the host's check.
pub async fn require_auth(State(check): State<AuthCheck>, req: Request, next: Next) -> Response {
    if check(req.headers()) {
        next.run(req).await
    } else {
        debug!(path = req.uri().path(), "metrics request rejected by auth check");
        ApiError::Unauthorized.into_response()
    }
}

/// An `AuthCheck` accepting `Authorization: Bearer <token>`.
pub fn bearer_token(token: impl Into<String>) -> AuthCheck {
    let expected = format!("Bearer {}", token.into());
    Arc::new(move |headers: &HeaderMap| {
        headers
            .get(AUTHORIZATION)
            .is_some_and(|value| value.as_bytes() == expected.as_bytes())
    })
}
