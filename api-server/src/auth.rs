//! Bearer token guard for state-changing routes.
//!
//! - Token configured: requires `Authorization: Bearer <token>`
//! - Token not configured: only loopback peers are accepted

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

/// Compares digests so the check does not leak the token length or prefix.
pub fn is_authorized(token: Option<&str>, addr: &SocketAddr, headers: &HeaderMap) -> bool {
    match token {
        Some(expected) => headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|provided| {
                Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
            }),
        None => addr.ip().is_loopback(),
    }
}

pub async fn require_api_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if is_authorized(state.api_token.as_deref(), &addr, request.headers()) {
        next.run(request).await
    } else {
        warn!(peer = %addr, path = %request.uri().path(), "Rejected unauthorized request");
        ApiError::Unauthorized.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn remote() -> SocketAddr {
        "203.0.113.7:4000".parse().unwrap()
    }

    fn local() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn no_token_allows_only_loopback() {
        let headers = HeaderMap::new();
        assert!(is_authorized(None, &local(), &headers));
        assert!(!is_authorized(None, &remote(), &headers));
    }

    #[test]
    fn token_requires_matching_bearer() {
        let mut headers = HeaderMap::new();
        assert!(!is_authorized(Some("s3cret"), &local(), &headers));

        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(!is_authorized(Some("s3cret"), &remote(), &headers));

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(is_authorized(Some("s3cret"), &remote(), &headers));
    }
}
