//! Per-client admission middleware
//!
//! Every request passing through [`admission_middleware`] is keyed by the
//! client address and checked against the shared [`AdmissionController`].
//! Denied requests are answered with `429 Too Many Requests` before the
//! inner handler runs.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use turnstile::AdmissionController;

/// Key used when no client address can be determined
pub const UNKNOWN_CLIENT_KEY: &str = "";

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,
}

/// State shared by the middleware and the handlers
#[derive(Clone)]
pub struct AdmissionState {
    pub controller: AdmissionController,
    /// Prefer the first X-Forwarded-For address over the peer address
    pub trust_forwarded_for: bool,
}

impl AdmissionState {
    pub fn new(controller: AdmissionController, trust_forwarded_for: bool) -> Self {
        Self {
            controller,
            trust_forwarded_for,
        }
    }
}

/// Extracts the admission key for a request.
///
/// The key is the client IP without its port. Behind a reverse proxy the
/// first X-Forwarded-For entry is used instead, but only when trusted.
pub fn client_key(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for
        && let Some(xff) = req.headers().get("x-forwarded-for")
        && let Ok(s) = xff.to_str()
        && let Some(first) = s.split(',').next()
        && let Ok(ip) = first.trim().parse::<IpAddr>()
    {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT_KEY.to_string())
}

/// Admission middleware. Returns 429 when the client is over its limit.
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req, state.trust_forwarded_for);

    if !state.controller.allow(&key) {
        tracing::debug!(client = %key, path = %req.uri().path(), "Request rejected");
        return too_many_requests();
    }

    next.run(req).await
}

pub(crate) fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(HttpErrorResponse {
            error: "Too many requests".to_string(),
        }),
    )
        .into_response()
}
