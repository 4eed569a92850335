//! HTTP front end for the admission controller
//!
//! # API Endpoints
//!
//! ## GET /admit
//!
//! Admission check keyed by the caller's IP address. Passes through
//! [`admission_middleware`], so a denied caller gets `429` and the handler
//! never runs.
//!
//! ```json
//! { "key": "192.0.2.7", "allowed": true }
//! ```
//!
//! ## GET|POST /admit/{key}
//!
//! Admission check for an explicit key, for callers that act as a
//! gateway for their own clients. Returns `200` when admitted and `429`
//! with `"allowed": false` when denied.
//!
//! ## GET /stats
//!
//! Admission counters as JSON. Not rate limited.
//!
//! ## GET /health
//!
//! Health check endpoint. Returns "OK" with 200 status. Not rate limited.

use crate::middleware::{AdmissionState, admission_middleware, client_key};
use anyhow::{Context, Result, anyhow};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::{Router, middleware};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use turnstile::AdmissionStats;

/// Outcome of an admission check
#[derive(Debug, Serialize, Deserialize)]
pub struct AdmitResponse {
    /// Key the decision was made for
    pub key: String,
    pub allowed: bool,
}

/// Build the application router
pub fn router(state: AdmissionState) -> Router {
    let gated = Router::new()
        .route("/admit", get(handle_admit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/stats", get(handle_stats))
        .route(
            "/admit/{key}",
            get(handle_admit_key).post(handle_admit_key),
        )
        .merge(gated)
        .with_state(state)
}

/// HTTP server bound to a single address
pub struct HttpServer {
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow!("Invalid address {host}:{port}: {e}"))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn serve<F>(self, state: AdmissionState, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        serve_listener(listener, state, shutdown).await
    }
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// Peer addresses are attached to every request so the middleware can key
/// by client IP.
pub async fn serve_listener<F>(
    listener: TcpListener,
    state: AdmissionState,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    tracing::info!(%addr, "HTTP server stopped");
    Ok(())
}

async fn handle_admit(State(state): State<AdmissionState>, req: Request) -> Json<AdmitResponse> {
    // Only reached when the middleware admitted the request
    Json(AdmitResponse {
        key: client_key(&req, state.trust_forwarded_for),
        allowed: true,
    })
}

async fn handle_admit_key(
    State(state): State<AdmissionState>,
    Path(key): Path<String>,
) -> (StatusCode, Json<AdmitResponse>) {
    let allowed = state.controller.allow(&key);
    let status = if allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };
    (status, Json(AdmitResponse { key, allowed }))
}

async fn handle_stats(State(state): State<AdmissionState>) -> Json<AdmissionStats> {
    Json(state.controller.stats())
}
