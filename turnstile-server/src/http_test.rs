use crate::http::{AdmitResponse, router};
use crate::middleware::{AdmissionState, HttpErrorResponse};
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceExt;
use turnstile::{AdmissionController, ManualClock, Policy};

fn app(policy: Policy, trust_forwarded_for: bool) -> Router {
    let controller = AdmissionController::builder(policy).build().unwrap();
    router(AdmissionState::new(controller, trust_forwarded_for))
}

fn get_from(uri: &str, peer: &str) -> Request {
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    req
}

async fn send(app: &Router, req: Request) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

fn json<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = app(Policy::token_bucket(1, 0.0).unwrap(), false);

    for _ in 0..5 {
        let (status, body) = send(&app, get_from("/health", "192.0.2.7:4000")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"OK");
    }
}

#[tokio::test]
async fn test_admit_keys_by_client_ip() {
    let app = app(Policy::token_bucket(1, 0.0).unwrap(), false);

    let (status, body) = send(&app, get_from("/admit", "192.0.2.7:4000")).await;
    assert_eq!(status, StatusCode::OK);
    let admitted: AdmitResponse = json(&body);
    assert_eq!(admitted.key, "192.0.2.7");
    assert!(admitted.allowed);

    // Same IP from another port shares the limit
    let (status, body) = send(&app, get_from("/admit", "192.0.2.7:4001")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let error: HttpErrorResponse = json(&body);
    assert_eq!(error.error, "Too many requests");

    // Other clients are unaffected
    let (status, _) = send(&app, get_from("/admit", "192.0.2.8:4000")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_clients_share_one_key() {
    let app = app(Policy::token_bucket(1, 0.0).unwrap(), false);

    let req = Request::builder().uri("/admit").body(Body::empty()).unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<AdmitResponse>(&body).key, "");

    let req = Request::builder().uri("/admit").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_for_when_trusted() {
    let app = app(Policy::token_bucket(1, 0.0).unwrap(), true);

    for client in ["203.0.113.1", "203.0.113.2"] {
        let mut req = get_from("/admit", "10.0.0.1:9000");
        req.headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json::<AdmitResponse>(&body).key, client);
    }

    let mut req = get_from("/admit", "10.0.0.1:9000");
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.1".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_admit_explicit_key() {
    let app = app(Policy::token_bucket(2, 0.0).unwrap(), false);

    for expected in [true, true, false] {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/admit/user:123")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        let response: AdmitResponse = json(&body);
        assert_eq!(response.key, "user:123");
        assert_eq!(response.allowed, expected);
        let expected_status = if expected {
            StatusCode::OK
        } else {
            StatusCode::TOO_MANY_REQUESTS
        };
        assert_eq!(status, expected_status);
    }

    let (status, _) = send(&app, get_from("/admit/user:456", "192.0.2.7:4000")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_stats_reports_decisions() {
    let app = app(Policy::token_bucket(1, 0.0).unwrap(), false);

    send(&app, get_from("/admit", "192.0.2.7:4000")).await;
    send(&app, get_from("/admit", "192.0.2.7:4000")).await;
    send(&app, get_from("/admit", "192.0.2.8:4000")).await;

    let (status, body) = send(&app, get_from("/stats", "192.0.2.7:4000")).await;
    assert_eq!(status, StatusCode::OK);
    let stats: serde_json::Value = json(&body);
    assert_eq!(stats["allowed"], 2);
    assert_eq!(stats["denied"], 1);
    assert_eq!(stats["created"], 2);
    assert_eq!(stats["active_keys"], 2);
}

#[tokio::test]
async fn test_fixed_window_resets_over_http() {
    let clock = ManualClock::new();
    let controller =
        AdmissionController::builder(Policy::fixed_window(2, Duration::from_secs(1)).unwrap())
            .clock(clock.clone())
            .build()
            .unwrap();
    let app = router(AdmissionState::new(controller, false));

    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(send(&app, get_from("/admit", "192.0.2.7:4000")).await.0);
    }
    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );

    clock.advance(Duration::from_secs(1));
    let (status, _) = send(&app, get_from("/admit", "192.0.2.7:4000")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = app(Policy::token_bucket(1, 0.0).unwrap(), false);
    let (status, _) = send(&app, get_from("/throttle", "192.0.2.7:4000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
