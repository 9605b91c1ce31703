//! Admin surface tests driven through the router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pool_core::{NoopRiskHook, PoolConfig, TranchePool};
use risk_breaker::{BreakerEngine, MemoryAudit, SystemClock};
use risk_service::{http, AppState};
use tokio::sync::RwLock;
use tower::ServiceExt; // for `oneshot`

const TOKEN: &str = "test-admin-secret";

fn state() -> AppState {
    let pool = Arc::new(RwLock::new(
        TranchePool::new(PoolConfig::default(), Box::new(NoopRiskHook)).unwrap(),
    ));
    let breaker = Arc::new(RwLock::new(BreakerEngine::new(
        MemoryAudit::default(),
        SystemClock,
    )));
    AppState::new(breaker, pool, TOKEN.to_string())
}

fn authed(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("x-operator", "ops@test");
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_needs_no_auth() {
    let app = http::router(state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_admin_calls_are_forbidden_without_state_change() {
    let app_state = state();
    let app = http::router(app_state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/drill/fire")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"trigger":"SENIOR_DRAWDOWN"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nothing happened: no incident, no audit entry.
    let breaker = app_state.breaker.read().await;
    assert!(breaker.incidents().is_empty());
    assert!(breaker.audit().entries().is_empty());
}

#[tokio::test]
async fn drill_then_acknowledge_then_resolve() {
    let app_state = state();
    let app = http::router(app_state.clone());

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/drill/fire",
            Some(serde_json::json!({ "trigger": "FIAT_CONFIRMED_NO_CHAIN_RECORD" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The drill enforces like the real trigger.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/originations/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed("GET", "/status", None))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["incidents"]["open"], 1);
    assert_eq!(status["enforcement"]["globalBlock"], true);

    let response = app
        .clone()
        .oneshot(authed("POST", "/incidents/1/acknowledge", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Second acknowledge conflicts.
    let response = app
        .clone()
        .oneshot(authed("POST", "/incidents/1/acknowledge", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/incidents/1/resolve",
            Some(serde_json::json!({ "note": "drill complete" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Gate reopens once nothing enforces.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/originations/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Three transitions, three audit entries, operator recorded.
    let response = app.oneshot(authed("GET", "/audit", None)).await.unwrap();
    let audit = body_json(response).await;
    let entries = audit["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1]["operator"], "ops@test");
}

#[tokio::test]
async fn override_validation_is_bad_request_without_audit() {
    let app_state = state();
    let app = http::router(app_state.clone());

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/overrides",
            Some(serde_json::json!({
                "trigger": "POOL_LIQUIDITY_RATIO",
                "reason": "maintenance",
                "expiresInMinutes": 10_081,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/overrides",
            Some(serde_json::json!({
                "trigger": "NOT_A_TRIGGER",
                "reason": "maintenance",
                "expiresInMinutes": 60,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let breaker = app_state.breaker.read().await;
    assert!(breaker.audit().entries().is_empty());
    assert!(breaker.overrides().is_empty());
}

#[tokio::test]
async fn override_lifecycle_over_http() {
    let app = http::router(state());

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/overrides",
            Some(serde_json::json!({
                "trigger": "PARTNER_DEFAULT_RATE_30D",
                "partnerId": 7,
                "reason": "false positive confirmed",
                "expiresInMinutes": 60,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["id"].as_u64().unwrap();

    let response = app
        .clone()
        .oneshot(authed("POST", &format!("/overrides/{id}/lift"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(authed("POST", &format!("/overrides/{id}/lift"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
