use std::net::SocketAddr;

use axum::{
    Router,
    body::{Body, to_bytes},
    routing,
    extract::ConnectInfo,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::api::v1::extractors::Confirmed;
use crate::app::build_router;
use crate::middleware::auth::access;
use crate::config::Config;
use crate::services::auth::Role;
use crate::services::rate_limit::RateLimitPolicy;
use crate::test_support::{SECRET, TestApp, bearer, cookie, session_token, token_expired};

fn config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/gatekeeper".to_string()),
        "SESSION_JWT_SECRET" => Some(String::from_utf8(SECRET.to_vec()).expect("utf8")),
        _ => None,
    })
    .expect("test config")
}

fn app(test: &TestApp) -> Router {
    build_router(test.state.clone(), &config())
}

fn get(uri: &str, headers: HeaderMap) -> Request<Body> {
    let mut req = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    *req.headers_mut() = headers;
    req
}

fn from_peer(mut req: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().expect("socket addr");
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let res = app.clone().oneshot(req).await.expect("infallible");
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn error_body(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

#[tokio::test]
async fn health_is_public_and_carries_security_headers() {
    let test = TestApp::new();
    let (status, headers, body) = send(&app(&test), get("/api/v1/health", HeaderMap::new())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn missing_credential_is_401_and_leaves_counters_alone() {
    let test = TestApp::new();
    let app = app(&test);

    for uri in ["/api/v1/me", "/api/v1/admin/me"] {
        let (status, _, body) = send(&app, get(uri, HeaderMap::new())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, error_body("Authentication required. Please log in."));
    }
    assert!(test.counters.is_empty());
    assert_eq!(test.principals.lookups(), 0);
}

#[tokio::test]
async fn unknown_route_is_404_not_401() {
    let test = TestApp::new();
    let (status, _, _) = send(&app(&test), get("/api/v1/admin/nope", HeaderMap::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banning_an_admin_takes_effect_on_the_next_request() {
    let test = TestApp::new();
    let app = app(&test);
    let id = test.principals.insert("root@example.com", Role::Admin, false);
    let headers = bearer(&session_token(&id.to_string()));

    let (status, _, body) = send(&app, get("/api/v1/admin/me", headers.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], json!(id));
    assert_eq!(body["user"]["role"], json!("Admin"));

    test.principals.set_banned(id, true);

    let (status, _, body) = send(&app, get("/api/v1/admin/me", headers)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, error_body("Access denied. Account has been banned."));
}

#[tokio::test]
async fn demoted_admin_loses_access_immediately() {
    let test = TestApp::new();
    let app = app(&test);
    let id = test.principals.insert("root@example.com", Role::Admin, false);
    let headers = bearer(&session_token(&id.to_string()));

    assert_eq!(send(&app, get("/api/v1/admin/me", headers.clone())).await.0, StatusCode::OK);
    test.principals.set_role(id, Role::User);
    assert_eq!(
        send(&app, get("/api/v1/admin/me", headers)).await.0,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn regular_user_passes_general_gate_only() {
    let test = TestApp::new();
    let app = app(&test);
    let id = test.principals.insert("user@example.com", Role::User, false);
    let headers = bearer(&session_token(&id.to_string()));

    let (status, _, body) = send(&app, get("/api/v1/admin/me", headers.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, error_body("Access denied. Admin privileges required."));

    let (status, _, body) = send(&app, get("/api/v1/me", headers)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["userId"], json!(id.to_string()));
}

#[tokio::test]
async fn cookie_identity_wins_over_bearer_identity() {
    let test = TestApp::new();
    let app = app(&test);
    let a = test.principals.insert("a@example.com", Role::User, false);
    let b = test.principals.insert("b@example.com", Role::Admin, false);

    let mut headers = cookie(&session_token(&a.to_string()));
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", session_token(&b.to_string())))
            .expect("header"),
    );

    let (_, _, body) = send(&app, get("/api/v1/me", headers.clone())).await;
    assert_eq!(body["userId"], json!(a.to_string()));

    // B is an admin; A is not. The admin gate must see A.
    let (status, _, _) = send(&app, get("/api/v1/admin/me", headers)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_and_corrupted_tokens_get_different_messages() {
    let test = TestApp::new();
    let app = app(&test);
    let id = test.principals.insert("a@example.com", Role::Admin, false);

    let (status, _, body) = send(&app, get("/api/v1/me", bearer(&token_expired(&id.to_string())))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_body("Session expired. Please log in again."));

    let token = session_token(&id.to_string());
    let (signed, signature) = token.rsplit_once('.').expect("jws");
    let swapped = if signature.starts_with('A') { 'B' } else { 'A' };
    let corrupted = format!("{signed}.{swapped}{}", &signature[1..]);

    let (status, _, body) = send(&app, get("/api/v1/me", bearer(&corrupted))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_body("Invalid authentication token."));

    let (status, _, _) = send(&app, get("/api/v1/admin/me", bearer(&corrupted))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_authorization_header_is_400_under_both_gates() {
    let test = TestApp::new();
    let app = app(&test);
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));

    for uri in ["/api/v1/me", "/api/v1/admin/me"] {
        let (status, _, body) = send(&app, get(uri, headers.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            error_body("Malformed authorization header. Expected Bearer token.")
        );
    }
}

#[tokio::test]
async fn deleted_user_is_401_user_not_found() {
    let test = TestApp::new();
    let headers = bearer(&session_token(&Uuid::new_v4().to_string()));

    let (status, _, body) = send(&app(&test), get("/api/v1/me", headers)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_body("Invalid token. User not found."));
}

#[tokio::test]
async fn handler_asking_for_confirmed_tier_behind_general_gate_gets_401() {
    let test = TestApp::new();
    let id = test.principals.insert("a@example.com", Role::Admin, false);

    let router = Router::new().route(
        "/needs-admin",
        routing::get(|Confirmed(principal): Confirmed| async move { principal.email }),
    );
    let router = access::require_user(router, test.state.clone()).with_state(test.state.clone());

    let (status, _, body) = send(
        &router,
        get("/needs-admin", bearer(&session_token(&id.to_string()))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, error_body("Authentication required. Please log in."));
}

#[tokio::test]
async fn admin_user_lookup_is_rate_limited_per_client() {
    let test = TestApp::new();
    let app = app(&test);
    let admin = test.principals.insert("root@example.com", Role::Admin, false);
    let target = test.principals.insert("user@example.com", Role::User, false);
    let headers = bearer(&session_token(&admin.to_string()));
    let uri = format!("/api/v1/admin/users/{target}");
    let policy = &RateLimitPolicy::SENSITIVE_DATA;

    for n in 1..=policy.max_attempts {
        let (status, res_headers, _) =
            send(&app, from_peer(get(&uri, headers.clone()), "203.0.113.7:5000")).await;
        assert_eq!(status, StatusCode::OK, "request {n}");
        assert_eq!(res_headers["ratelimit-remaining"], (policy.max_attempts - n).to_string());
    }

    let (status, res_headers, body) =
        send(&app, from_peer(get(&uri, headers.clone()), "203.0.113.7:5001")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, error_body(policy.message));
    assert_eq!(res_headers[header::RETRY_AFTER], "900");
    assert_eq!(res_headers["ratelimit-limit"], "100");

    // Another client is unaffected.
    let (status, _, _) = send(&app, from_peer(get(&uri, headers.clone()), "198.51.100.1:5000")).await;
    assert_eq!(status, StatusCode::OK);

    test.clock.advance(policy.window);
    let (status, _, _) = send(&app, from_peer(get(&uri, headers), "203.0.113.7:5002")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn limiter_counts_regardless_of_auth_outcome() {
    let test = TestApp::new();
    let app = app(&test);
    let admin = test.principals.insert("root@example.com", Role::Admin, false);
    let uri = format!("/api/v1/admin/users/{admin}");

    let (status, headers, _) =
        send(&app, from_peer(get(&uri, HeaderMap::new()), "203.0.113.7:1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers["ratelimit-remaining"], "99");

    let (status, headers, _) = send(
        &app,
        from_peer(get(&uri, bearer(&session_token(&admin.to_string()))), "203.0.113.7:2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["ratelimit-remaining"], "98");
}

#[tokio::test]
async fn admin_lookup_of_missing_user_is_404() {
    let test = TestApp::new();
    let admin = test.principals.insert("root@example.com", Role::Admin, false);
    let uri = format!("/api/v1/admin/users/{}", Uuid::new_v4());

    let (status, _, body) = send(
        &app(&test),
        get(&uri, bearer(&session_token(&admin.to_string()))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, error_body("User not found."));
}

#[tokio::test]
async fn admin_lookup_with_non_uuid_id_is_a_json_400() {
    let test = TestApp::new();
    let admin = test.principals.insert("root@example.com", Role::Admin, false);

    let (status, _, body) = send(
        &app(&test),
        get("/api/v1/admin/users/not-a-uuid", bearer(&session_token(&admin.to_string()))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, error_body("Invalid user id."));
}
