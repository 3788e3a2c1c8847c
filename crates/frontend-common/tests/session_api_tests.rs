//! Session, interceptor and retry behavior against a mock API server

use campus_core::{AuthError, Role};
use campus_frontend_common::config::ApiConfig;
use campus_frontend_common::{
    AppContext, CampusConfig, MemoryTokenStore, RouteDecision, SessionStatus, TokenStore,
};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn context(server: &MockServer) -> (AppContext, Arc<MemoryTokenStore>) {
    let config = CampusConfig {
        api: ApiConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        },
        ..CampusConfig::default()
    };
    let store = Arc::new(MemoryTokenStore::new());
    let context = AppContext::new(config, store.clone()).unwrap();
    context.session.restore();
    (context, store)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "student1", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "A1",
            "refresh": "R1",
            "user": {
                "id": 7,
                "username": "student1",
                "email": "student1@example.edu",
                "role": "student"
            }
        })))
        .mount(server)
        .await;
}

fn authorization_headers(requests: &[wiremock::Request], route: &str) -> Vec<Option<String>> {
    requests
        .iter()
        .filter(|r| r.url.path() == route)
        .map(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "title": "Rust"}])))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _) = context(&server).await;
    let user = ctx.session.login("student1", "secret").await.unwrap().unwrap();
    assert_eq!(user.role, Role::Student);
    assert_eq!(user.id, "7");

    let courses: Value = ctx.api.get_json("/courses").await.unwrap();
    assert_eq!(courses[0]["title"], "Rust");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A2"})))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, store) = context(&server).await;
    ctx.session.login("student1", "secret").await.unwrap();

    let courses: Value = ctx.api.get_json("/courses").await.unwrap();
    assert_eq!(courses, json!([]));
    assert_eq!(ctx.session.access_token().as_deref(), Some("A2"));
    assert_eq!(
        store.load(campus_frontend_common::StorageKey::AccessToken).as_deref(),
        Some("A2")
    );
}

#[tokio::test]
async fn test_rejected_refresh_after_401_ends_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, store) = context(&server).await;
    ctx.session.login("student1", "secret").await.unwrap();

    let err = ctx.api.get_json("/dashboard").await.unwrap_err();
    assert!(err.is_auth_expired());

    assert_eq!(ctx.session.status(), SessionStatus::Unauthenticated);
    assert!(store.is_empty());
    assert_eq!(
        ctx.guard.decide(&ctx.session.snapshot(), "/dashboard"),
        RouteDecision::RedirectToLogin
    );
}

#[tokio::test]
async fn test_no_header_after_logout() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (ctx, store) = context(&server).await;
    ctx.session.login("student1", "secret").await.unwrap();
    ctx.api.get_json("/courses").await.unwrap();

    // A failing server-side logout does not keep the session alive
    ctx.session.logout().await;
    assert!(store.is_empty());
    ctx.api.get_json("/courses").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        authorization_headers(&requests, "/courses"),
        vec![Some("Bearer A1".to_string()), None]
    );
}

#[tokio::test]
async fn test_login_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "No active account found"})),
        )
        .mount(&server)
        .await;

    let (ctx, store) = context(&server).await;
    let err = ctx.session.login("student1", "nope").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials { .. }));
    assert!(!ctx.session.is_authenticated());
    assert!(store.is_empty());
}
