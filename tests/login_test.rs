mod common;

use admin_auth::{
    build_router,
    models::{Account, AccountStatus, AdminTier, Role},
    store::UserStore,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tower::util::ServiceExt;

fn login_request(identifier: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from(format!(
            r#"{{"identifier": "{}", "password": "{}"}}"#,
            identifier, password
        )))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn app(state: admin_auth::AppState) -> Router {
    build_router(state).await.expect("Failed to build router")
}

#[tokio::test]
async fn login_returns_token_and_sanitized_account() {
    let h = common::harness();
    let account = common::seed_admin(
        &h.store,
        "admin@example.com",
        "correct-horse-staple",
        Some(AdminTier::Manager),
        &[("users.read", true)],
    )
    .await;

    let response = app(h.state)
        .await
        .oneshot(login_request("admin@example.com", "correct-horse-staple"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("session_token="));

    let body = body_json(response).await;
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["account"]["status"], "active");
    assert_eq!(body["account"]["role"], "admin");
    assert_eq!(body["account"]["email"], "admin@example.com");
    assert_eq!(body["account"]["login_count"], 1);

    // The projection must not leak secret or reset material.
    let raw = body.to_string();
    assert!(!raw.contains("password_hash"));
    assert!(!raw.contains("reset_token"));

    // Exactly one success event, attributed to the account.
    assert_eq!(h.sink.count_action("login_success"), 1);
    let events = h.sink.events();
    let event = events.iter().find(|e| e.action == "login_success").unwrap();
    assert_eq!(event.actor_id, Some(account.id));
}

#[tokio::test]
async fn unknown_identifier_and_wrong_password_are_indistinguishable() {
    let h = common::harness();
    common::seed_admin(&h.store, "admin@example.com", "correct-horse-staple", None, &[]).await;
    let app = app(h.state).await;

    let wrong_password = app
        .clone()
        .oneshot(login_request("admin@example.com", "wrong-password"))
        .await
        .unwrap();
    let unknown = app
        .oneshot(login_request("ghost@example.com", "whatever-password"))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    // Same status and same body shape: no identifier enumeration.
    assert_eq!(body_json(wrong_password).await, body_json(unknown).await);

    // Both attempts are still visible in the audit trail.
    assert_eq!(h.sink.count_action("login_failed"), 2);
}

#[tokio::test]
async fn identifier_matching_is_case_insensitive() {
    let h = common::harness();
    common::seed_admin(&h.store, "admin@example.com", "correct-horse-staple", None, &[]).await;

    let response = app(h.state)
        .await
        .oneshot(login_request("ADMIN@Example.COM", "correct-horse-staple"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_fields_are_a_client_error() {
    let h = common::harness();

    let response = app(h.state)
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"identifier": "admin@example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unprivileged_role_cannot_login() {
    let h = common::harness();
    let hash = admin_auth::utils::hash_password(&admin_auth::utils::Password::new(
        "correct-horse-staple",
    ))
    .unwrap()
    .into_string();
    let customer = Account::new("customer@example.com", "Customer", hash, Role::Customer, None);
    h.store.insert(&customer).await.unwrap();

    let response = app(h.state)
        .await
        .oneshot(login_request("customer@example.com", "correct-horse-staple"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.sink.count_action("login_failed"), 1);
}

#[tokio::test]
async fn suspended_account_cannot_login() {
    let h = common::harness();
    let mut account = common::seed_admin(
        &h.store,
        "admin@example.com",
        "correct-horse-staple",
        None,
        &[],
    )
    .await;
    account.status = AccountStatus::Suspended;
    h.store.upsert(account);

    let response = app(h.state)
        .await
        .oneshot(login_request("admin@example.com", "correct-horse-staple"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("suspended"));
}

#[tokio::test]
async fn pending_account_may_still_login() {
    let h = common::harness();
    let mut account = common::seed_admin(
        &h.store,
        "admin@example.com",
        "correct-horse-staple",
        None,
        &[],
    )
    .await;
    account.status = AccountStatus::Pending;
    h.store.upsert(account);

    let response = app(h.state)
        .await
        .oneshot(login_request("admin@example.com", "correct-horse-staple"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
