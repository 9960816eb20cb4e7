mod common;

use admin_auth::{
    middleware::{auth_middleware, permission_gate, tier_gate, PermissionPolicy, TierPolicy},
    models::AdminTier,
    AppState,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower::util::ServiceExt;

const SECRET: &str = "correct-horse-staple";

/// Protected route behind authentication plus a permission gate.
/// Layer order matters: the outermost layer (added last) runs first.
fn permission_app(state: AppState, policy: PermissionPolicy) -> Router {
    Router::new()
        .route("/ops/reports", get(|| async { "ok" }))
        .layer(from_fn_with_state(policy, permission_gate))
        .layer(from_fn_with_state(state, auth_middleware))
}

fn tier_app(state: AppState, policy: TierPolicy) -> Router {
    Router::new()
        .route("/ops/settings", get(|| async { "ok" }))
        .layer(from_fn_with_state(policy, tier_gate))
        .layer(from_fn_with_state(state, auth_middleware))
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn login_token(h: &common::TestHarness, identifier: &str) -> String {
    h.state
        .auth
        .login(identifier, SECRET, "203.0.113.9", None)
        .await
        .expect("seeded account should log in")
        .token
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let h = common::harness();
    let app = permission_app(h.state, PermissionPolicy::any_of(&["reports.view"]));

    let response = app
        .oneshot(Request::builder().uri("/ops/reports").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let h = common::harness();
    let app = permission_app(h.state, PermissionPolicy::any_of(&["reports.view"]));

    let response = app
        .oneshot(get_with_bearer("/ops/reports", "garbage.token.here"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn any_of_semantics_grant_on_a_single_match() {
    let h = common::harness();
    common::seed_admin(
        &h.store,
        "admin@example.com",
        SECRET,
        Some(AdminTier::Moderator),
        &[("reports.export", true)],
    )
    .await;
    let token = login_token(&h, "admin@example.com").await;

    // Required: ANY of {reports.view, reports.export}; caller holds only
    // the second one.
    let app = permission_app(
        h.state,
        PermissionPolicy::any_of(&["reports.view", "reports.export"]),
    );
    let response = app.oneshot(get_with_bearer("/ops/reports", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn holding_no_listed_permission_is_forbidden_not_unauthorized() {
    let h = common::harness();
    common::seed_admin(
        &h.store,
        "admin@example.com",
        SECRET,
        Some(AdminTier::Moderator),
        &[("users.read", true), ("reports.view", false)],
    )
    .await;
    let token = login_token(&h, "admin@example.com").await;

    let app = permission_app(
        h.state,
        PermissionPolicy::any_of(&["reports.view", "reports.export"]),
    );
    let response = app.oneshot(get_with_bearer("/ops/reports", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn super_tier_bypasses_permission_checks() {
    let h = common::harness();
    common::seed_admin(
        &h.store,
        "root@example.com",
        SECRET,
        Some(AdminTier::Super),
        &[],
    )
    .await;
    let token = login_token(&h, "root@example.com").await;

    let app = permission_app(h.state, PermissionPolicy::any_of(&["reports.view"]));
    let response = app.oneshot(get_with_bearer("/ops/reports", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tier_gate_respects_the_ordering() {
    let h = common::harness();
    common::seed_admin(
        &h.store,
        "moderator@example.com",
        SECRET,
        Some(AdminTier::Moderator),
        &[],
    )
    .await;
    common::seed_admin(
        &h.store,
        "manager@example.com",
        SECRET,
        Some(AdminTier::Manager),
        &[],
    )
    .await;
    common::seed_admin(
        &h.store,
        "root@example.com",
        SECRET,
        Some(AdminTier::Super),
        &[],
    )
    .await;

    let moderator = login_token(&h, "moderator@example.com").await;
    let manager = login_token(&h, "manager@example.com").await;
    let root = login_token(&h, "root@example.com").await;

    let app = tier_app(
        h.state,
        TierPolicy {
            minimum: AdminTier::Manager,
        },
    );

    let below = app
        .clone()
        .oneshot(get_with_bearer("/ops/settings", &moderator))
        .await
        .unwrap();
    assert_eq!(below.status(), StatusCode::FORBIDDEN);

    let at = app
        .clone()
        .oneshot(get_with_bearer("/ops/settings", &manager))
        .await
        .unwrap();
    assert_eq!(at.status(), StatusCode::OK);

    let above = app
        .oneshot(get_with_bearer("/ops/settings", &root))
        .await
        .unwrap();
    assert_eq!(above.status(), StatusCode::OK);
}

#[tokio::test]
async fn tierless_account_fails_a_tier_gate() {
    let h = common::harness();
    common::seed_admin(&h.store, "admin@example.com", SECRET, None, &[]).await;
    let token = login_token(&h, "admin@example.com").await;

    let app = tier_app(
        h.state,
        TierPolicy {
            minimum: AdminTier::Moderator,
        },
    );
    let response = app.oneshot(get_with_bearer("/ops/settings", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn authorization_header_beats_the_cookie() {
    let h = common::harness();
    common::seed_admin(
        &h.store,
        "admin@example.com",
        SECRET,
        Some(AdminTier::Super),
        &[],
    )
    .await;
    let token = login_token(&h, "admin@example.com").await;

    let app = permission_app(h.state, PermissionPolicy::any_of(&["reports.view"]));

    // Valid header, garbage cookie: header wins, request is admitted.
    let header_wins = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/ops/reports")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::COOKIE, "session_token=garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(header_wins.status(), StatusCode::OK);

    // Garbage header, valid cookie: the header still takes precedence.
    let header_still_wins = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/ops/reports")
                .header(header::AUTHORIZATION, "Bearer garbage")
                .header(header::COOKIE, format!("session_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(header_still_wins.status(), StatusCode::UNAUTHORIZED);

    // Cookie alone works.
    let cookie_only = app
        .oneshot(
            Request::builder()
                .uri("/ops/reports")
                .header(header::COOKIE, format!("session_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cookie_only.status(), StatusCode::OK);
}
