mod common;

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use club_service::models::Account;
use club_service::services::AccountStore;
use common::{bare, body_json, get, json_request, set_cookies, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_register_login_and_fetch_profile() {
    // 1. Setup
    let app = TestApp::new();

    // 2. Register
    let res = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "name": "Grace", "email": "Grace@Example.com", "password": "secret123" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let profile = body_json(res).await;
    assert_eq!(profile["email"], "grace@example.com");
    assert_eq!(profile["role"], "user");
    assert!(profile.get("password").is_none());
    assert!(profile.get("password_hash").is_none());

    // 3. Login with a differently cased email
    let res = app
        .send(json_request(
            Method::POST,
            "/auth/password-login",
            None,
            json!({ "email": "GRACE@example.com", "password": "secret123" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 86400);
    assert_eq!(body["user"]["email"], "grace@example.com");
    let token = body["access_token"].as_str().unwrap().to_string();

    // 4. Profile via bearer header
    let res = app.send(get("/auth/me", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let me = body_json(res).await;
    assert_eq!(me["id"], profile["id"]);
    assert_eq!(me["name"], "Grace");
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = TestApp::new();
    app.register("Grace", "grace@example.com", "secret123").await;
    let token = app.login("grace@example.com", "secret123").await;

    let res = app
        .send(
            Request::builder()
                .uri("/auth/me")
                .header(header::COOKIE, format!("access_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["email"], "grace@example.com");
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = TestApp::new();
    app.register("Grace", "grace@example.com", "secret123").await;

    let res = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "name": "Other", "email": "GRACE@EXAMPLE.COM", "password": "another1" }),
        ))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Email already registered");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("Grace", "grace@example.com", "secret123").await;

    let wrong_password = app
        .send(json_request(
            Method::POST,
            "/auth/password-login",
            None,
            json!({ "email": "grace@example.com", "password": "wrong-password" }),
        ))
        .await;
    let unknown_email = app
        .send(json_request(
            Method::POST,
            "/auth/password-login",
            None,
            json!({ "email": "nobody@example.com", "password": "secret123" }),
        ))
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
}

#[tokio::test]
async fn test_oauth_only_account_cannot_password_login() {
    let app = TestApp::new();

    // Create the account through Google sign-in
    let res = app.send(get("/auth/login", None)).await;
    let nonce = common::cookie_value(&res, "oauth_nonce").expect("nonce cookie");
    let auth_url = body_json(res).await["auth_url"].as_str().unwrap().to_string();
    let state = auth_url.split("state=").nth(1).unwrap().to_string();
    let res = app
        .send(
            Request::builder()
                .uri(format!("/auth/callback?code=abc&state={}", state))
                .header(header::COOKIE, format!("oauth_nonce={}", nonce))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .send(json_request(
            Method::POST,
            "/auth/password-login",
            None,
            json!({ "email": "ada@example.com", "password": "anything" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_validation() {
    let app = TestApp::new();

    let short_password = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "name": "Grace", "email": "grace@example.com", "password": "12345" }),
        ))
        .await;
    assert_eq!(short_password.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bad_email = app
        .send(json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "name": "Grace", "email": "not-an-email", "password": "secret123" }),
        ))
        .await;
    assert_eq!(bad_email.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let malformed = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = TestApp::new();

    let missing = app.send(get("/auth/me", None)).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        missing.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );

    let garbage = app.send(get("/auth/me", Some("not.a.token"))).await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);

    let events = app.send(get("/events", None)).await;
    assert_eq!(events.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_account_is_rejected() {
    use club_service::services::AccountStore;

    let app = TestApp::new();
    let id = app.register("Grace", "grace@example.com", "secret123").await;
    let token = app.login("grace@example.com", "secret123").await;

    app.store.delete_account(&id).await.unwrap();

    let res = app.send(get("/auth/me", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_session_cookie() {
    let app = TestApp::new();

    let res = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/logout")
                .header(header::COOKIE, "access_token=some-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("access_token=") && c.contains("Max-Age=0")));
    assert_eq!(body_json(res).await["message"], "Successfully logged out");
}

#[tokio::test]
async fn test_logout_without_session_still_succeeds() {
    let app = TestApp::new();
    let res = app.send(bare(Method::POST, "/auth/logout", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_openapi_are_public() {
    let app = TestApp::new();

    let res = app.send(get("/health", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let health = body_json(res).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], "connected");

    let res = app.send(get("/.well-known/openapi.json", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let doc = body_json(res).await;
    assert!(doc["paths"]["/auth/callback"].is_object());
    assert!(doc["paths"]["/events/{id}/approve"].is_object());
}

#[tokio::test]
async fn test_legacy_bcrypt_account_can_log_in() {
    let app = TestApp::new();
    // bcrypt of "secret123" carried over from the previous backend
    let legacy = Account::new_local(
        "Linus".to_string(),
        "linus@example.com",
        "$2b$04$..CA.uOD/eaGAOmJB.yMBuplSUM5vth.zCNlv0VcOK.FEHcfNJRFu".to_string(),
    );
    app.store.insert_account(&legacy).await.unwrap();

    let token = app.login("linus@example.com", "secret123").await;
    let me = body_json(app.send(get("/auth/me", Some(&token))).await).await;
    assert_eq!(me["id"], legacy.id.as_str());

    let stored = app.store.find_account(&legacy.id).await.unwrap().unwrap();
    assert!(stored.password_hash.unwrap().starts_with("$argon2id$"));
}

fn from_ip(mut request: Request<Body>, ip: &str) -> Request<Body> {
    request.headers_mut().insert("x-forwarded-for", ip.parse().unwrap());
    request
}

#[tokio::test]
async fn test_oauth_start_does_not_spend_password_login_budget() {
    let mut config = common::test_config();
    config.rate_limit.login_attempts = 2;
    config.rate_limit.oauth_start_attempts = 3;
    let app = TestApp::with_config(
        config,
        common::ScriptedProvider::returning("google-sub-1", "ada@example.com", "Ada"),
    );
    app.register("Ada", "ada@example.com", "secret123").await;

    for _ in 0..3 {
        let res = app.send(from_ip(get("/auth/login", None), "203.0.113.9")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app.send(from_ip(get("/auth/login", None), "203.0.113.9")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let login = || {
        from_ip(
            json_request(
                Method::POST,
                "/auth/password-login",
                None,
                json!({ "email": "ada@example.com", "password": "secret123" }),
            ),
            "203.0.113.9",
        )
    };
    assert_eq!(app.send(login()).await.status(), StatusCode::OK);
    assert_eq!(app.send(login()).await.status(), StatusCode::OK);
    assert_eq!(app.send(login()).await.status(), StatusCode::TOO_MANY_REQUESTS);
}
