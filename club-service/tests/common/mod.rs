//! Shared setup for the club service integration tests.
//!
//! Every test runs against in-memory stores and a scripted identity
//! provider, so no database or network is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use axum_extra::extract::cookie::SameSite;
use chrono::Utc;
use club_service::{
    build_router,
    config::{
        ClubConfig, Environment, GoogleOAuthConfig, JwtConfig, MongoConfig, RateLimitConfig,
        SecurityConfig, SessionCookieConfig, StorageConfig,
    },
    models::Role,
    services::{
        AccountStore, IdentityProvider, InMemoryStorage, InMemoryStore, ProviderIdentity,
        ProviderTokens, ServiceError,
    },
    AppState, Backends,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-with-enough-length";
pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const MAX_UPLOAD_BYTES: usize = 1024;

pub fn test_config() -> ClubConfig {
    ClubConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "club-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            fallback_uri: None,
            database: "club_test".to_string(),
            server_selection_timeout_secs: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new(JWT_SECRET.to_string()),
            ttl_hours: 24,
        },
        google: GoogleOAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-secret".to_string()),
            redirect_uri: "http://localhost:8080/auth/callback".to_string(),
            frontend_url: FRONTEND_URL.to_string(),
            auth_endpoint: "https://provider.test/auth".to_string(),
            token_endpoint: "https://provider.test/token".to_string(),
            userinfo_endpoint: "https://provider.test/userinfo".to_string(),
            jwks_uri: "https://provider.test/certs".to_string(),
            http_timeout_secs: 5,
            state_ttl_minutes: 10,
        },
        session_cookie: SessionCookieConfig {
            max_age_secs: 86400,
            secure: false,
            same_site: SameSite::Lax,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        storage: StorageConfig {
            local_path: "unused".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            oauth_start_attempts: 100,
            oauth_start_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
            trusted_proxy_hops: 1,
        },
    }
}

/// Identity provider that answers every code with a fixed identity.
pub struct ScriptedProvider {
    pub identity: ProviderIdentity,
    pub fail_exchange: bool,
}

impl ScriptedProvider {
    pub fn returning(subject: &str, email: &str, name: &str) -> Self {
        Self {
            identity: ProviderIdentity {
                subject: Some(subject.to_string()),
                email: Some(email.to_string()),
                email_verified: Some(true),
                name: Some(name.to_string()),
                picture: None,
            },
            fail_exchange: false,
        }
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://provider.test/auth?state={}", urlencoding::encode(state))
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ServiceError> {
        if self.fail_exchange || code == "bad-code" {
            return Err(ServiceError::ProviderError("invalid_grant".to_string()));
        }
        Ok(ProviderTokens {
            access_token: format!("provider-token-{}", code),
            id_token: None,
        })
    }

    async fn fetch_identity(&self, _access_token: &str) -> Result<ProviderIdentity, ServiceError> {
        Ok(self.identity.clone())
    }

    async fn verify_identity_token(&self, _id_token: &str) -> Option<ProviderIdentity> {
        None
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<InMemoryStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::returning(
            "google-sub-1",
            "ada@example.com",
            "Ada Lovelace",
        ))
    }

    pub fn with_provider(provider: ScriptedProvider) -> Self {
        Self::with_config(test_config(), provider)
    }

    pub fn with_config(config: ClubConfig, provider: ScriptedProvider) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let storage = Arc::new(InMemoryStorage::new());

        let state = AppState::new(
            config,
            Backends {
                accounts: store.clone(),
                events: store.clone(),
                attachments: store.clone(),
                storage: storage.clone(),
                provider: Arc::new(provider),
            },
        )
        .expect("Failed to build app state");

        Self {
            router: build_router(state),
            store,
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed")
    }

    /// Registers a password account and returns its id.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> String {
        let res = self
            .send(json_request(
                Method::POST,
                "/auth/register",
                None,
                json!({ "name": name, "email": email, "password": password }),
            ))
            .await;
        assert_eq!(res.status(), 201, "registration of {} failed", email);
        body_json(res).await["id"]
            .as_str()
            .expect("id in profile")
            .to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let res = self
            .send(json_request(
                Method::POST,
                "/auth/password-login",
                None,
                json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(res.status(), 200, "login of {} failed", email);
        body_json(res).await["access_token"]
            .as_str()
            .expect("access_token")
            .to_string()
    }

    pub async fn set_role(&self, account_id: &str, role: Role) {
        self.store
            .set_role_unless_admin(account_id, role, Utc::now())
            .await
            .expect("role write failed")
            .expect("account exists and is not an admin");
    }

    /// Registers, assigns `role` and logs in. Returns `(id, token)`.
    pub async fn member(&self, name: &str, email: &str, role: Role) -> (String, String) {
        let id = self.register(name, email, "secret123").await;
        if role != Role::User {
            self.set_role(&id, role).await;
        }
        let token = self.login(email, "secret123").await;
        (id, token)
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    bare(Method::GET, uri, token)
}

pub fn bare(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("valid request")
}

pub async fn body_bytes(res: Response) -> Vec<u8> {
    res.into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(res: Response) -> Value {
    serde_json::from_slice(&body_bytes(res).await).expect("JSON body")
}

/// All `Set-Cookie` headers of a response.
pub fn set_cookies(res: &Response) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of the `name=value` pair in a `Set-Cookie` header.
pub fn cookie_value(res: &Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(res).into_iter().find_map(|cookie| {
        cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(str::to_string)
    })
}
