pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};

use crate::config::ClubConfig;
use crate::services::{
    AccountService, AccountStore, AttachmentService, AttachmentStore, AuthService, EventService,
    EventStore, IdentityProvider, JwtService, OAuthStateService, ObjectStorage,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::oauth::login,
        handlers::auth::oauth::callback,
        handlers::auth::password::register,
        handlers::auth::password::password_login,
        handlers::auth::session::me,
        handlers::auth::session::logout,
        handlers::events::create_event,
        handlers::events::list_events,
        handlers::events::get_event,
        handlers::events::update_event,
        handlers::events::approve_event,
        handlers::events::archive_event,
        handlers::events::delete_event,
        handlers::files::upload_file,
        handlers::files::list_files,
        handlers::files::download_file,
        handlers::files::delete_file,
        handlers::users::list_users,
        handlers::users::update_role,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::PasswordLoginRequest,
            dtos::auth::AuthUrlResponse,
            dtos::auth::TokenResponse,
            dtos::events::CreateEventRequest,
            dtos::events::UpdateEventRequest,
            dtos::events::EventView,
            dtos::files::AttachmentView,
            dtos::users::RoleUpdateRequest,
            handlers::health::HealthResponse,
            models::AccountProfile,
            models::Role,
            models::EventStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Google sign-in, password login and sessions"),
        (name = "Events", description = "Event lifecycle"),
        (name = "Files", description = "Event attachments"),
        (name = "Users", description = "Account administration"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Storage and provider implementations the application runs against.
#[derive(Clone)]
pub struct Backends {
    pub accounts: Arc<dyn AccountStore>,
    pub events: Arc<dyn EventStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub provider: Arc<dyn IdentityProvider>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: ClubConfig,
    pub accounts: Arc<dyn AccountStore>,
    pub auth_service: AuthService,
    pub event_service: EventService,
    pub account_service: AccountService,
    pub attachment_service: AttachmentService,
    pub login_rate_limiter: IpRateLimiter,
    pub oauth_start_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: ClubConfig, backends: Backends) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;
        let state_ttl = chrono::Duration::try_minutes(config.google.state_ttl_minutes)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "OAuth state TTL of {} minutes is out of range",
                    config.google.state_ttl_minutes
                ))
            })?;
        let oauth_state = OAuthStateService::new(&config.jwt.secret, state_ttl);

        let auth_service = AuthService::new(
            backends.provider,
            oauth_state,
            backends.accounts.clone(),
            jwt,
        );
        let event_service = EventService::new(
            backends.events.clone(),
            backends.attachments.clone(),
            backends.storage.clone(),
        );
        let account_service = AccountService::new(backends.accounts.clone());
        let attachment_service = AttachmentService::new(
            backends.events,
            backends.attachments,
            backends.storage,
            config.storage.max_upload_bytes,
        );

        let limits = &config.rate_limit;
        let login_rate_limiter = create_ip_rate_limiter(
            limits.login_attempts,
            limits.login_window_seconds,
            limits.trusted_proxy_hops,
        );
        let oauth_start_rate_limiter = create_ip_rate_limiter(
            limits.oauth_start_attempts,
            limits.oauth_start_window_seconds,
            limits.trusted_proxy_hops,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            limits.register_attempts,
            limits.register_window_seconds,
            limits.trusted_proxy_hops,
        );
        let ip_rate_limiter = create_ip_rate_limiter(
            limits.global_ip_limit,
            limits.global_ip_window_seconds,
            limits.trusted_proxy_hops,
        );

        Ok(Self {
            config,
            accounts: backends.accounts,
            auth_service,
            event_service,
            account_service,
            attachment_service,
            login_rate_limiter,
            oauth_start_rate_limiter,
            register_rate_limiter,
            ip_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    // Credential endpoints with their own rate limits
    let login_routes = Router::new()
        .route("/auth/password-login", post(handlers::auth::password_login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let oauth_start_route = Router::new()
        .route("/auth/login", get(handlers::auth::login))
        .layer(from_fn_with_state(
            state.oauth_start_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Multipart uploads carry some framing on top of the file itself.
    let upload_limit = state.attachment_service.max_upload_bytes() + 64 * 1024;

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/events",
            post(handlers::events::create_event).get(handlers::events::list_events),
        )
        .route(
            "/events/:id",
            get(handlers::events::get_event)
                .patch(handlers::events::update_event)
                .delete(handlers::events::delete_event),
        )
        .route("/events/:id/approve", patch(handlers::events::approve_event))
        .route("/events/:id/archive", patch(handlers::events::archive_event))
        .route(
            "/events/:id/files",
            post(handlers::files::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(handlers::files::list_files),
        )
        .route(
            "/files/:id",
            get(handlers::files::download_file).delete(handlers::files::delete_file),
        )
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id/role", patch(handlers::users::update_role))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = cors_layer(&state.config);
    let ip_limiter = state.ip_rate_limiter.clone();

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/callback", get(handlers::auth::callback))
        .route("/auth/logout", post(handlers::auth::logout))
        .merge(login_routes)
        .merge(oauth_start_route)
        .merge(register_route)
        .merge(protected_routes)
        .with_state(state)
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

fn cors_layer(config: &ClubConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter(|origin| {
            if origin.as_str() == "*" {
                tracing::warn!(
                    "Wildcard CORS origin ignored; credentials require explicit origins"
                );
                return false;
            }
            true
        })
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}
