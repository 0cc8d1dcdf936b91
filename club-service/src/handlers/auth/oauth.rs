//! Google sign-in: authorization URL and callback.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    config::ClubConfig,
    dtos::{
        auth::{AuthUrlResponse, CallbackQuery, LoginQuery, TokenResponse},
        ErrorResponse,
    },
    middleware::SESSION_COOKIE,
    services::{AuthSession, ServiceError},
    AppState,
};

pub const NONCE_COOKIE: &str = "oauth_nonce";

/// Start Google sign-in
#[utoipa::path(
    get,
    path = "/auth/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Provider authorization URL", body = AuthUrlResponse),
        (status = 400, description = "Redirect target not allowed", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Result<impl IntoResponse, AppError> {
    let redirect_target = match query.redirect_uri.filter(|r| !r.is_empty()) {
        Some(target) if is_allowed_redirect(&target, &state.config) => Some(target),
        Some(target) => {
            tracing::warn!(target = %target, "Rejected post-login redirect target");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Redirect URI is not allowed"
            )));
        }
        None => None,
    };

    let start = state.auth_service.start_oauth(redirect_target)?;

    let nonce_cookie = Cookie::build((NONCE_COOKIE, start.nonce))
        .http_only(true)
        .secure(state.config.session_cookie.secure)
        // Must survive the top-level redirect back from the provider.
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            state.auth_service.state_ttl().num_seconds(),
        ));

    Ok((
        jar.add(nonce_cookie),
        Json(AuthUrlResponse {
            auth_url: start.auth_url,
        }),
    ))
}

/// Google OAuth callback
///
/// Answers with JSON when the login was started without a redirect target,
/// otherwise redirects the browser back to that target.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 303, description = "Redirect to the frontend with a token or an error"),
        (status = 400, description = "Invalid state or provider failure", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let presented_nonce = jar.get(NONCE_COOKIE).map(|c| c.value().to_string());
    // The nonce is single use whatever happens next.
    let jar = jar.remove(Cookie::build(NONCE_COOKIE).path("/"));

    let exchange = match query.state.as_deref() {
        Some(raw_state) => state
            .auth_service
            .open_exchange(raw_state, presented_nonce.as_deref()),
        None => Err(ServiceError::StateMismatch),
    };
    let exchange = match exchange {
        Ok(exchange) => exchange,
        Err(e) => {
            tracing::warn!("OAuth callback with invalid state");
            return (jar, AppError::from(e)).into_response();
        }
    };
    let redirect_target = exchange.redirect_target.clone();

    let outcome = match (query.error, query.code) {
        (Some(error), _) => Err(ServiceError::ProviderError(format!(
            "Provider returned error: {}",
            error
        ))),
        (None, None) => Err(ServiceError::ProviderError(
            "Callback is missing the authorization code".to_string(),
        )),
        (None, Some(code)) => state.auth_service.complete_oauth(&code, exchange).await,
    };

    match (outcome, redirect_target) {
        (Ok(outcome), None) => (jar, Json(TokenResponse::from(outcome.session))).into_response(),
        (Ok(outcome), Some(target)) => {
            let location = append_query(&target, "token", &outcome.session.access_token);
            let jar = jar.add(session_cookie(&state.config, &outcome.session));
            (jar, Redirect::to(&location)).into_response()
        }
        (Err(e), None) => (jar, AppError::from(e)).into_response(),
        (Err(e), Some(target)) => {
            tracing::warn!(error = %e, "OAuth login failed");
            let location = append_query(&target, "error", &e.public_message());
            (jar, Redirect::to(&location)).into_response()
        }
    }
}

pub(crate) fn session_cookie(config: &ClubConfig, session: &AuthSession) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.access_token.clone()))
        .http_only(true)
        .secure(config.session_cookie.secure)
        .same_site(config.session_cookie.same_site)
        .path("/")
        .max_age(time::Duration::seconds(config.session_cookie.max_age_secs))
        .build()
}

/// `target` must be one of the configured origins or a path below one.
fn is_allowed_redirect(target: &str, config: &ClubConfig) -> bool {
    config.redirect_origins().any(|origin| {
        let origin = origin.trim_end_matches('/');
        if origin.is_empty() {
            return false;
        }
        match target.strip_prefix(origin) {
            Some(rest) => {
                rest.is_empty() || rest.starts_with(|c: char| matches!(c, '/' | '?' | '#'))
            }
            None => false,
        }
    })
}

/// The parameter goes before any `#fragment` so the server side of the
/// frontend still sees it.
fn append_query(target: &str, key: &str, value: &str) -> String {
    let (base, fragment) = match target.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (target, None),
    };
    let separator = match base.find('?') {
        Some(i) if i + 1 == base.len() || base.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };

    let mut location = format!("{}{}{}={}", base, separator, key, urlencoding::encode(value));
    if let Some(fragment) = fragment {
        location.push('#');
        location.push_str(fragment);
    }
    location
}
