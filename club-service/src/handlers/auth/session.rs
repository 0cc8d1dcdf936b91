use axum::{http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    dtos::{ErrorResponse, MessageResponse},
    middleware::{CurrentUser, SESSION_COOKIE},
    models::AccountProfile,
};

/// Current user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Authenticated account", body = AccountProfile),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(CurrentUser(account): CurrentUser) -> Json<AccountProfile> {
    Json(account.profile())
}

/// Logout
///
/// Tokens are stateless, so this only drops the session cookie.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out successfully", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        StatusCode::OK,
        jar,
        Json(MessageResponse {
            message: "Successfully logged out".to_string(),
        }),
    )
}
