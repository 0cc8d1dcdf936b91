use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{users::RoleUpdateRequest, ErrorResponse},
    middleware::CurrentUser,
    models::AccountProfile,
    AppState,
};

/// List all accounts (admin)
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All accounts", body = [AccountProfile]),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<Vec<AccountProfile>>, AppError> {
    let accounts = state.account_service.list(&actor).await?;
    Ok(Json(accounts.iter().map(|a| a.profile()).collect()))
}

/// Change an account's role (admin, non-admin targets only)
#[utoipa::path(
    patch,
    path = "/users/{id}/role",
    params(("id" = String, Path, description = "Account id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountProfile),
        (status = 400, description = "Invalid role", body = ErrorResponse),
        (status = 403, description = "Not an admin, or target is an admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<RoleUpdateRequest>,
) -> Result<Json<AccountProfile>, AppError> {
    let account = state
        .account_service
        .change_role(&actor, &id, &req.role)
        .await?;
    Ok(Json(account.profile()))
}
