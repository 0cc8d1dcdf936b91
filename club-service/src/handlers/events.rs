use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        events::{CreateEventRequest, EventView, ListEventsQuery, UpdateEventRequest},
        ErrorResponse, MessageResponse,
    },
    middleware::CurrentUser,
    models::EventStatus,
    utils::ValidatedJson,
    AppState,
};

/// Create an event
#[utoipa::path(
    post,
    path = "/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventView),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.event_service.create(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(EventView::from(event))))
}

/// List events
#[utoipa::path(
    get,
    path = "/events",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Events ordered by start time", body = [EventView]),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<EventView>>, AppError> {
    let status = query
        .status
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EventStatus>())
        .transpose()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let events = state.event_service.list(status).await?;
    Ok(Json(events.into_iter().map(EventView::from).collect()))
}

/// Get an event
#[utoipa::path(
    get,
    path = "/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = EventView),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<EventView>, AppError> {
    let event = state.event_service.get(&id).await?;
    Ok(Json(event.into()))
}

/// Update an event (organizer or admin)
#[utoipa::path(
    patch,
    path = "/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated event", body = EventView),
        (status = 400, description = "Invalid schedule", body = ErrorResponse),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn update_event(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateEventRequest>,
) -> Result<Json<EventView>, AppError> {
    let event = state.event_service.update(&actor, &id, req.into()).await?;
    Ok(Json(event.into()))
}

/// Approve an event (admin)
#[utoipa::path(
    patch,
    path = "/events/{id}/approve",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Approved event", body = EventView),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn approve_event(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<EventView>, AppError> {
    let event = state.event_service.approve(&actor, &id).await?;
    Ok(Json(event.into()))
}

/// Archive an event (core member or admin)
#[utoipa::path(
    patch,
    path = "/events/{id}/archive",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Archived event", body = EventView),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn archive_event(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<EventView>, AppError> {
    let event = state.event_service.archive(&actor, &id).await?;
    Ok(Json(event.into()))
}

/// Delete an event and its files (admin)
#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event deleted", body = MessageResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Events",
    security(("bearer_auth" = []))
)]
pub async fn delete_event(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.event_service.delete(&actor, &id).await?;
    Ok(Json(MessageResponse {
        message: "Event deleted successfully".to_string(),
    }))
}
