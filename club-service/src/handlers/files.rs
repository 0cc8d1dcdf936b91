use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{files::AttachmentView, ErrorResponse, MessageResponse},
    middleware::CurrentUser,
    services::Upload,
    AppState,
};

const FILE_FIELD: &str = "file";

/// Attach a file to an event (organizer or admin)
#[utoipa::path(
    post,
    path = "/events/{id}/files",
    params(("id" = String, Path, description = "Event id")),
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Multipart body with a `file` field"
    ),
    responses(
        (status = 201, description = "File stored", body = AttachmentView),
        (status = 400, description = "Missing, empty or oversized file", body = ErrorResponse),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(event_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No selected file")))?;
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read upload: {}", e)))?;

        upload = Some(Upload {
            filename,
            mime_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file part")))?;
    let attachment = state
        .attachment_service
        .upload(&actor, &event_id, upload)
        .await?;

    Ok((StatusCode::CREATED, Json(AttachmentView::from(attachment))))
}

/// List an event's files
#[utoipa::path(
    get,
    path = "/events/{id}/files",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Attachments", body = [AttachmentView]),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<AttachmentView>>, AppError> {
    let attachments = state.attachment_service.list(&event_id).await?;
    Ok(Json(attachments.into_iter().map(AttachmentView::from).collect()))
}

/// Download a file
#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File bytes", content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (attachment, bytes) = state.attachment_service.download(&id).await?;

    let content_type = HeaderValue::from_str(&attachment.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        header_safe(&attachment.filename)
    ))
    .unwrap_or(HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Delete a file (organizer or admin)
#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    tag = "Files",
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.attachment_service.delete(&actor, &id).await?;
    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

fn header_safe(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
