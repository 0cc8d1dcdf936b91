mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use club_service::models::Role;
use club_service::services::AttachmentStore;
use common::{bare, body_bytes, body_json, get, json_request, TestApp, MAX_UPLOAD_BYTES};
use serde_json::{json, Value};

const BOUNDARY: &str = "club-test-boundary";

fn multipart_part(field: &str, filename: &str, content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        BOUNDARY, field, filename, content_type
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(event_id: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/events/{}/files", event_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create_event(app: &TestApp, token: &str) -> String {
    let res = app
        .send(json_request(
            Method::POST,
            "/events",
            Some(token),
            json!({
                "title": "Workshop",
                "start_time": "2030-06-01T10:00:00Z",
                "end_time": "2030-06-01T12:00:00Z"
            }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn upload(
    app: &TestApp,
    event_id: &str,
    token: &str,
    filename: &str,
    content: &[u8],
) -> Value {
    let res = app
        .send(upload_request(
            event_id,
            token,
            multipart_part("file", filename, "text/plain", content),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await
}

#[tokio::test]
async fn test_upload_list_download_delete() {
    // 1. Setup
    let app = TestApp::new();
    let (organizer_id, token) = app
        .member("Olive", "olive@example.com", Role::CoreMember)
        .await;
    let event_id = create_event(&app, &token).await;

    // 2. Upload
    let attachment = upload(&app, &event_id, &token, "agenda.txt", b"hello club").await;
    assert_eq!(attachment["filename"], "agenda.txt");
    assert_eq!(attachment["mime_type"], "text/plain");
    assert_eq!(attachment["size"], 10);
    assert_eq!(attachment["event_id"], event_id.as_str());
    assert_eq!(attachment["uploader_id"], organizer_id.as_str());
    let file_id = attachment["id"].as_str().unwrap().to_string();

    let stored = app.store.find_attachment(&file_id).await.unwrap().unwrap();
    assert!(app.storage.contains(&stored.storage_key));

    // 3. List
    let res = app
        .send(get(&format!("/events/{}/files", event_id), Some(&token)))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let files = body_json(res).await;
    assert_eq!(files.as_array().unwrap().len(), 1);

    // 4. Download
    let res = app.send(get(&format!("/files/{}", file_id), Some(&token))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
    let disposition = res
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("agenda.txt"));
    assert_eq!(body_bytes(res).await, b"hello club");

    // 5. Delete
    let res = app
        .send(bare(Method::DELETE, &format!("/files/{}", file_id), Some(&token)))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["message"], "File deleted successfully");
    assert!(!app.storage.contains(&stored.storage_key));

    let res = app.send(get(&format!("/files/{}", file_id), Some(&token))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uploaded_filename_is_reduced_to_basename() {
    let app = TestApp::new();
    let (_, token) = app
        .member("Olive", "olive@example.com", Role::CoreMember)
        .await;
    let event_id = create_event(&app, &token).await;

    let attachment = upload(&app, &event_id, &token, "../../etc/passwd", b"root").await;

    assert_eq!(attachment["filename"], "passwd");
}

#[tokio::test]
async fn test_only_organizer_or_admin_manage_files() {
    let app = TestApp::new();
    let (_, admin) = app.member("Ann", "ann@example.com", Role::Admin).await;
    let (_, organizer) = app
        .member("Olive", "olive@example.com", Role::CoreMember)
        .await;
    let (_, other) = app
        .member("Otto", "otto@example.com", Role::CoreMember)
        .await;
    let event_id = create_event(&app, &organizer).await;

    let res = app
        .send(upload_request(
            &event_id,
            &other,
            multipart_part("file", "intruder.txt", "text/plain", b"nope"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let attachment = upload(&app, &event_id, &organizer, "notes.txt", b"notes").await;
    let file_uri = format!("/files/{}", attachment["id"].as_str().unwrap());

    let res = app.send(bare(Method::DELETE, &file_uri, Some(&other))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.send(bare(Method::DELETE, &file_uri, Some(&admin))).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = TestApp::new();
    let (_, token) = app
        .member("Olive", "olive@example.com", Role::CoreMember)
        .await;
    let event_id = create_event(&app, &token).await;

    let oversized = vec![b'a'; MAX_UPLOAD_BYTES + 1];
    let res = app
        .send(upload_request(
            &event_id,
            &token,
            multipart_part("file", "big.bin", "application/octet-stream", &oversized),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .send(upload_request(
            &event_id,
            &token,
            multipart_part("file", "empty.txt", "text/plain", b""),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .send(upload_request(
            &event_id,
            &token,
            multipart_part("attachment", "wrong-field.txt", "text/plain", b"data"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "No file part");

    let res = app
        .send(upload_request(
            "missing",
            &token,
            multipart_part("file", "notes.txt", "text/plain", b"data"),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .send(get("/events/missing/files", Some(&token)))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_event_removes_its_files() {
    let app = TestApp::new();
    let (_, admin) = app.member("Ann", "ann@example.com", Role::Admin).await;
    let (_, organizer) = app
        .member("Olive", "olive@example.com", Role::CoreMember)
        .await;
    let event_id = create_event(&app, &organizer).await;
    let attachment = upload(&app, &event_id, &organizer, "slides.txt", b"slides").await;
    let file_id = attachment["id"].as_str().unwrap().to_string();
    let stored = app.store.find_attachment(&file_id).await.unwrap().unwrap();

    let res = app
        .send(bare(Method::DELETE, &format!("/events/{}", event_id), Some(&admin)))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    assert!(app.store.find_attachment(&file_id).await.unwrap().is_none());
    assert!(!app.storage.contains(&stored.storage_key));
    let res = app.send(get(&format!("/files/{}", file_id), Some(&admin))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
