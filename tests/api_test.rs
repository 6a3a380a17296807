use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use certificate_backend::{
    api::router,
    config::Config,
    db::{self, repository},
    files::LocalFileStore,
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----certificate-test-boundary";

struct TestApp {
    app: Router,
    db: SqlitePool,
    dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_upload_limit_mb(None).await
    }

    async fn with_upload_limit_mb(limit_mb: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload_dir = dir.path().join("uploads");
        let frontend_dir = dir.path().join("dist");
        std::fs::create_dir_all(&upload_dir).expect("upload dir");
        std::fs::create_dir_all(&frontend_dir).expect("frontend dir");
        std::fs::write(frontend_dir.join("index.html"), "<html>frontend</html>")
            .expect("index.html");

        let upload = upload_dir.to_string_lossy().to_string();
        let frontend = frontend_dir.to_string_lossy().to_string();
        let config = Config::from_lookup(|key| match key {
            "UPLOAD_DIR" => Some(upload.clone()),
            "FRONTEND_DIR" => Some(frontend.clone()),
            "MAX_UPLOAD_MB" => limit_mb.map(str::to_string),
            _ => None,
        })
        .expect("config");

        let db = db::connect_memory().await.expect("Failed to create test db");
        let state = AppState {
            db: db.clone(),
            files: Arc::new(LocalFileStore::new(config.upload_dir.clone())),
            config: Arc::new(config),
        };

        Self {
            app: router(state),
            db,
            dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|err| panic!("request failed: {err}"));
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap_or_else(|err| panic!("failed to build request: {err}"))
}

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap_or_else(|err| panic!("failed to build request: {err}"))
}

fn multipart_request(
    method: &str,
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, contents)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .uri(uri)
        .method(method)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap_or_else(|err| panic!("failed to build request: {err}"))
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("DELETE")
        .body(Body::empty())
        .unwrap_or_else(|err| panic!("failed to build request: {err}"))
}

#[tokio::test]
async fn test_root_health_and_frontend_fallback() {
    let app = TestApp::new().await;

    let (status, body) = app.send(get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Certificate Backend Running");

    let (status, _) = app.send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(get("/some/client/route")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>frontend</html>");
}

#[tokio::test]
async fn test_create_without_file_then_lookup() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send_json(json_request(
            "POST",
            "/api/students",
            json!({"regNo": "S100", "fullName": "Asha"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Student created successfully");
    assert_eq!(body["data"]["regNo"], "S100");
    assert!(body["data"]["file"].is_null());

    let (status, body) = app.send_json(get("/api/students/S100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fullName"], "Asha");
    assert!(body["filePath"].is_null());
}

#[tokio::test]
async fn test_upsert_same_key_updates_single_record() {
    let app = TestApp::new().await;

    let (_, created) = app
        .send_json(json_request(
            "POST",
            "/api/students",
            json!({"regNo": "S100", "fullName": "Asha", "courseName": "Mathematics"}),
        ))
        .await;

    let (status, updated) = app
        .send_json(json_request(
            "POST",
            "/api/students",
            json!({"regNo": "S100", "contactNumber": 9876543210u64}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Student updated successfully");
    assert_eq!(updated["data"]["id"], created["data"]["id"]);
    assert_eq!(updated["data"]["fullName"], "Asha");
    assert_eq!(updated["data"]["courseName"], "Mathematics");
    assert_eq!(updated["data"]["contactNumber"], "9876543210");

    assert_eq!(repository::count_students(&app.db).await.expect("count"), 1);
}

#[tokio::test]
async fn test_create_missing_reg_no_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send_json(json_request("POST", "/api/students", json!({"fullName": "Asha"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_multipart_upload_is_served_and_replaced() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send_json(multipart_request(
            "POST",
            "/api/students",
            &[("regNo", "S200"), ("fullName", "Vikram"), ("certificateNumber", "CERT-9")],
            Some(("certificate.pdf", b"first-file")),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let first_file = body["data"]["file"].as_str().expect("file name").to_string();
    assert!(first_file.ends_with(".pdf"));

    let (status, body) = app.send_json(get("/api/students/S200")).await;
    assert_eq!(status, StatusCode::OK);
    let file_path = body["filePath"].as_str().expect("file path").to_string();
    assert_eq!(file_path, format!("/uploads/{first_file}"));

    let (status, bytes) = app.send(get(&file_path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"first-file");

    let (status, body) = app
        .send_json(multipart_request(
            "PUT",
            "/api/students/S200",
            &[("fullName", "Vikram S")],
            Some(("scan.png", b"second-file")),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Student updated successfully");
    assert_eq!(body["data"]["fullName"], "Vikram S");
    assert_eq!(body["data"]["certificateNumber"], "CERT-9");
    let second_file = body["data"]["file"].as_str().expect("file name").to_string();
    assert_ne!(second_file, first_file);

    let uploads = app.dir.path().join("uploads");
    assert!(!uploads.join(&first_file).exists());
    assert!(uploads.join(&second_file).exists());

    let (status, _) = app.send(get(&format!("/uploads/{first_file}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_multipart_empty_file_part_is_ignored() {
    let app = TestApp::new().await;

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"regNo\"\r\n\r\nS300\r\n\
             --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\r\n--{BOUNDARY}--\r\n"
        )
        .as_bytes(),
    );
    let request = Request::builder()
        .uri("/api/students")
        .method("POST")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["file"].is_null());
}

#[tokio::test]
async fn test_search_lookup_and_not_found() {
    let app = TestApp::new().await;

    app.send_json(json_request(
        "POST",
        "/api/students",
        json!({"regNo": "S100", "fullName": "Asha Rao", "certificateNumber": "CERT-1"}),
    ))
    .await;

    let (status, body) = app.send_json(get("/api/students/search?q=asha")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["regNo"], "S100");

    let (status, body) = app.send_json(get("/api/students/search?q=Meera")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "Student not found"}));

    let (status, _) = app.send_json(get("/api/students/search")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send_json(get("/api/students/S999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Student not found");
}

#[tokio::test]
async fn test_update_unknown_key_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send_json(json_request(
            "PUT",
            "/api/students/S404",
            json!({"fullName": "Nobody"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Student not found");
    assert_eq!(repository::count_students(&app.db).await.expect("count"), 0);
}

#[tokio::test]
async fn test_check_reg_no_follows_create_and_delete() {
    let app = TestApp::new().await;

    let (_, body) = app.send_json(get("/api/students/check-regno/S100")).await;
    assert_eq!(body, json!({"exists": false}));

    app.send_json(json_request(
        "POST",
        "/api/students",
        json!({"regNo": "S100", "fullName": "Asha"}),
    ))
    .await;

    let (status, body) = app.send_json(get("/api/students/check-regno/S100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"exists": true}));

    let (status, body) = app.send_json(delete("/api/students/S100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Student deleted successfully");

    let (_, body) = app.send_json(get("/api/students/check-regno/S100")).await;
    assert_eq!(body, json!({"exists": false}));

    let (status, body) = app.send_json(delete("/api/students/S100")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Student not found");
}

#[tokio::test]
async fn test_course_suggestions() {
    let app = TestApp::new().await;

    for name in [
        "Mathematics",
        "Physics",
        "Mathematics",
        "MATLAB Programming",
        "Marketing",
        "Management",
        "Maritime Law",
        "Machine Learning",
    ] {
        repository::insert_course(&app.db, name)
            .await
            .expect("insert course");
    }

    let (status, body) = app.send_json(get("/api/students/courses/search?q=ma")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<String> = serde_json::from_value(body).expect("names");
    assert_eq!(names.len(), 5);
    assert!(names.iter().all(|n| n.to_lowercase().starts_with("ma")));
    assert_eq!(names.iter().filter(|n| *n == "Mathematics").count(), 1);

    let (status, body) = app.send_json(get("/api/students/courses/search?q=zoo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = app.send_json(get("/api/students/courses/search")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn test_course_suggestion_failure_is_generic() {
    let app = TestApp::new().await;
    app.db.close().await;

    let (status, body) = app.send_json(get("/api/students/courses/search?q=ma")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Error fetching suggestions"}));
}

#[tokio::test]
async fn test_urlencoded_form_creates_student() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .uri("/api/students")
        .method("POST")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "regNo=+S500+&fullName=Priya+N&contactNumber=12345&courseName=Physics&extra=x",
        ))
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Student created successfully");
    assert_eq!(body["data"]["regNo"], "S500");
    assert!(body["data"]["file"].is_null());

    let (status, body) = app.send_json(get("/api/students/S500")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fullName"], "Priya N");
    assert_eq!(body["contactNumber"], "12345");
    assert_eq!(body["courseName"], "Physics");
    assert!(body["certificateNumber"].is_null());
}

#[tokio::test]
async fn test_upload_over_body_limit_is_rejected() {
    let app = TestApp::with_upload_limit_mb(Some("1")).await;

    let oversized = vec![b'x'; 1536 * 1024];
    let (status, body) = app
        .send_json(multipart_request(
            "POST",
            "/api/students",
            &[("regNo", "S600"), ("fullName", "Too Big")],
            Some(("scan.pdf", oversized.as_slice())),
        ))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());

    assert_eq!(repository::count_students(&app.db).await.expect("count"), 0);
    let stored = std::fs::read_dir(app.dir.path().join("uploads"))
        .expect("upload dir")
        .count();
    assert_eq!(stored, 0);

    // a small upload still goes through under the same limit
    let (status, _) = app
        .send_json(multipart_request(
            "POST",
            "/api/students",
            &[("regNo", "S601")],
            Some(("scan.pdf", b"small")),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}
