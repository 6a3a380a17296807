pub mod form;

use axum::Json;
use axum::extract::{DefaultBodyLimit, Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::{AppError, MessageResponse};
use crate::files::UPLOADS_MOUNT;
use crate::models::{Student, StudentView};
use crate::services::{CourseService, StudentService};
use crate::state::AppState;

use self::form::StudentForm;

pub const HEALTH_MESSAGE: &str = "Certificate Backend Running";

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub message: String,
    pub data: Student,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let students = Router::new()
        .route("/", post(upsert_student))
        .route("/search", get(search_student))
        .route("/courses/search", get(search_courses))
        .route("/check-regno/{reg_no}", get(check_reg_no))
        .route(
            "/{reg_no}",
            get(get_student).put(update_student).delete(delete_student),
        );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/students", students)
        .nest_service(UPLOADS_MOUNT, ServeDir::new(&config.upload_dir))
        .fallback_service(ServeFile::new(config.frontend_dir.join("index.html")))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn student_service(state: &AppState) -> StudentService {
    StudentService::new(state.db.clone(), state.files.clone())
}

async fn root() -> &'static str {
    HEALTH_MESSAGE
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn upsert_student(
    State(state): State<AppState>,
    form: StudentForm,
) -> Result<Json<StudentResponse>, AppError> {
    let outcome = student_service(&state).upsert(form.patch, form.upload).await?;
    Ok(Json(StudentResponse {
        message: outcome.message().to_string(),
        data: outcome.into_student(),
    }))
}

async fn search_student(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<StudentView>, AppError> {
    let student = student_service(&state).search(&params.q).await?;
    Ok(Json(student))
}

async fn get_student(
    State(state): State<AppState>,
    Path(reg_no): Path<String>,
) -> Result<Json<StudentView>, AppError> {
    let student = student_service(&state).find(&reg_no).await?;
    Ok(Json(student))
}

async fn update_student(
    State(state): State<AppState>,
    Path(reg_no): Path<String>,
    form: StudentForm,
) -> Result<Json<StudentResponse>, AppError> {
    let outcome = student_service(&state)
        .update(&reg_no, form.patch, form.upload)
        .await?;
    Ok(Json(StudentResponse {
        message: outcome.message().to_string(),
        data: outcome.into_student(),
    }))
}

async fn delete_student(
    State(state): State<AppState>,
    Path(reg_no): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    student_service(&state).delete(&reg_no).await?;
    Ok(Json(MessageResponse {
        message: "Student deleted successfully".to_string(),
    }))
}

async fn search_courses(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let names = CourseService::new(state.db.clone())
        .suggest(&params.q)
        .await
        .map_err(|e| {
            error!("course suggestion failed: {}", e);
            AppError::Internal("Error fetching suggestions".to_string())
        })?;
    Ok(Json(names))
}

async fn check_reg_no(
    State(state): State<AppState>,
    Path(reg_no): Path<String>,
) -> Result<Json<ExistsResponse>, AppError> {
    let exists = student_service(&state).exists(&reg_no).await?;
    Ok(Json(ExistsResponse { exists }))
}
