use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use tracing::debug;

use crate::error::AppError;
use crate::files::Upload;
use crate::models::StudentPatch;

/// Name of the multipart field carrying the uploaded document.
pub const FILE_FIELD: &str = "file";

/// Student payload from a multipart form (with optional `file`), an
/// urlencoded form, or a JSON body.
#[derive(Debug, Default)]
pub struct StudentForm {
    pub patch: StudentPatch,
    pub upload: Option<Upload>,
}

impl<S> FromRequest<S> for StudentForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let patch = if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(patch) = Form::<StudentPatch>::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            patch
        } else {
            let Json(patch) = Json::<StudentPatch>::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            patch
        };

        Ok(Self {
            patch: patch.normalized(),
            upload: None,
        })
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<StudentForm, AppError> {
    let mut patch = StudentPatch::default();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::rejected(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            let original_name = field
                .file_name()
                .map(str::to_string)
                .filter(|n| !n.is_empty());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;

            // browsers send an empty, unnamed part when no file was chosen
            if bytes.is_empty() && original_name.is_none() {
                continue;
            }
            upload = Some(Upload { original_name, bytes });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
        if !patch.set(&name, value) {
            debug!("ignoring unknown form field {:?}", name);
        }
    }

    Ok(StudentForm {
        patch: patch.normalized(),
        upload,
    })
}
