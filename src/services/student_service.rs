use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository::{self, Upserted};
use crate::error::AppError;
use crate::files::{FileStore, Upload};
use crate::models::{StudentPatch, StudentView, UpsertOutcome};

pub struct StudentService {
    db: SqlitePool,
    files: Arc<dyn FileStore>,
}

impl StudentService {
    pub fn new(db: SqlitePool, files: Arc<dyn FileStore>) -> Self {
        Self { db, files }
    }

    /// Create-or-update keyed by `regNo`. Fields absent from `patch` keep their
    /// stored value; a new upload replaces (and removes) the previous file.
    pub async fn upsert(
        &self,
        patch: StudentPatch,
        upload: Option<Upload>,
    ) -> Result<UpsertOutcome, AppError> {
        let reg_no = patch
            .key()
            .ok_or_else(|| AppError::BadRequest("regNo is required".to_string()))?
            .to_string();

        let stored = self.store_upload(upload.as_ref()).await?;
        let result = repository::upsert_student(&self.db, &reg_no, &patch, stored.as_deref()).await;
        let upserted = self.settle(result, stored.as_deref()).await?;

        if upserted.created {
            info!("created student {}", reg_no);
            Ok(UpsertOutcome::Created(upserted.student))
        } else {
            info!("updated student {}", reg_no);
            Ok(UpsertOutcome::Updated(upserted.student))
        }
    }

    /// Like the update branch of [`upsert`](Self::upsert) but never creates.
    pub async fn update(
        &self,
        reg_no: &str,
        patch: StudentPatch,
        upload: Option<Upload>,
    ) -> Result<UpsertOutcome, AppError> {
        let stored = self.store_upload(upload.as_ref()).await?;
        let result = repository::update_student(&self.db, reg_no, &patch, stored.as_deref())
            .await
            .and_then(|updated| updated.ok_or(sqlx::Error::RowNotFound));

        let updated = match self.settle(result, stored.as_deref()).await {
            Ok(updated) => updated,
            Err(AppError::Database(sqlx::Error::RowNotFound)) => {
                return Err(AppError::student_not_found());
            }
            Err(e) => return Err(e),
        };

        info!("updated student {}", reg_no);
        Ok(UpsertOutcome::Updated(updated.student))
    }

    pub async fn find(&self, reg_no: &str) -> Result<StudentView, AppError> {
        repository::find_student_by_reg_no(&self.db, reg_no)
            .await?
            .map(StudentView::from)
            .ok_or_else(AppError::student_not_found)
    }

    /// First student whose registration number, name or certificate number
    /// contains `query` (case-insensitive).
    pub async fn search(&self, query: &str) -> Result<StudentView, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::student_not_found());
        }

        repository::search_student(&self.db, query)
            .await?
            .map(StudentView::from)
            .ok_or_else(AppError::student_not_found)
    }

    pub async fn exists(&self, reg_no: &str) -> Result<bool, AppError> {
        Ok(repository::student_exists(&self.db, reg_no).await?)
    }

    /// Removes the record only; its uploaded file stays in the file store.
    pub async fn delete(&self, reg_no: &str) -> Result<(), AppError> {
        if repository::delete_student(&self.db, reg_no).await? {
            info!("deleted student {}", reg_no);
            Ok(())
        } else {
            Err(AppError::student_not_found())
        }
    }

    async fn store_upload(&self, upload: Option<&Upload>) -> Result<Option<String>, AppError> {
        match upload {
            Some(upload) => Ok(Some(self.files.save(upload).await?)),
            None => Ok(None),
        }
    }

    /// Reconciles the file store with the outcome of a record write: the new
    /// file is dropped if the write failed, the replaced one if it succeeded.
    async fn settle(
        &self,
        result: Result<Upserted, sqlx::Error>,
        stored: Option<&str>,
    ) -> Result<Upserted, AppError> {
        match result {
            Ok(upserted) => {
                if let (Some(previous), Some(current)) = (upserted.previous_file.as_deref(), stored) {
                    if previous != current {
                        self.discard(previous).await;
                    }
                }
                Ok(upserted)
            }
            Err(e) => {
                if let Some(orphan) = stored {
                    self.discard(orphan).await;
                }
                Err(e.into())
            }
        }
    }

    async fn discard(&self, filename: &str) {
        if let Err(e) = self.files.remove(filename).await {
            warn!("failed to remove file {}: {}", filename, e);
        }
    }
}
