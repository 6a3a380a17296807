use sqlx::SqlitePool;
use tracing::debug;

use crate::db::repository;
use crate::error::AppError;

/// Maximum number of course names returned per suggestion query.
pub const SUGGESTION_LIMIT: i64 = 5;

pub struct CourseService {
    db: SqlitePool,
}

impl CourseService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Autocomplete: distinct course names starting with `query`, ignoring case.
    /// An empty query matches every course.
    pub async fn suggest(&self, query: &str) -> Result<Vec<String>, AppError> {
        let names = repository::suggest_course_names(&self.db, query, SUGGESTION_LIMIT).await?;
        debug!("course suggestions for {:?}: {}", query, names.len());
        Ok(names)
    }
}
