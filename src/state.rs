use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::files::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub files: Arc<dyn FileStore>,
    pub config: Arc<Config>,
}
