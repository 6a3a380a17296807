use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::info;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_upload_mb: usize = parse_or(&lookup, "MAX_UPLOAD_MB", "10")?;

        Ok(Self {
            port: parse_or(&lookup, "PORT", "5000")?,
            database_url: string_or(&lookup, "DATABASE_URL", "sqlite://students.db"),
            upload_dir: PathBuf::from(string_or(&lookup, "UPLOAD_DIR", "uploads")),
            frontend_dir: PathBuf::from(string_or(&lookup, "FRONTEND_DIR", "frontend/dist")),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => value,
        None => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    string_or(lookup, key, default)
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid {key} value: {e}")))
}
