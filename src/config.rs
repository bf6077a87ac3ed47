use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_CACHE_PATH: &str = "school-cache.json";
pub const DEFAULT_OUTPUT_DIR: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Only the Postgres-backed commands need this.
    pub database_url: Option<String>,
    pub cache_path: PathBuf,
    pub output_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            database_url: non_empty("DATABASE_URL"),
            cache_path: non_empty("SCHOOL_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            output_dir: non_empty("REPORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        }
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the Postgres mirror of the school backend")
    }
}
