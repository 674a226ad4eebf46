// ⚙️ Importer configuration
//
// Values come from CLI flags first, then the environment (a .env file is
// loaded by the binary), then defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "SKS_DB_PATH";
pub const DEFAULT_DB_PATH: &str = "sks.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// SQLite database holding organisation + organisation_history
    pub database_path: PathBuf,

    /// Identifier passed through to the run audit
    pub run_id: String,
}

impl ImporterConfig {
    /// Resolve the configuration from optional CLI overrides and an
    /// environment lookup
    pub fn resolve<F>(db_flag: Option<PathBuf>, run_id_flag: Option<String>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = db_flag
            .or_else(|| env(DB_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let run_id = run_id_flag.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        ImporterConfig {
            database_path,
            run_id,
        }
    }

    /// Same as `resolve`, reading the process environment
    pub fn from_env(db_flag: Option<PathBuf>, run_id_flag: Option<String>) -> Self {
        Self::resolve(db_flag, run_id_flag, |key| std::env::var(key).ok())
    }
}
