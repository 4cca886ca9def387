use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub blob_dir: PathBuf,
    pub blob_base_url: String,
    /// Zero runs the repair sweep once and exits.
    pub repair_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let repair_interval_secs = match lookup("CHIRP_REPAIR_INTERVAL_SECS") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError {
                name: "CHIRP_REPAIR_INTERVAL_SECS",
                reason: format!("{}: {}", raw, e),
            })?,
            None => 0,
        };

        Ok(Config {
            db_path: lookup("CHIRP_DB_PATH").unwrap_or_else(|| "chirp.db".into()).into(),
            blob_dir: lookup("CHIRP_BLOB_DIR").unwrap_or_else(|| "./blobs".into()).into(),
            blob_base_url: lookup("CHIRP_BLOB_BASE_URL")
                .unwrap_or_else(|| "file://./blobs".into()),
            repair_interval_secs,
        })
    }
}
