//! Runtime configuration from environment variables:
//! - `VOYAGE_DATA_DIR` - directory holding `voyage.db` (default: platform data dir)
//! - `VOYAGE_SERVICES_URL` - base URL of the chat classification and location services
//! - `VOYAGE_SERVICES_KEY` - bearer token for those services (optional)
//! - `VOYAGE_PORT` - HTTP port (default: 3000)

use std::path::PathBuf;

use anyhow::Result;

use crate::db::Database;

pub const DEFAULT_PORT: u16 = 3000;
const DB_FILE: &str = "voyage.db";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub services_url: Option<String>,
    pub services_key: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Empty values count
    /// as unset; an unparseable port is ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let port = var("VOYAGE_PORT").and_then(|raw| match raw.trim().parse() {
            Ok(port) => Some(port),
            Err(_) => {
                tracing::warn!("Ignoring invalid VOYAGE_PORT '{}'", raw);
                None
            }
        });
        Self {
            data_dir: var("VOYAGE_DATA_DIR").map(PathBuf::from),
            services_url: var("VOYAGE_SERVICES_URL").map(|u| u.trim_end_matches('/').to_string()),
            services_key: var("VOYAGE_SERVICES_KEY"),
            port,
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Opens and migrates the document database.
    pub fn open_database(&self) -> Result<Database> {
        let db = match &self.data_dir {
            Some(dir) => Database::open(dir.join(DB_FILE))?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }
}
