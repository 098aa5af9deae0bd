// ⚙️ Settings - party names and runtime paths
// Names come from a JSON file; paths come from the environment (.env supported).

use crate::ledger::{DEFAULT_PERSON_A, DEFAULT_PERSON_B};
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DB_FILE: &str = "split_tracker.db";
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_ENV_FILE: &str = ".env";

pub const ENV_DB: &str = "SPLIT_TRACKER_DB";
pub const ENV_SETTINGS: &str = "SPLIT_TRACKER_SETTINGS";
pub const ENV_ADDR: &str = "SPLIT_TRACKER_ADDR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_person_a")]
    pub person_a_name: String,

    #[serde(default = "default_person_b")]
    pub person_b_name: String,
}

fn default_person_a() -> String {
    DEFAULT_PERSON_A.to_string()
}

fn default_person_b() -> String {
    DEFAULT_PERSON_B.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            person_a_name: default_person_a(),
            person_b_name: default_person_b(),
        }
    }
}

impl Settings {
    pub fn new(person_a: &str, person_b: &str) -> Result<Self> {
        let settings = Settings {
            person_a_name: person_a.trim().to_string(),
            person_b_name: person_b.trim().to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file, falling back to defaults when it doesn't exist
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file missing, using defaults");
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        let mut settings: Settings =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;
        settings.person_a_name = settings.person_a_name.trim().to_string();
        settings.person_b_name = settings.person_b_name.trim().to_string();
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.person_a_name.is_empty() || self.person_b_name.is_empty() {
            bail!("Party names must not be empty");
        }
        if self.person_a_name == self.person_b_name {
            bail!(
                "Party names must differ, both are {:?}",
                self.person_a_name
            );
        }
        Ok(())
    }

    pub fn names(&self) -> [&str; 2] {
        [self.person_a_name.as_str(), self.person_b_name.as_str()]
    }
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Load `.env` from the working directory if present. Missing file is not an error.
/// Call before building the tracing filter so `RUST_LOG` can come from the file.
pub fn load_dotenv() -> Option<PathBuf> {
    load_env_file(Path::new(DEFAULT_ENV_FILE))
}

/// Variables already set in the process win over the file
fn load_env_file(path: &Path) -> Option<PathBuf> {
    dotenvy::from_path(path).ok().map(|_| path.to_path_buf())
}

pub fn db_path() -> PathBuf {
    env::var(ENV_DB)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_FILE))
}

pub fn settings_path() -> PathBuf {
    env::var(ENV_SETTINGS)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub fn server_addr() -> String {
    env::var(ENV_ADDR).unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::from_file(dir.path().join("nope.json")).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.names(), ["Alice", "Bob"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"person_a_name": " Sam ", "person_b_name": "Jo"}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.person_a_name, "Sam");
        assert_eq!(settings.person_b_name, "Jo");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"person_b_name": "Jo"}"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.person_a_name, "Alice");
        assert_eq!(settings.person_b_name, "Jo");
    }

    #[test]
    fn test_rejects_duplicate_or_empty_names() {
        assert!(Settings::new("Sam", "Sam").is_err());
        assert!(Settings::new("", "Jo").is_err());

        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"person_a_name": "Jo", "person_b_name": "Jo"}"#).unwrap();
        assert!(Settings::from_file(&path).is_err());
    }

    #[test]
    fn test_env_file_populates_process_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "SPLIT_TRACKER_TEST_LOG_LEVEL=split_tracker=debug\n").unwrap();

        assert!(env::var("SPLIT_TRACKER_TEST_LOG_LEVEL").is_err());
        assert_eq!(load_env_file(&path), Some(path.clone()));
        assert_eq!(
            env::var("SPLIT_TRACKER_TEST_LOG_LEVEL").unwrap(),
            "split_tracker=debug"
        );

        assert_eq!(load_env_file(&dir.path().join("missing.env")), None);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        assert!(Settings::from_file(&path).is_err());
    }
}
