//! Configuration loading.
//!
//! Resolution order for the file: explicit path, `GRADMAP_CONFIG`, then
//! `<config dir>/gradmap/config.toml`. A missing default file is not an error;
//! compiled defaults apply. `DATABASE_URL` switches the store to Postgres and
//! `GEMINI_API_KEY` supplies the advisor key when the file has none.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::gate::{AccessGate, DEFAULT_ADMIN_CODE, DEFAULT_USER_CODE};

pub const CONFIG_ENV_VAR: &str = "GRADMAP_CONFIG";
pub const DATABASE_ENV_VAR: &str = "DATABASE_URL";
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub access: AccessConfig,
    pub store: StoreConfig,
    pub advisor: AdvisorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub user_code: String,
    pub admin_code: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            user_code: DEFAULT_USER_CODE.to_string(),
            admin_code: DEFAULT_ADMIN_CODE.to_string(),
        }
    }
}

impl AccessConfig {
    pub fn gate(&self) -> Result<AccessGate> {
        AccessGate::new(&self.user_code, &self.admin_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_data_file")]
        path: PathBuf,
    },
    Postgres {
        url: String,
        #[serde(default = "default_pool_size")]
        max_connections: u32,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_data_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

fn default_data_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("gradmap"))
        .unwrap_or_else(|| PathBuf::from("./gradmap_data"))
        .join("students.json")
}

fn default_pool_size() -> u32 {
    5
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gradmap").join("config.toml"))
}

impl AppConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads the file (if any) and applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::read(&path)?,
            None => match default_config_file().filter(|path| path.exists()) {
                Some(path) => Self::read(&path)?,
                None => {
                    tracing::warn!("no config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(
            std::env::var(DATABASE_ENV_VAR).ok(),
            std::env::var(API_KEY_ENV_VAR).ok(),
        );
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&raw)
    }

    fn apply_env(&mut self, database_url: Option<String>, api_key: Option<String>) {
        if let Some(url) = database_url.filter(|url| !url.is_empty()) {
            let max_connections = match &self.store {
                StoreConfig::Postgres { max_connections, .. } => *max_connections,
                _ => default_pool_size(),
            };
            self.store = StoreConfig::Postgres {
                url,
                max_connections,
            };
        }
        if self.advisor.api_key.is_none() {
            self.advisor.api_key = api_key.filter(|key| !key.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.access.user_code, "chu123456");
        assert_eq!(config.access.admin_code, "hcy123456");
        assert!(matches!(config.store, StoreConfig::File { .. }));
        assert_eq!(config.advisor.timeout_secs, 30);
    }

    #[test]
    fn parses_every_section() {
        let config = AppConfig::from_toml(
            r#"
            [access]
            user_code = "cohort"
            admin_code = "steward"

            [store]
            backend = "postgres"
            url = "postgres://localhost/gradmap"

            [advisor]
            api_key = "k"
            model = "gemini-test"
            "#,
        )
        .unwrap();

        let gate = config.access.gate().unwrap();
        assert_eq!(
            gate.authenticate("steward").unwrap(),
            crate::models::AccessLevel::Admin
        );
        assert_eq!(
            config.store,
            StoreConfig::Postgres {
                url: "postgres://localhost/gradmap".to_string(),
                max_connections: 5,
            }
        );
        assert_eq!(config.advisor.model, "gemini-test");
        assert!(config.advisor.endpoint.starts_with("https://"));
    }

    #[test]
    fn file_backend_path_can_be_set() {
        let config = AppConfig::from_toml("[store]\nbackend = \"file\"\npath = \"/tmp/s.json\"\n").unwrap();
        assert_eq!(
            config.store,
            StoreConfig::File {
                path: PathBuf::from("/tmp/s.json")
            }
        );
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let err = AppConfig::from_toml("[store]\nbackend = \"redis\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_store_and_key() {
        let mut config = AppConfig::default();
        config.apply_env(Some("postgres://db/gradmap".to_string()), Some("env-key".to_string()));
        assert!(matches!(config.store, StoreConfig::Postgres { ref url, .. } if url == "postgres://db/gradmap"));
        assert_eq!(config.advisor.api_key.as_deref(), Some("env-key"));

        let mut keyed = AppConfig::from_toml("[advisor]\napi_key = \"file-key\"\n").unwrap();
        keyed.apply_env(None, Some("env-key".to_string()));
        assert_eq!(keyed.advisor.api_key.as_deref(), Some("file-key"));
        assert!(matches!(keyed.store, StoreConfig::File { .. }));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(AppConfig::load(Some(&missing)), Err(Error::Config(_))));
    }
}
