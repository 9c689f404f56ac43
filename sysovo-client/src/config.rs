/// Client configuration.
/// Reads client.json from ~/.config/sysovo/client.json (or platform
/// equivalent), then applies SYSOVO_* environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "SYSOVO_API_URL";
pub const ENV_TOKEN: &str = "SYSOVO_TOKEN";
pub const ENV_ACTOR_ID: &str = "SYSOVO_ACTOR_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    /// User id for the assigned-to-me view.
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            actor_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(actor) = get(ENV_ACTOR_ID) {
            self.actor_id = Some(actor);
        }
        self
    }
}

/// Default config path: ~/.config/sysovo/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sysovo")
        .join("client.json")
}

/// Read and parse the config file, failing on any problem.
pub fn read_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load config from path. Returns defaults if the file is missing or
/// unparseable.
pub fn load_config(path: &Path) -> ClientConfig {
    match read_config(path) {
        Ok(config) => config,
        Err(ConfigError::Read { .. }) => {
            log::info!(target: "sysovo.config", "No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
        Err(e) => {
            log::warn!(target: "sysovo.config", "{}", e);
            ClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.json");
        let config = load_config(&path);
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(matches!(read_config(&path), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.json");
        fs::write(&path, r#"{"token": "abc", "actorId": "u1"}"#).unwrap();
        let config = load_config(&path);
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.actor_id.as_deref(), Some("u1"));
        assert_eq!(config.api_url, "http://localhost:5000");
    }

    #[test]
    fn test_unparseable_file_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_config(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(load_config(&path), ClientConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let config = ClientConfig {
            token: Some("from-file".to_string()),
            ..ClientConfig::default()
        }
        .with_overrides(env(&[
            (ENV_API_URL, "https://ops.example.com"),
            (ENV_TOKEN, "from-env"),
            (ENV_ACTOR_ID, ""),
        ]));
        assert_eq!(config.api_url, "https://ops.example.com");
        assert_eq!(config.token.as_deref(), Some("from-env"));
        assert_eq!(config.actor_id, None);
    }
}
