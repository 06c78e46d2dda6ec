use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Any way the configuration can be unusable. All variants are fatal:
/// they are surfaced once at startup, before any component is constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Numeric GitHub App ID, the `iss` claim of app-level JWTs.
    pub app_id: u64,
    /// RSA private key in PEM form.
    pub private_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Display name of the workflow whose runs we track; all other
    /// workflow_run events are ignored.
    pub workflow_name: String,
    /// Workflow file name (or numeric id) used for dispatch.
    pub workflow_id: String,
    #[serde(default = "default_git_ref", rename = "ref")]
    pub git_ref: String,
    /// Paths excluded from the packaged archive, passed through as a
    /// dispatch input when non-empty.
    #[serde(default)]
    pub ignored_content: Vec<String>,
    /// How many recent webhook delivery IDs to remember for dedup.
    #[serde(default = "default_delivery_window")]
    pub delivery_window: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory where downloaded artifacts and logs are written.
    pub output_dir: PathBuf,
}

fn default_api_version() -> String { "2022-11-28".to_string() }

fn default_git_ref() -> String { "main".to_string() }

fn default_delivery_window() -> usize { 1024 }

impl Config {
    /// Load and validate the configuration in one step. Every problem is a
    /// typed `ConfigError`; the process must refuse to start on any of them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.app_id == 0 {
            return Err(invalid("github.app_id", "must be set"));
        }
        if let Err(e) = jsonwebtoken::EncodingKey::from_rsa_pem(self.github.private_key.as_bytes())
        {
            return Err(invalid("github.private_key", format!("not a valid RSA PEM key: {e}")));
        }
        if self.github.webhook_secret.is_empty() {
            return Err(invalid("github.webhook_secret", "must not be empty"));
        }
        if self.github.workflow_name.is_empty() {
            return Err(invalid("github.workflow_name", "must not be empty"));
        }
        if self.github.workflow_id.is_empty() {
            return Err(invalid("github.workflow_id", "must not be empty"));
        }
        if self.github.delivery_window == 0 {
            return Err(invalid("github.delivery_window", "must be at least 1"));
        }
        if self.storage.output_dir.as_os_str().is_empty() {
            return Err(invalid("storage.output_dir", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig { port: 3000 },
            github: GitHubConfig {
                app_id: 1234,
                private_key: "not a key".to_string(),
                webhook_secret: "secret".to_string(),
                api_version: default_api_version(),
                workflow_name: "Zip and Upload Repository".to_string(),
                workflow_id: "zip-and-upload.yml".to_string(),
                git_ref: default_git_ref(),
                ignored_content: Vec::new(),
                delivery_window: default_delivery_window(),
            },
            storage: StorageConfig { output_dir: PathBuf::from("/tmp/courier") },
        }
    }

    #[test]
    fn rejects_malformed_private_key() {
        let config = base_config();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "github.private_key", .. })
        ));
    }

    #[test]
    fn rejects_zero_app_id() {
        let mut config = base_config();
        config.github.app_id = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "github.app_id", .. })
        ));
    }

    #[test]
    fn parses_yaml_with_defaults() {
        let yaml = r#"
server:
  port: 3000
github:
  app_id: 1234
  private_key: "pem"
  webhook_secret: "secret"
  workflow_name: "Zip and Upload Repository"
  workflow_id: "zip-and-upload.yml"
storage:
  output_dir: "/var/lib/courier"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.github.api_version, "2022-11-28");
        assert_eq!(config.github.git_ref, "main");
        assert_eq!(config.github.delivery_window, 1024);
        assert!(config.github.ignored_content.is_empty());
    }
}
