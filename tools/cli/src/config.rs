//! CLI configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use coursesync_remote::stepik::STEPIK_API_URL;
use coursesync_sync::SyncConfig;

/// Environment variable that overrides the configured API token.
pub const TOKEN_ENV: &str = "COURSESYNC_TOKEN";

/// Settings read from `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Registered gateway name, `stepik` or `memory`.
    pub gateway: String,
    /// Base URL of the platform's REST API.
    pub api_url: String,
    /// OAuth bearer token.
    pub token: Option<String>,
    pub sync: SyncConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            gateway: "stepik".to_string(),
            api_url: STEPIK_API_URL.to_string(),
            token: None,
            sync: SyncConfig::default(),
        }
    }
}

impl CliConfig {
    /// `<config dir>/coursesync/config.json` for the current user.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine the configuration directory")?;
        Ok(dir.join("coursesync").join("config.json"))
    }

    /// Load the configuration, falling back to defaults if the file is missing.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Self::default());
        }

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url).with_context(|| format!("Invalid api_url '{}'", self.api_url))?;
        Url::parse(&self.sync.site_url)
            .with_context(|| format!("Invalid site_url '{}'", self.sync.site_url))?;
        Ok(())
    }

    /// Token to use, preferring the environment over the file.
    pub fn resolve_token(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.token.clone())
    }

    /// JSON handed to the gateway factory.
    pub fn gateway_config(&self, token: Option<String>) -> serde_json::Value {
        serde_json::json!({
            "api_url": self.api_url,
            "token": token,
        })
    }

    /// Copy suitable for printing, with the token hidden.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.token.is_some() {
            copy.token = Some("********".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load(&dir.path().join("none.json")).await.unwrap();

        assert_eq!(config, CliConfig::default());
        assert_eq!(config.gateway, "stepik");
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("coursesync").join("config.json");
        let mut config = CliConfig::default();
        config.gateway = "memory".to_string();
        config.sync.internal = true;

        config.save(&path).await.unwrap();
        let loaded = CliConfig::load(&path).await.unwrap();

        assert_eq!(loaded.gateway, "memory");
        assert!(loaded.sync.internal);
    }

    #[tokio::test]
    async fn test_partial_file_and_invalid_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        tokio::fs::write(&path, r#"{"token": "abc"}"#).await.unwrap();
        let config = CliConfig::load(&path).await.unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.api_url, STEPIK_API_URL);

        tokio::fs::write(&path, r#"{"api_url": "not a url"}"#).await.unwrap();
        assert!(CliConfig::load(&path).await.is_err());
    }

    #[test]
    fn test_token_resolution() {
        let config = CliConfig {
            token: Some("file".to_string()),
            ..CliConfig::default()
        };

        assert_eq!(config.resolve_token(Some("env".to_string())).as_deref(), Some("env"));
        assert_eq!(config.resolve_token(Some("  ".to_string())).as_deref(), Some("file"));
        assert_eq!(config.resolve_token(None).as_deref(), Some("file"));
        assert_eq!(CliConfig::default().resolve_token(None), None);
    }

    #[test]
    fn test_redacted_hides_token() {
        let config = CliConfig {
            token: Some("secret".to_string()),
            ..CliConfig::default()
        };
        assert_eq!(config.redacted().token.as_deref(), Some("********"));
        assert_eq!(config.gateway_config(config.token.clone())["token"], "secret");
    }
}
