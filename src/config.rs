use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const GITHUB_TOKEN_PLACEHOLDER: &str = "your_github_token_here";
const ITCH_KEY_PLACEHOLDER: &str = "your_itch_api_key_here";

// ============================================================================
// Main App Config
// ============================================================================

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default)]
    pub itch_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tileset_dir: Option<PathBuf>,
}

impl AppConfig {
    /// `config.json` in the working directory
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// Read `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write a template with placeholder credentials, replacing any existing file
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        let template = Self {
            github_token: Some(GITHUB_TOKEN_PLACEHOLDER.to_string()),
            itch_key: Some(ITCH_KEY_PLACEHOLDER.to_string()),
            cache_dir: None,
            tileset_dir: None,
        };
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&template).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json + "\n").map_err(io_err)
    }

    /// GitHub token, ignoring blanks and the template placeholder
    pub fn github_token(&self) -> Option<&str> {
        credential(self.github_token.as_deref(), GITHUB_TOKEN_PLACEHOLDER)
    }

    /// itch.io API key, ignoring blanks and the template placeholder
    pub fn itch_key(&self) -> Option<&str> {
        credential(self.itch_key.as_deref(), ITCH_KEY_PLACEHOLDER)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| crate::dfdl_path!("cache"))
    }

    /// Extra tilesets copied into the launcher, `./tilesets` by default
    pub fn tileset_dir(&self) -> PathBuf {
        self.tileset_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("tilesets"))
    }
}

fn credential<'a>(value: Option<&'a str>, placeholder: &str) -> Option<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join(AppConfig::default_path())).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tileset_dir(), PathBuf::from("tilesets"));
    }

    #[test]
    fn test_template_credentials_are_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        AppConfig::write_template(&path).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.github_token.as_deref(), Some(GITHUB_TOKEN_PLACEHOLDER));
        assert_eq!(config.github_token(), None);
        assert_eq!(config.itch_key(), None);
    }

    #[test]
    fn test_load_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"github_token": "ghp_abc", "itch_key": " key ", "cache_dir": "/srv/dfdl"}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.github_token(), Some("ghp_abc"));
        assert_eq!(config.itch_key(), Some("key"));
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/dfdl"));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ github_token: ").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
