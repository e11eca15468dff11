//! Layered configuration: defaults, then an optional TOML file, then
//! `REMPO_*` environment variables.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::scanner::{ScanOptions, DEFAULT_MAX_DEPTH};
use crate::summary::DEFAULT_MODEL;

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("app", "rempo", "rempo"));

/// `<platform config dir>/rempo/config.toml`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Where the persistent store lives by default. Falls back to the current
/// directory on platforms without a data dir.
pub fn default_store_path() -> PathBuf {
    PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.data_dir().join("store.json"))
        .unwrap_or_else(|| PathBuf::from("rempo-store.json"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    pub max_depth: usize,
    pub include_hidden: bool,
    pub extra_ignore_patterns: Vec<String>,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            include_hidden: false,
            extra_ignore_patterns: Vec::new(),
        }
    }
}

impl ScanningConfig {
    pub fn to_options(&self) -> ScanOptions {
        ScanOptions {
            max_depth: self.max_depth,
            include_hidden: self.include_hidden,
            extra_ignore_patterns: self.extra_ignore_patterns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    /// Summarize every repository right after a scan finds it.
    pub auto_summarize_on_scan: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_summarize_on_scan: false,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.5,
            max_tokens: 150,
        }
    }
}

impl AiConfig {
    /// Configured key, or the `GROQ_API_KEY` environment variable. Empty
    /// strings count as absent.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("GROQ_API_KEY").ok().filter(|key| !key.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanning: ScanningConfig,
    pub cache: CacheConfig,
    pub ai: AiConfig,
}

impl AppConfig {
    /// Loads configuration. An explicitly given file must exist; the
    /// default location is optional. Environment variables use the
    /// `REMPO_` prefix with `__` between section and key, e.g.
    /// `REMPO_SCANNING__MAX_DEPTH=3`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()));
        } else if let Some(default) = default_config_path() {
            builder = builder.add_source(File::from(default).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("REMPO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Renders the configuration as TOML, used by `init` to write a
    /// starter file.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_the_dashboard() {
        let config = AppConfig::default();
        assert_eq!(config.scanning.max_depth, 6);
        assert!(!config.scanning.include_hidden);
        assert!(config.cache.enabled);
        assert!(config.ai.enabled);
        assert!(!config.ai.auto_summarize_on_scan);
        assert_eq!(config.ai.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_partial_file_overrides_only_named_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "[scanning]\nmax_depth = 3\n\n[ai]\nenabled = false\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scanning.max_depth, 3);
        assert!(!config.scanning.include_hidden);
        assert!(!config.ai.enabled);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = AppConfig::load(Some(&tmp.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_rendered_toml_parses_back() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        let back: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_empty_api_key_counts_as_absent() {
        let config = AiConfig {
            api_key: Some(String::new()),
            ..AiConfig::default()
        };
        // Ignores the empty configured key; may still pick up the
        // environment, so only assert when the variable is unset.
        if std::env::var("GROQ_API_KEY").is_err() {
            assert!(config.resolved_api_key().is_none());
        }
    }
}
