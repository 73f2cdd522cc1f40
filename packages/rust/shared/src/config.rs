//! Application configuration for the state crawler.
//!
//! User config lives at `~/.statecrawl/statecrawl.toml`. CLI flags override
//! config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateCrawlError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "statecrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".statecrawl";

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub crawl: CrawlPoliciesConfig,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// Minimum number of shared visits to two templatized pages' bucket
    /// before they are eligible for aggregation (see the Page Map's
    /// aggregation rationale).
    #[serde(default = "default_similarity_join_threshold")]
    pub similarity_join_threshold: u32,

    /// User-Agent header sent on every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            similarity_join_threshold: default_similarity_join_threshold(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_similarity_join_threshold() -> u32 {
    3
}
fn default_user_agent() -> String {
    "statecrawl/0.1".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// Runtime crawl configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Minimum shared-visit count for aggregation eligibility.
    pub similarity_join_threshold: u32,
    /// User-Agent header sent on every request.
    pub user_agent: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            similarity_join_threshold: config.crawl.similarity_join_threshold,
            user_agent: config.crawl.user_agent.clone(),
            request_timeout_secs: config.crawl.request_timeout_secs,
        }
    }
}

/// Get the path to the config directory (`~/.statecrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| StateCrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.statecrawl/statecrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StateCrawlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StateCrawlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StateCrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StateCrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StateCrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("similarity_join_threshold"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.crawl.similarity_join_threshold, 3);
    }

    #[test]
    fn crawl_config_from_app_config() {
        let app = AppConfig::default();
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.similarity_join_threshold, 3);
        assert_eq!(crawl.request_timeout_secs, 30);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[crawl]
similarity_join_threshold = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.crawl.similarity_join_threshold, 5);
        assert_eq!(config.crawl.user_agent, "statecrawl/0.1");
    }
}
