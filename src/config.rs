use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::release::error::ReleaseError;
use crate::release::http::DEFAULT_USER_AGENT;
use crate::release::sources;

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout the CLI imposes on each pull of an enumeration, in milliseconds (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Environment variable holding the GitHub bearer token
pub const GITHUB_TOKEN_ENV: &str = "GH_TOKEN";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FinderConfig {
    /// Bearer token for the GitHub GraphQL API
    pub github_token: Option<String>,
    pub user_agent: String,
    /// Caller-side timeout for each pull of an enumeration, in milliseconds
    pub fetch_timeout_ms: u64,
    pub endpoints: EndpointsConfig,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl FinderConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ReleaseError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReleaseError::Config(format!("failed to read {:?}: {}", path, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ReleaseError::Config(format!("failed to parse {:?}: {}", path, e)))
    }

    /// Override the GitHub token with a non-empty value from the environment
    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.github_token = Some(token);
        }
        self
    }
}

/// Base URLs of every upstream
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointsConfig {
    pub pypi: String,
    pub npm: String,
    pub crates_io: String,
    pub rubygems: String,
    pub hex: String,
    /// Tarball host for Hex packages
    pub hex_repo: String,
    pub nuget: String,
    pub packagist: String,
    pub maven: String,
    pub go_proxy: String,
    pub debian: String,
    pub launchpad: String,
    pub github_api: String,
    /// Host of GitHub tag archive downloads
    pub github: String,
    pub bitbucket_api: String,
    /// Host of Bitbucket repository pages
    pub bitbucket: String,
    /// Raw file root of the conan-center-index repository
    pub conan: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            pypi: sources::pypi::DEFAULT_BASE_URL.to_string(),
            npm: sources::npm::DEFAULT_BASE_URL.to_string(),
            crates_io: sources::crates_io::DEFAULT_BASE_URL.to_string(),
            rubygems: sources::rubygems::DEFAULT_BASE_URL.to_string(),
            hex: sources::hex::DEFAULT_BASE_URL.to_string(),
            hex_repo: sources::hex::DEFAULT_REPO_URL.to_string(),
            nuget: sources::nuget::DEFAULT_BASE_URL.to_string(),
            packagist: sources::composer::DEFAULT_BASE_URL.to_string(),
            maven: sources::maven::DEFAULT_BASE_URL.to_string(),
            go_proxy: sources::go_proxy::DEFAULT_BASE_URL.to_string(),
            debian: sources::debian::DEFAULT_BASE_URL.to_string(),
            launchpad: sources::launchpad::DEFAULT_BASE_URL.to_string(),
            github_api: sources::github::DEFAULT_API_URL.to_string(),
            github: sources::github::DEFAULT_WEB_URL.to_string(),
            bitbucket_api: sources::bitbucket::DEFAULT_API_URL.to_string(),
            bitbucket: sources::bitbucket::DEFAULT_WEB_URL.to_string(),
            conan: sources::conan::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Returns the path to the config directory for release-finder.
/// Uses $XDG_CONFIG_HOME/release-finder if XDG_CONFIG_HOME is set,
/// otherwise falls back to ~/.config/release-finder,
/// or ./release-finder if neither is available.
pub fn config_dir() -> PathBuf {
    config_dir_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the default config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn config_dir_with_env(xdg_config_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let config_dir = xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    config_dir.join("release-finder")
}
