//! Application configuration for feedpublish.
//!
//! The feed list and run defaults live in `feedpublish.toml` (working
//! directory by default, or an explicit `--config` path).
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FeedPublishError, Result};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "feedpublish.toml";

// ---------------------------------------------------------------------------
// Config structs (matching feedpublish.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Target feeds, one per category.
    #[serde(default)]
    pub feeds: Vec<FeedDescriptor>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// What to do with artifact categories that have no configured feed.
    #[serde(default)]
    pub unmapped_categories: UnmappedPolicy,

    /// Per-request timeout for feed uploads, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// File extension identifying manifest files in the manifest directory.
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            unmapped_categories: UnmappedPolicy::default(),
            timeout_secs: default_timeout_secs(),
            manifest_extension: default_manifest_extension(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    100
}
fn default_manifest_extension() -> String {
    "json".into()
}

/// Handling of categories referenced by artifacts but missing from `[[feeds]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedPolicy {
    /// Fail the run before anything is published.
    #[default]
    Fail,
    /// Drop the affected groups with a warning.
    Skip,
}

/// `[[feeds]]` entry — a raw, not yet validated feed descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    /// Category key this feed receives (matched case-insensitively).
    #[serde(default)]
    pub category: String,
    /// Target feed URL.
    #[serde(default)]
    pub url: String,
    /// Feed type tag, passed through to the publisher.
    #[serde(rename = "type", default)]
    pub feed_type: String,
    /// Inline access token. Prefer `token_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Name of the env var holding the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

impl FeedDescriptor {
    /// Resolve the access token: inline value first, then `token_env`.
    ///
    /// Returns an empty string when neither yields a value, leaving the
    /// rejection to feed validation.
    pub fn resolve_token(&self) -> String {
        if let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) {
            return token.to_string();
        }
        match self.token_env.as_deref() {
            Some(var) => std::env::var(var).unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// Parses the CLI form `CATEGORY=URL|TYPE|TOKEN`.
///
/// Missing trailing parts are left empty so validation can report them
/// together with every other problem.
impl FromStr for FeedDescriptor {
    type Err = FeedPublishError;

    fn from_str(s: &str) -> Result<Self> {
        let (category, rest) = s.split_once('=').ok_or_else(|| {
            FeedPublishError::config(format!(
                "invalid feed '{s}': expected CATEGORY=URL|TYPE|TOKEN"
            ))
        })?;

        let mut parts = rest.splitn(3, '|').map(str::trim);
        let url = parts.next().unwrap_or_default().to_string();
        let feed_type = parts.next().unwrap_or_default().to_string();
        let token = parts.next().filter(|t| !t.is_empty()).map(String::from);

        Ok(Self {
            category: category.trim().to_string(),
            url,
            feed_type,
            token,
            token_env: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the config from `path`, or from `feedpublish.toml` in the working
/// directory. A missing default file yields defaults; a missing explicit
/// file is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => load_config_from(p),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default_path.exists() {
                tracing::debug!(path = ?default_path, "config file not found, using defaults");
                return Ok(AppConfig::default());
            }
            load_config_from(&default_path)
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FeedPublishError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        FeedPublishError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a starter config file with one example feed.
/// Refuses to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(FeedPublishError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| FeedPublishError::io(parent, e))?;
    }

    let config = AppConfig {
        defaults: DefaultsConfig::default(),
        feeds: vec![FeedDescriptor {
            category: "NetCore".into(),
            url: "https://feeds.example.com/netcore/v3/index.json".into(),
            feed_type: "NuGetFeed".into(),
            token: None,
            token_env: Some("NETCORE_FEED_TOKEN".into()),
        }],
    };
    let content =
        toml::to_string_pretty(&config).map_err(|e| FeedPublishError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| FeedPublishError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}
