//! Environment-driven configuration
//!
//! Everything has a working default so a bare `mcphub` starts; overrides come
//! from the environment (loaded from `.env` by main).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub port: u16,
    /// Persisted cache document.
    pub cache_file: PathBuf,
    pub cache_max_entries: usize,
    /// Server directory document (the `mcpServers` config).
    pub directory_file: PathBuf,
    /// Isolated root packages are installed under.
    pub install_root: PathBuf,
    pub install_timeout: Duration,
    /// Token for the code-search and known-orgs sources. Unset disables them.
    pub github_token: Option<String>,
    pub official_registry_urls: Vec<String>,
    pub community_registry_url: Option<String>,
    pub github_api_url: Option<String>,
}

impl HubConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_env("PORT", 3000),
            cache_file: env::var("MCPHUB_CACHE_FILE")
                .unwrap_or_else(|_| "data/cache.json".to_string())
                .into(),
            cache_max_entries: parse_env(
                "MCPHUB_CACHE_MAX_ENTRIES",
                crate::cache::DEFAULT_MAX_ENTRIES,
            ),
            directory_file: env::var("MCPHUB_CONFIG_FILE")
                .unwrap_or_else(|_| "config/mcp-config.json".to_string())
                .into(),
            install_root: env::var("MCPHUB_INSTALL_ROOT")
                .unwrap_or_else(|_| "servers".to_string())
                .into(),
            install_timeout: Duration::from_secs(parse_env("MCPHUB_INSTALL_TIMEOUT_SECS", 300)),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            official_registry_urls: env::var("MCPHUB_REGISTRY_URLS")
                .ok()
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            community_registry_url: env::var("MCPHUB_COMMUNITY_REGISTRY_URL").ok(),
            github_api_url: env::var("MCPHUB_GITHUB_API_URL").ok(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
