//! Official registry mirrors
//!
//! Queries each configured mirror in turn and merges what answers. A mirror
//! that is down or returns garbage contributes nothing; the remaining mirrors
//! still count.

use super::{cached_result, get_json, server_array, store_result, RegistryClient};
use crate::cache::TtlCache;
use crate::models::{normalize_server_data, SearchQuery, ServerDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_MIRRORS: &[&str] = &[
    "https://registry.modelcontextprotocol.io/api/servers",
    "https://mcp-registry.anthropic.com/api/servers",
];

pub struct OfficialRegistryClient {
    mirrors: Vec<String>,
    http: reqwest::Client,
    cache: Arc<TtlCache>,
}

impl OfficialRegistryClient {
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self::with_mirrors(
            DEFAULT_MIRRORS.iter().map(|s| s.to_string()).collect(),
            cache,
        )
    }

    /// Mirror URLs are overridable for configuration and tests.
    pub fn with_mirrors(mirrors: Vec<String>, cache: Arc<TtlCache>) -> Self {
        Self {
            mirrors,
            http: reqwest::Client::new(),
            cache,
        }
    }

    async fn fetch_mirror(&self, url: &str) -> anyhow::Result<Vec<ServerDescriptor>> {
        let data = get_json(&self.http, url, &[], REQUEST_TIMEOUT, None).await?;
        Ok(server_array(&data)
            .iter()
            .filter_map(normalize_server_data)
            .collect())
    }

    /// Looks up one server by id across the mirrors, first answer wins.
    /// Cached under `server-details:<id>` for the standard result TTL.
    pub async fn server_details(&self, server_id: &str) -> Option<ServerDescriptor> {
        let cache_key = format!("server-details:{}", server_id);
        if let Some(value) = self.cache.get(&cache_key).await {
            if let Ok(server) = serde_json::from_value(value) {
                return Some(server);
            }
        }

        for mirror in &self.mirrors {
            let url = format!("{}/{}", mirror, urlencode(server_id));
            match get_json(&self.http, &url, &[], REQUEST_TIMEOUT, None).await {
                Ok(data) => {
                    if let Some(server) = normalize_server_data(&data) {
                        if let Ok(value) = serde_json::to_value(&server) {
                            self.cache
                                .set(&cache_key, value, Some(super::SEARCH_RESULT_TTL))
                                .await;
                        }
                        return Some(server);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to get details for {} from {}: {}", server_id, mirror, e);
                }
            }
        }
        None
    }
}

/// Minimal percent-encoding for path segments; ids may contain `/` and `@`.
fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[async_trait]
impl RegistryClient for OfficialRegistryClient {
    fn name(&self) -> &'static str {
        "official-registry"
    }

    async fn search(&self, query: &SearchQuery) -> Vec<ServerDescriptor> {
        let cache_key = query.cache_key(self.name());
        if let Some(servers) = cached_result(&self.cache, &cache_key).await {
            return servers;
        }

        let mut results = Vec::new();
        let mut reachable = 0usize;
        for mirror in &self.mirrors {
            match self.fetch_mirror(mirror).await {
                Ok(servers) => {
                    reachable += 1;
                    results.extend(servers.into_iter().filter(|s| query.matches(s)));
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch from {}: {}", mirror, e);
                }
            }
        }

        let unique = super::dedup_by_id(results);
        // Only memoize answers some mirror actually gave; a full outage should
        // be retried on the next search.
        if reachable > 0 {
            store_result(&self.cache, &cache_key, &unique).await;
        }
        unique
    }
}
