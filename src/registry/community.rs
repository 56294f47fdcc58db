//! Community registry index (mcp.run-style)

use super::{cached_result, get_json, server_array, store_result, RegistryClient};
use crate::cache::TtlCache;
use crate::models::{normalize_server_data, SearchQuery, ServerDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_URL: &str = "https://mcp.run/api/v1/servers";

pub struct CommunityRegistryClient {
    url: String,
    http: reqwest::Client,
    cache: Arc<TtlCache>,
}

impl CommunityRegistryClient {
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self::with_url(DEFAULT_URL.to_string(), cache)
    }

    pub fn with_url(url: String, cache: Arc<TtlCache>) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
            cache,
        }
    }
}

#[async_trait]
impl RegistryClient for CommunityRegistryClient {
    fn name(&self) -> &'static str {
        "community-registry"
    }

    async fn search(&self, query: &SearchQuery) -> Vec<ServerDescriptor> {
        let cache_key = query.cache_key(self.name());
        if let Some(servers) = cached_result(&self.cache, &cache_key).await {
            return servers;
        }

        match get_json(&self.http, &self.url, &[], REQUEST_TIMEOUT, None).await {
            Ok(data) => {
                let servers: Vec<ServerDescriptor> = server_array(&data)
                    .iter()
                    .filter_map(normalize_server_data)
                    .filter(|s| query.matches(s))
                    .collect();
                store_result(&self.cache, &cache_key, &servers).await;
                servers
            }
            Err(e) => {
                // Not cached: a degraded source should answer again on the
                // next search, not memoize its outage for an hour.
                tracing::warn!("Community registry search failed: {}", e);
                Vec::new()
            }
        }
    }
}
