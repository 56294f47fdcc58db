//! Known-organization listings
//!
//! Lists public repositories of organizations known to publish MCP servers
//! and keeps the ones that look like servers. Token-gated like code search.

use super::github::repo_to_descriptor;
use super::{cached_result, get_json, store_result, RegistryClient};
use crate::cache::TtlCache;
use crate::models::{SearchQuery, ServerDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_API_URL: &str = "https://api.github.com";

const KNOWN_ORGS: &[&str] = &["modelcontextprotocol", "anthropics", "mcp-community"];

pub struct KnownOrgsClient {
    api_url: String,
    token: Option<String>,
    orgs: Vec<String>,
    http: reqwest::Client,
    cache: Arc<TtlCache>,
}

impl KnownOrgsClient {
    pub fn new(token: Option<String>, cache: Arc<TtlCache>) -> Self {
        Self::with_api_url(DEFAULT_API_URL.to_string(), token, cache)
    }

    pub fn with_api_url(api_url: String, token: Option<String>, cache: Arc<TtlCache>) -> Self {
        Self {
            api_url,
            token,
            orgs: KNOWN_ORGS.iter().map(|s| s.to_string()).collect(),
            http: reqwest::Client::new(),
            cache,
        }
    }

    async fn list_org(
        &self,
        org: &str,
        token: &str,
        query: &SearchQuery,
    ) -> anyhow::Result<Vec<ServerDescriptor>> {
        let url = format!("{}/orgs/{}/repos", self.api_url, org);
        let params = [
            ("type", "public".to_string()),
            ("per_page", "50".to_string()),
        ];
        let data = get_json(&self.http, &url, &params, REQUEST_TIMEOUT, Some(token)).await?;

        let repos = data.as_array().cloned().unwrap_or_default();
        Ok(repos
            .iter()
            .filter(|repo| {
                repo.get("name")
                    .and_then(|v| v.as_str())
                    .map(|name| name.contains("server") || name.contains("mcp"))
                    .unwrap_or(false)
            })
            .filter_map(|repo| repo_to_descriptor(repo, Some(org)))
            .filter(|s| query.matches(s))
            .collect())
    }
}

#[async_trait]
impl RegistryClient for KnownOrgsClient {
    fn name(&self) -> &'static str {
        "known-orgs"
    }

    async fn search(&self, query: &SearchQuery) -> Vec<ServerDescriptor> {
        let Some(token) = self.token.clone() else {
            return Vec::new();
        };

        let cache_key = query.cache_key(self.name());
        if let Some(servers) = cached_result(&self.cache, &cache_key).await {
            return servers;
        }

        let mut results = Vec::new();
        let mut reachable = 0usize;
        for org in &self.orgs {
            match self.list_org(org, &token, query).await {
                Ok(servers) => {
                    reachable += 1;
                    results.extend(servers);
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch repos for {}: {}", org, e);
                }
            }
        }

        if reachable > 0 {
            store_result(&self.cache, &cache_key, &results).await;
        }
        results
    }
}
