//! Registry sources and the discovery aggregator
//!
//! Each source implements [`RegistryClient`]: normalize whatever the source
//! returns into [`ServerDescriptor`]s, filter against the query, and memoize
//! the filtered result. A source degrades to an empty result on any failure —
//! network, parsing, or authorization — so one dead registry never fails a
//! search.

pub mod aggregator;
pub mod community;
pub mod github;
pub mod official;
pub mod orgs;

pub use aggregator::DiscoveryAggregator;
pub use community::CommunityRegistryClient;
pub use github::CodeSearchClient;
pub use official::OfficialRegistryClient;
pub use orgs::KnownOrgsClient;

use crate::cache::TtlCache;
use crate::models::{SearchQuery, ServerDescriptor};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// TTL applied to every memoized search result.
pub const SEARCH_RESULT_TTL: Duration = Duration::from_secs(3600);

pub(crate) const USER_AGENT: &str = "mcphub/0.1";

/// One external registry source.
///
/// `search` always returns; failures are absorbed and logged at warn level by
/// the implementation.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Short source name used in logs and cache key prefixes.
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Vec<ServerDescriptor>;
}

/// GET a JSON document with a bounded timeout and standard headers.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
    bearer: Option<&str>,
) -> anyhow::Result<Value> {
    let mut request = http
        .get(url)
        .query(query)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(timeout);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        anyhow::bail!("source returned {}", response.status());
    }
    Ok(response.json().await?)
}

/// Registries disagree on envelope shape: `{servers: [...]}`, `{items: [...]}`
/// or a bare array. Anything else is treated as empty.
pub(crate) fn server_array(data: &Value) -> Vec<Value> {
    let items = data
        .get("servers")
        .or_else(|| data.get("items"))
        .unwrap_or(data);
    items.as_array().cloned().unwrap_or_default()
}

pub(crate) async fn cached_result(cache: &TtlCache, key: &str) -> Option<Vec<ServerDescriptor>> {
    let value = cache.get(key).await?;
    serde_json::from_value(value).ok()
}

pub(crate) async fn store_result(cache: &TtlCache, key: &str, servers: &[ServerDescriptor]) {
    match serde_json::to_value(servers) {
        Ok(value) => cache.set(key, value, Some(SEARCH_RESULT_TTL)).await,
        Err(e) => tracing::warn!("Failed to serialize search result for caching: {}", e),
    }
}

/// Keeps the first occurrence of each id; later duplicates are the same
/// logical server seen through another source.
pub(crate) fn dedup_by_id(servers: Vec<ServerDescriptor>) -> Vec<ServerDescriptor> {
    let mut seen = std::collections::HashSet::new();
    servers
        .into_iter()
        .filter(|s| seen.insert(s.id.clone()))
        .collect()
}
