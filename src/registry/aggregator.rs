//! Discovery aggregator
//!
//! Fans a query out to every configured registry source concurrently, merges
//! the answers, deduplicates by id (first seen wins), and ranks by a
//! popularity-dominant score. The merged result is memoized so a repeated
//! identical query within the window performs no network work at all.

use super::{cached_result, dedup_by_id, store_result, RegistryClient};
use crate::cache::TtlCache;
use crate::models::{SearchQuery, ServerDescriptor};
use std::cmp::Ordering;
use std::sync::Arc;

pub struct DiscoveryAggregator {
    clients: Vec<Arc<dyn RegistryClient>>,
    cache: Arc<TtlCache>,
}

impl DiscoveryAggregator {
    pub fn new(clients: Vec<Arc<dyn RegistryClient>>, cache: Arc<TtlCache>) -> Self {
        Self { clients, cache }
    }

    /// Ranked, deduplicated union of every source's answer.
    ///
    /// Source order is the configured client order; each source's internal
    /// order is preserved, which is what makes first-seen-wins dedup and the
    /// stable ranking deterministic.
    pub async fn search(&self, query: &SearchQuery) -> Vec<ServerDescriptor> {
        let cache_key = query.cache_key("discovery");
        if let Some(servers) = cached_result(&self.cache, &cache_key).await {
            return servers;
        }

        // Fan out on separate tasks; collecting in spawn order keeps the
        // merge deterministic while the queries still run concurrently.
        let mut handles = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            let client = Arc::clone(client);
            let query = query.clone();
            let name = client.name();
            handles.push((name, tokio::spawn(async move { client.search(&query).await })));
        }

        let mut merged = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(servers) => merged.extend(servers),
                Err(e) => tracing::warn!("Registry source '{}' task failed: {}", name, e),
            }
        }

        let mut ranked = dedup_by_id(merged);
        rank(&mut ranked);

        // An empty result is not memoized: it is either a miss the caller may
        // retry or a full outage, and both should hit the sources again.
        if !ranked.is_empty() {
            store_result(&self.cache, &cache_key, &ranked).await;
        }
        ranked
    }
}

/// Composite relevance score. Popularity dominates; the recency term only
/// separates servers of equal popularity. The calibration is inherited
/// behavior: the contract is the relative ordering, not the arithmetic.
fn score(server: &ServerDescriptor) -> f64 {
    server.popularity as f64 * 10.0 + server.last_updated.timestamp_millis() as f64 / 1e9
}

/// Stable descending sort, so score ties keep their merge (insertion) order.
fn rank(servers: &mut [ServerDescriptor]) {
    servers.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalize_server_data;
    use serde_json::json;

    fn server(id: &str, popularity: u64, last_updated: &str) -> ServerDescriptor {
        normalize_server_data(&json!({
            "id": id,
            "stars": popularity,
            "lastUpdated": last_updated,
        }))
        .unwrap()
    }

    #[test]
    fn popularity_dominates_recency() {
        // A is old but popular, B is fresh but niche.
        let mut servers = vec![
            server("b", 10, "2026-08-01T00:00:00Z"),
            server("a", 100, "2019-01-01T00:00:00Z"),
        ];
        rank(&mut servers);
        assert_eq!(servers[0].id, "a");
        assert_eq!(servers[1].id, "b");
    }

    #[test]
    fn recency_breaks_equal_popularity() {
        let mut servers = vec![
            server("old", 50, "2020-01-01T00:00:00Z"),
            server("new", 50, "2026-08-01T00:00:00Z"),
        ];
        rank(&mut servers);
        assert_eq!(servers[0].id, "new");
    }

    #[test]
    fn exact_ties_keep_insertion_order() {
        let mut servers = vec![
            server("first", 5, "2026-01-01T00:00:00Z"),
            server("second", 5, "2026-01-01T00:00:00Z"),
        ];
        rank(&mut servers);
        assert_eq!(servers[0].id, "first");
        assert_eq!(servers[1].id, "second");
    }
}
