//! Source-host code search
//!
//! Searches GitHub-style repository search for MCP server repos. Requires a
//! token; without one the client answers empty without issuing a call.
//! Repository hits carry no tool lists, so package name and capabilities are
//! derived from the repo name and description.

use super::{cached_result, get_json, store_result, RegistryClient};
use crate::cache::TtlCache;
use crate::models::{parse_timestamp, SearchQuery, ServerDescriptor};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Capability families inferred from repository text, checked in order.
const CAPABILITY_KEYWORDS: &[(&str, &[&str])] = &[
    ("github", &["github", "repository", "repo", "issue", "pr", "pull request"]),
    ("filesystem", &["file", "filesystem", "disk", "directory"]),
    ("git", &["git", "version control"]),
    ("database", &["database", "sql", "postgres", "mysql", "sqlite"]),
    ("api", &["api", "rest", "http", "fetch"]),
    ("search", &["search", "brave", "google"]),
    ("ai", &["ai", "openai", "anthropic", "llm"]),
];

pub struct CodeSearchClient {
    api_url: String,
    token: Option<String>,
    http: reqwest::Client,
    cache: Arc<TtlCache>,
}

impl CodeSearchClient {
    pub fn new(token: Option<String>, cache: Arc<TtlCache>) -> Self {
        Self::with_api_url(DEFAULT_API_URL.to_string(), token, cache)
    }

    pub fn with_api_url(api_url: String, token: Option<String>, cache: Arc<TtlCache>) -> Self {
        Self {
            api_url,
            token,
            http: reqwest::Client::new(),
            cache,
        }
    }

    fn search_terms(query: &SearchQuery) -> String {
        let mut terms = vec!["mcp-server".to_string()];
        if let Some(capability) = &query.capability {
            terms.push(capability.clone());
        }
        terms.extend(query.keywords.iter().cloned());
        terms.push("language:typescript OR language:javascript".to_string());
        terms.join(" ")
    }
}

/// Maps a repository item from the search API into a descriptor.
pub(crate) fn repo_to_descriptor(repo: &Value, author: Option<&str>) -> Option<ServerDescriptor> {
    let id = repo.get("full_name")?.as_str()?.to_string();
    let name = repo
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&id)
        .to_string();
    let description = repo
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let author = match author {
        Some(author) => author.to_string(),
        None => repo
            .pointer("/owner/login")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
    };

    Some(ServerDescriptor {
        repository: repo
            .get("html_url")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        package: Some(derive_package(&name)),
        version: "latest".to_string(),
        capabilities: extract_capabilities(&description, &name),
        tools: Vec::new(),
        popularity: repo
            .get("stargazers_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        last_updated: repo
            .get("updated_at")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now),
        id,
        name,
        description,
        author,
    })
}

/// Repos published under the conventional `server-*` name live in the
/// `@modelcontextprotocol` npm scope.
pub(crate) fn derive_package(repo_name: &str) -> String {
    if repo_name.starts_with("server-") {
        format!("@modelcontextprotocol/{}", repo_name)
    } else {
        repo_name.to_string()
    }
}

pub(crate) fn extract_capabilities(description: &str, name: &str) -> Vec<String> {
    let text = format!("{} {}", description, name).to_lowercase();
    CAPABILITY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(capability, _)| capability.to_string())
        .collect()
}

#[async_trait]
impl RegistryClient for CodeSearchClient {
    fn name(&self) -> &'static str {
        "code-search"
    }

    async fn search(&self, query: &SearchQuery) -> Vec<ServerDescriptor> {
        let Some(token) = &self.token else {
            // No credentials configured: stay offline rather than burn
            // unauthenticated rate limits.
            return Vec::new();
        };

        let cache_key = query.cache_key(self.name());
        if let Some(servers) = cached_result(&self.cache, &cache_key).await {
            return servers;
        }

        let url = format!("{}/search/repositories", self.api_url);
        let params = [
            ("q", Self::search_terms(query)),
            ("sort", "stars".to_string()),
            ("order", "desc".to_string()),
            ("per_page", "20".to_string()),
        ];

        match get_json(&self.http, &url, &params, REQUEST_TIMEOUT, Some(token)).await {
            Ok(data) => {
                let servers: Vec<ServerDescriptor> = data
                    .get("items")
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|repo| repo_to_descriptor(repo, None))
                            .collect()
                    })
                    .unwrap_or_default();
                store_result(&self.cache, &cache_key, &servers).await;
                servers
            }
            Err(e) => {
                tracing::warn!("Code search failed: {}", e);
                Vec::new()
            }
        }
    }
}
