//! Resolution engine
//!
//! Maps a tool name to the server that should handle it, trying the cheap
//! answers before the expensive ones:
//!
//! cache → static directory scan → heuristic table → live discovery+install
//!
//! A successful resolution writes a `tool-server:<name>` binding into the
//! cache for an hour; a failed one caches nothing, so a later request enters
//! the machine from the top and re-attempts discovery. The engine never
//! retries within one call and never returns a guessed id on failure.

use crate::cache::TtlCache;
use crate::directory::ServerDirectory;
use crate::models::SearchQuery;
use crate::provision::{ProvisionError, Provisioner};
use crate::registry::DiscoveryAggregator;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of a tool→server binding in the cache.
pub const BINDING_TTL: Duration = Duration::from_secs(3600);

/// Heuristic keyword families, evaluated top-down; the first row whose
/// keyword matches (and whose exclusion does not) wins. Order is the
/// contract:
/// 1. source-control hosting tools
/// 2. filesystem tools
/// 3. bare git tools (excluded from row 1 by the `github` guard there)
const HEURISTIC_PROVIDERS: &[(&[&str], &[&str], &str)] = &[
    (
        &["github", "repo", "issue", "pull"],
        &[],
        "@modelcontextprotocol/server-github",
    ),
    (
        &["file", "read", "write", "directory"],
        &[],
        "@modelcontextprotocol/server-filesystem",
    ),
    (
        &["git"],
        &["github"],
        "@modelcontextprotocol/server-git",
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Discovery produced zero candidates. Terminal for this call; a fresh
    /// request re-enters resolution from scratch.
    #[error("No provider found for tool '{0}'")]
    NoProviderFound(String),

    /// A candidate was found but could not be installed.
    #[error("Provider installation failed for tool '{tool}': {source}")]
    InstallFailed {
        tool: String,
        #[source]
        source: ProvisionError,
    },
}

fn binding_key(tool_name: &str) -> String {
    format!("tool-server:{}", tool_name)
}

pub struct ResolutionEngine {
    cache: Arc<TtlCache>,
    directory: Arc<ServerDirectory>,
    aggregator: Arc<DiscoveryAggregator>,
    provisioner: Arc<Provisioner>,
}

impl ResolutionEngine {
    pub fn new(
        cache: Arc<TtlCache>,
        directory: Arc<ServerDirectory>,
        aggregator: Arc<DiscoveryAggregator>,
        provisioner: Arc<Provisioner>,
    ) -> Self {
        Self {
            cache,
            directory,
            aggregator,
            provisioner,
        }
    }

    /// Resolves `tool_name` to a server id.
    pub async fn resolve(&self, tool_name: &str) -> Result<String, ResolveError> {
        // CACHE_CHECK
        if let Some(value) = self.cache.get(&binding_key(tool_name)).await {
            if let Some(id) = value.as_str() {
                tracing::debug!("Resolved '{}' -> '{}' from cache", tool_name, id);
                return Ok(id.to_string());
            }
        }

        // STATIC_CHECK
        if let Some(id) = self.static_lookup(tool_name).await {
            tracing::debug!("Resolved '{}' -> '{}' from directory", tool_name, id);
            return self.bind(tool_name, id).await;
        }

        // HEURISTIC_CHECK
        if let Some(id) = heuristic_lookup(tool_name) {
            tracing::debug!("Resolved '{}' -> '{}' by heuristic", tool_name, id);
            return self.bind(tool_name, id.to_string()).await;
        }

        // DISCOVER
        self.discover(tool_name).await
    }

    /// Scans declared tools of installed servers for a case-insensitive
    /// substring match in either direction. Empty declared tool names are
    /// skipped: an empty string is a substring of everything, and one sloppy
    /// registry payload must not claim every unknown tool.
    async fn static_lookup(&self, tool_name: &str) -> Option<String> {
        let needle = tool_name.to_lowercase();
        for (id, entry) in self.directory.entries().await {
            for declared in entry.metadata.tools.iter().filter(|d| !d.is_empty()) {
                let declared = declared.to_lowercase();
                if declared.contains(&needle) || needle.contains(&declared) {
                    return Some(id);
                }
            }
        }
        None
    }

    async fn discover(&self, tool_name: &str) -> Result<String, ResolveError> {
        let query = SearchQuery::for_tool(tool_name);
        let candidates = self.aggregator.search(&query).await;

        let Some(best) = candidates.into_iter().next() else {
            tracing::info!("No provider found for tool '{}'", tool_name);
            return Err(ResolveError::NoProviderFound(tool_name.to_string()));
        };

        if !self.directory.has(&best.id).await {
            self.provisioner
                .install(&best)
                .await
                .map_err(|source| ResolveError::InstallFailed {
                    tool: tool_name.to_string(),
                    source,
                })?;
        }

        tracing::info!("Resolved '{}' -> '{}' via discovery", tool_name, best.id);
        self.bind(tool_name, best.id).await
    }

    async fn bind(&self, tool_name: &str, id: String) -> Result<String, ResolveError> {
        self.cache
            .set(
                binding_key(tool_name),
                serde_json::Value::String(id.clone()),
                Some(BINDING_TTL),
            )
            .await;
        Ok(id)
    }
}

/// First matching keyword family wins; no scoring.
///
/// Keywords match whole tokens of the tool name (`github_create_issue` →
/// `github`, `create`, `issue`), not substrings, so a name like `list_repos`
/// falls through to discovery instead of being claimed by the `repo` family.
fn heuristic_lookup(tool_name: &str) -> Option<&'static str> {
    let name = tool_name.to_lowercase();
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for (keywords, exclusions, provider) in HEURISTIC_PROVIDERS {
        if exclusions.iter().any(|kw| tokens.contains(kw)) {
            continue;
        }
        if keywords.iter().any(|kw| tokens.contains(kw)) {
            return Some(*provider);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_family_wins_over_git() {
        assert_eq!(
            heuristic_lookup("github_create_issue"),
            Some("@modelcontextprotocol/server-github")
        );
        assert_eq!(
            heuristic_lookup("git_commit"),
            Some("@modelcontextprotocol/server-git")
        );
    }

    #[test]
    fn filesystem_family_matches_file_verbs() {
        assert_eq!(
            heuristic_lookup("read_text"),
            Some("@modelcontextprotocol/server-filesystem")
        );
        assert_eq!(
            heuristic_lookup("write_log"),
            Some("@modelcontextprotocol/server-filesystem")
        );
    }

    #[test]
    fn unknown_names_fall_through() {
        assert_eq!(heuristic_lookup("send_email"), None);
    }

    #[test]
    fn keywords_match_tokens_not_substrings() {
        // "repo" is a keyword but "repos" is a different token; these names
        // belong to discovery, not the heuristic table.
        assert_eq!(heuristic_lookup("list_repos"), None);
        assert_eq!(heuristic_lookup("profile_lookup"), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            heuristic_lookup("GitHub_List_Repos"),
            Some("@modelcontextprotocol/server-github")
        );
    }
}
