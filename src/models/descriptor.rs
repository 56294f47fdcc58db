//! Server descriptors and search queries
//!
//! [`ServerDescriptor`] is the common shape every registry source normalizes
//! into before results leave a client; [`SearchQuery`] is the immutable value
//! used both to query sources and to derive cache keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability provider as advertised by a registry source.
///
/// Identity is `id`: two descriptors with the same `id` from different
/// sources are the same logical server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub version: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub author: String,
    #[serde(default)]
    pub popularity: u64,
    pub last_updated: DateTime<Utc>,
}

impl ServerDescriptor {
    /// Concatenated lowercase text the substring match rule runs against.
    pub fn search_text(&self) -> String {
        let mut parts = vec![
            self.name.clone(),
            self.description.clone(),
            self.id.clone(),
        ];
        if let Some(package) = &self.package {
            parts.push(package.clone());
        }
        parts.extend(self.capabilities.iter().cloned());
        parts.extend(self.tools.iter().cloned());
        parts.join(" ").to_lowercase()
    }

    /// Package name used for installation: the published package if the
    /// source provided one, otherwise the server id.
    pub fn install_package(&self) -> &str {
        self.package.as_deref().unwrap_or(&self.id)
    }
}

/// Query sent to registry sources. Also the canonical unit of cache keying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl SearchQuery {
    /// Query for resolving a single tool name.
    pub fn for_tool(tool_name: &str) -> Self {
        Self {
            capability: None,
            keywords: vec![tool_name.to_string()],
            tool_name: Some(tool_name.to_string()),
        }
    }

    /// Stable cache key: `<prefix>:<canonical serialization>`.
    pub fn cache_key(&self, prefix: &str) -> String {
        format!("{}:{}", prefix, self.canonical())
    }

    /// Canonical serialization. Field order is fixed by the struct, so
    /// structurally identical queries always serialize identically.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether this query names anything at all.
    pub fn is_empty(&self) -> bool {
        self.capability.is_none() && self.keywords.is_empty() && self.tool_name.is_none()
    }

    /// The match rule shared by every registry source: an empty query matches
    /// everything; otherwise the capability hint, the tool name, or any
    /// keyword must appear as a case-insensitive substring of the
    /// descriptor's searchable text.
    pub fn matches(&self, descriptor: &ServerDescriptor) -> bool {
        if self.is_empty() {
            return true;
        }
        let text = descriptor.search_text();
        if let Some(capability) = &self.capability {
            if text.contains(&capability.to_lowercase()) {
                return true;
            }
        }
        if let Some(tool_name) = &self.tool_name {
            if text.contains(&tool_name.to_lowercase()) {
                return true;
            }
        }
        self.keywords
            .iter()
            .any(|kw| text.contains(&kw.to_lowercase()))
    }
}

/// Normalizes one raw registry payload item into a [`ServerDescriptor`].
///
/// Sources disagree on field names; the first present alias wins. Returns
/// `None` when nothing usable as an id is present. Missing optional fields
/// get defaults: `version` `"latest"`, `author` `"Unknown"`, `last_updated`
/// the current time.
pub fn normalize_server_data(raw: &Value) -> Option<ServerDescriptor> {
    let id = first_string(raw, &["id", "name", "package", "identifier"])?;
    let name = first_string(raw, &["name", "displayName", "id"]).unwrap_or_else(|| id.clone());

    Some(ServerDescriptor {
        description: first_string(raw, &["description", "summary"]).unwrap_or_default(),
        repository: first_string(raw, &["repository", "repo", "github", "source"])
            .unwrap_or_default(),
        package: first_string(raw, &["package", "npmPackage", "npm"]),
        version: first_string(raw, &["version"]).unwrap_or_else(|| "latest".to_string()),
        capabilities: string_array(raw, &["capabilities"]),
        tools: string_array(raw, &["tools", "toolNames"]),
        author: first_string(raw, &["author", "maintainer", "owner"])
            .unwrap_or_else(|| "Unknown".to_string()),
        popularity: first_u64(raw, &["stars", "stargazers", "popularity"]).unwrap_or(0),
        last_updated: first_string(raw, &["lastUpdated", "updatedAt", "updated"])
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or_else(Utc::now),
        id,
        name,
    })
}

/// Parses the timestamp shapes registries actually emit: RFC 3339, or a bare
/// `YYYY-MM-DD` date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .find_map(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
}

fn first_u64(raw: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|k| raw.get(k)).find_map(|v| v.as_u64())
}

fn string_array(raw: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .find_map(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_aliased_fields_with_defaults() {
        let raw = json!({
            "identifier": "acme/mcp-weather",
            "displayName": "Weather",
            "summary": "Forecast tools",
            "repo": "https://example.com/acme/mcp-weather",
            "npm": "@acme/mcp-weather",
            "stargazers": 42,
            "toolNames": ["get_forecast"]
        });

        let server = normalize_server_data(&raw).unwrap();
        assert_eq!(server.id, "acme/mcp-weather");
        assert_eq!(server.name, "Weather");
        assert_eq!(server.description, "Forecast tools");
        assert_eq!(server.package.as_deref(), Some("@acme/mcp-weather"));
        assert_eq!(server.version, "latest");
        assert_eq!(server.author, "Unknown");
        assert_eq!(server.popularity, 42);
        assert_eq!(server.tools, vec!["get_forecast"]);
    }

    #[test]
    fn rejects_payload_without_any_id() {
        assert!(normalize_server_data(&json!({"description": "nothing"})).is_none());
    }

    #[test]
    fn empty_query_matches_everything() {
        let server = normalize_server_data(&json!({"id": "x"})).unwrap();
        assert!(SearchQuery::default().matches(&server));
    }

    #[test]
    fn match_rule_is_case_insensitive_substring() {
        let server = normalize_server_data(&json!({
            "id": "gh-x",
            "name": "GitHub Tools",
            "tools": ["list_repos"]
        }))
        .unwrap();

        assert!(SearchQuery::for_tool("LIST_REPOS").matches(&server));
        assert!(SearchQuery {
            capability: Some("github".into()),
            ..Default::default()
        }
        .matches(&server));
        assert!(!SearchQuery::for_tool("send_email").matches(&server));
    }

    #[test]
    fn canonical_form_is_stable_per_query() {
        let a = SearchQuery::for_tool("list_repos");
        let b = SearchQuery::for_tool("list_repos");
        assert_eq!(a.canonical(), b.canonical());
        assert_ne!(a.canonical(), SearchQuery::for_tool("read_file").canonical());
    }
}
