//! File-backed server directory
//!
//! One JSON document mapping server ids to launch entries, the same shape the
//! surrounding tooling reads (`mcpServers`). The directory only ever grows:
//! resolution reads it to see what is installed, the provisioner appends to
//! it after a successful install. Every write is a complete document through
//! a temp file + rename, so a crash mid-write leaves the last good version.

use crate::models::ServerDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Launch entry for one installed server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub command: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Originating repository URL.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl DirectoryEntry {
    /// Default launch entry for a freshly installed server: run it through
    /// the package runner by id.
    pub fn for_descriptor(descriptor: &ServerDescriptor) -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), descriptor.id.clone()],
            metadata: EntryMetadata {
                source: descriptor.repository.clone(),
                capabilities: descriptor.capabilities.clone(),
                tools: descriptor.tools.clone(),
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryDoc {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: BTreeMap<String, DirectoryEntry>,
}

pub struct ServerDirectory {
    path: PathBuf,
    doc: RwLock<DirectoryDoc>,
}

impl ServerDirectory {
    /// Loads the directory document once at startup. A missing file starts
    /// empty; a malformed one is logged and treated as empty rather than
    /// failing the process.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring malformed server directory {}: {}",
                        path.display(),
                        e
                    );
                    DirectoryDoc::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DirectoryDoc::default(),
            Err(e) => {
                tracing::warn!("Failed to read server directory {}: {}", path.display(), e);
                DirectoryDoc::default()
            }
        };
        Self {
            path,
            doc: RwLock::new(doc),
        }
    }

    pub async fn has(&self, id: &str) -> bool {
        self.doc.read().await.mcp_servers.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> Option<DirectoryEntry> {
        self.doc.read().await.mcp_servers.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.doc.read().await.mcp_servers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.doc.read().await.mcp_servers.is_empty()
    }

    /// Snapshot of all entries, for scanning declared tools.
    pub async fn entries(&self) -> Vec<(String, DirectoryEntry)> {
        self.doc
            .read()
            .await
            .mcp_servers
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Adds `id` if absent and persists the complete document. Existing
    /// entries are never replaced or removed. A failed disk write is logged;
    /// the in-memory directory stays authoritative.
    pub async fn append(&self, id: &str, entry: DirectoryEntry) {
        let mut doc = self.doc.write().await;
        doc.mcp_servers.entry(id.to_string()).or_insert(entry);
        let snapshot = match serde_json::to_string_pretty(&*doc) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize server directory: {}", e);
                return;
            }
        };
        // The guard stays held across the write so documents reach disk in
        // append order; the blocking I/O itself runs off the executor threads.
        let path = self.path.clone();
        let written =
            tokio::task::spawn_blocking(move || write_document(&path, &snapshot)).await;
        if let Err(e) = written.map_err(anyhow::Error::from).and_then(|r| r) {
            tracing::warn!(
                "Failed to persist server directory {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn write_document(path: &Path, json: &str) -> anyhow::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
    }
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}
