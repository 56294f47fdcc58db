//! TTL cache with bounded size and debounced disk persistence
//!
//! Memoizes tool→server bindings and registry search results. Entries carry a
//! per-entry TTL; reads evict expired entries but never extend their life. A
//! background sweep reclaims write-once/never-read keys, and mutations are
//! persisted to a single JSON document after a short quiet period so bursts of
//! writes coalesce into one disk write.
//!
//! All operations are total: a well-formed key never produces an error, and a
//! malformed or unwritable persistence file degrades to warnings.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Default TTL applied when `set` is called without one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Hard cap on entry count used by [`TtlCache::open`].
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// How many oldest entries are dropped per eviction round once the cap is hit.
const EVICTION_BATCH: usize = 100;

/// Interval of the background expired-entry sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Quiet period after the last mutation before the cache is written to disk.
const PERSIST_DEBOUNCE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    data: Value,
    /// Creation time, unix milliseconds. Reset on overwrite, never on read.
    ts: i64,
    /// Time to live, milliseconds.
    ttl: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: i64) -> bool {
        now - self.ts > self.ttl as i64
    }
}

/// On-disk record shape: an array of these makes up the persisted document.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    data: Value,
    ts: i64,
    ttl: u64,
}

/// Snapshot of cache health, suitable for diagnostics endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    /// Serialized-length proxy, not an exact heap measurement.
    pub approx_bytes: usize,
    /// Unix millis of the oldest entry's creation, 0 when empty.
    pub oldest_ts: i64,
    /// Unix millis of the newest entry's creation, 0 when empty.
    pub newest_ts: i64,
}

/// Key→JSON store with per-entry expiry and a hard size cap
///
/// Cheap to share: construct once with [`TtlCache::open`] (or
/// [`TtlCache::in_memory`] in tests) and clone the `Arc`. The owning process
/// must call [`TtlCache::flush_and_close`] during shutdown; there is no exit
/// hook.
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    path: Option<PathBuf>,
    dirty_tx: mpsc::UnboundedSender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl TtlCache {
    /// Opens a cache backed by `path`, reloading unexpired persisted entries.
    ///
    /// Missing or malformed persisted data is logged and ignored; startup
    /// never fails on cache state. Spawns the background sweep and the
    /// debounced persistence task, so this must run inside a tokio runtime.
    pub async fn open(path: impl Into<PathBuf>, max_entries: usize) -> Arc<Self> {
        let path = path.into();
        let entries = load_persisted(&path);
        Self::build(entries, Some(path), max_entries)
    }

    /// Memory-only cache with no persistence task. The sweep still runs.
    pub fn in_memory(max_entries: usize) -> Arc<Self> {
        Self::build(HashMap::new(), None, max_entries)
    }

    fn build(
        entries: HashMap<String, CacheEntry>,
        path: Option<PathBuf>,
        max_entries: usize,
    ) -> Arc<Self> {
        let (dirty_tx, dirty_rx) = mpsc::unbounded_channel();
        let cache = Arc::new(Self {
            entries: RwLock::new(entries),
            max_entries,
            path,
            dirty_tx,
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = vec![spawn_sweeper(Arc::downgrade(&cache))];
        if cache.path.is_some() {
            tasks.push(spawn_persister(Arc::downgrade(&cache), dirty_rx));
        }
        *cache.tasks.lock().unwrap_or_else(|e| e.into_inner()) = tasks;

        cache
    }

    /// Returns the live value for `key`, evicting it first if expired.
    ///
    /// Reads do not refresh the entry's creation time.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().await;
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(now_millis()),
            None => return None,
        };
        if expired {
            entries.remove(key);
            drop(entries);
            self.mark_dirty();
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Inserts or overwrites `key`, resetting its creation time.
    ///
    /// If the cap is exceeded afterwards, the oldest entries by creation time
    /// are evicted in batches until the cache is back under the limit —
    /// including entries that have not expired yet.
    pub async fn set(&self, key: impl Into<String>, data: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            CacheEntry {
                data,
                ts: now_millis(),
                ttl: ttl.as_millis() as u64,
            },
        );

        while entries.len() > self.max_entries {
            let mut by_age: Vec<(String, i64)> = entries
                .iter()
                .map(|(k, e)| (k.clone(), e.ts))
                .collect();
            by_age.sort_by_key(|(_, ts)| *ts);
            for (key, _) in by_age.into_iter().take(EVICTION_BATCH) {
                entries.remove(&key);
            }
        }
        drop(entries);
        self.mark_dirty();
    }

    /// Deletes entries and returns how many were removed.
    ///
    /// With no pattern the whole cache is emptied. With a pattern, keys are
    /// matched as a regular expression; an unparseable pattern is logged and
    /// deletes nothing.
    pub async fn clear(&self, pattern: Option<&str>) -> usize {
        let mut entries = self.entries.write().await;
        let removed = match pattern {
            None => {
                let count = entries.len();
                entries.clear();
                count
            }
            Some(pattern) => {
                let re = match Regex::new(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        tracing::warn!("Invalid cache clear pattern '{}': {}", pattern, e);
                        return 0;
                    }
                };
                let keys: Vec<String> = entries
                    .keys()
                    .filter(|k| re.is_match(k))
                    .cloned()
                    .collect();
                for key in &keys {
                    entries.remove(key);
                }
                keys.len()
            }
        };
        drop(entries);
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }

    /// Entry count, approximate byte footprint, and creation-time bounds.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let approx_bytes = entries
            .iter()
            .map(|(k, e)| k.len() + e.data.to_string().len())
            .sum();
        CacheStats {
            entries: entries.len(),
            approx_bytes,
            oldest_ts: entries.values().map(|e| e.ts).min().unwrap_or(0),
            newest_ts: entries.values().map(|e| e.ts).max().unwrap_or(0),
        }
    }

    /// Deterministic content hash for building stable keys from structured
    /// queries. Same input yields the same fixed-length hex string.
    pub fn hash_key<T: Serialize>(data: &T) -> String {
        let serialized = serde_json::to_string(data).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        hex::encode(digest)
    }

    /// Flushes pending state to disk and stops the background tasks.
    ///
    /// Called from the owning process's shutdown sequence. A failed flush is
    /// logged; in-memory state was authoritative for the process lifetime
    /// anyway.
    pub async fn flush_and_close(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }
        self.persist().await;
    }

    /// Drops every expired entry. Runs from the sweep task; also usable
    /// directly in tests.
    pub async fn sweep_expired(&self) -> usize {
        let now = now_millis();
        let mut entries = self.entries.write().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        drop(entries);
        if !expired.is_empty() {
            tracing::debug!("Cache sweep evicted {} expired entries", expired.len());
            self.mark_dirty();
        }
        expired.len()
    }

    fn mark_dirty(&self) {
        // No receiver means no persistence path; nothing to schedule.
        let _ = self.dirty_tx.send(());
    }

    async fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let entries = self.entries.read().await;
        let records: Vec<PersistedEntry> = entries
            .iter()
            .map(|(k, e)| PersistedEntry {
                key: k.clone(),
                data: e.data.clone(),
                ts: e.ts,
                ttl: e.ttl,
            })
            .collect();
        drop(entries);

        if let Err(e) = write_document(path, &records) {
            tracing::warn!("Cache persistence to {} failed: {}", path.display(), e);
        }
    }
}

fn write_document(path: &Path, records: &[PersistedEntry]) -> anyhow::Result<()> {
    let json = serde_json::to_string(records)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
    }
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write as _;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}

fn load_persisted(path: &Path) -> HashMap<String, CacheEntry> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            tracing::warn!("Failed to read cache file {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    let records: Vec<PersistedEntry> = match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(
                "Ignoring malformed cache file {}: {}",
                path.display(),
                e
            );
            return HashMap::new();
        }
    };

    let now = now_millis();
    records
        .into_iter()
        .filter(|r| now - r.ts <= r.ttl as i64)
        .map(|r| {
            (
                r.key,
                CacheEntry {
                    data: r.data,
                    ts: r.ts,
                    ttl: r.ttl,
                },
            )
        })
        .collect()
}

fn spawn_sweeper(cache: Weak<TtlCache>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            let Some(cache) = cache.upgrade() else {
                return;
            };
            cache.sweep_expired().await;
        }
    })
}

fn spawn_persister(
    cache: Weak<TtlCache>,
    mut dirty_rx: mpsc::UnboundedReceiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while dirty_rx.recv().await.is_some() {
            // Coalesce mutation bursts: restart the quiet period on every
            // further signal, write once it lapses.
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(PERSIST_DEBOUNCE) => break,
                    more = dirty_rx.recv() => {
                        if more.is_none() {
                            break;
                        }
                    }
                }
            }
            let Some(cache) = cache.upgrade() else {
                return;
            };
            cache.persist().await;
        }
    })
}
