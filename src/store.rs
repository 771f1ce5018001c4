//! Key-value and stream store contract with an in-memory backend
//!
//! The bot keeps two kinds of state: singleton records (ATH, cap info,
//! cooldown timestamps) addressed by string keys, and append-only streams of
//! observations addressed by stream name. `Store` is the read/write contract
//! the rest of the crate relies on; `MemoryStore` implements it in process and
//! can snapshot itself to a JSON file between poll cycles.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::RwLock;

/// Field map of a single stream entry
pub type Fields = BTreeMap<String, String>;

/// Identifier of a stream entry: capture time in milliseconds plus a
/// sequence number for entries sharing the same millisecond
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: i64,
    pub seq: u64,
}

impl StreamId {
    pub fn new(ms: i64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Smallest id at the given millisecond
    pub fn min_at(ms: i64) -> Self {
        Self { ms, seq: 0 }
    }

    /// Largest id at the given millisecond
    pub fn max_at(ms: i64) -> Self {
        Self { ms, seq: u64::MAX }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidStreamId(s.to_string());
        let (ms, seq) = s.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            ms: ms.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

/// Persistence contract used by cooldowns, trackers and time series
///
/// Every method is a single atomic operation on one key or stream. The
/// contract offers no transactions: read-modify-write sequences built on top
/// of it may interleave with other writers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads a value, `None` if the key does not exist
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Appends an entry to a stream
    ///
    /// With `id = None` the store assigns an id from the current time. An
    /// explicit id that already exists leaves the stream untouched and
    /// returns `Ok(None)`.
    async fn stream_add(
        &self,
        stream: &str,
        id: Option<StreamId>,
        fields: Fields,
    ) -> Result<Option<StreamId>, StoreError>;

    /// Returns up to `limit` entries with `start_ms <= id.ms <= end_ms`,
    /// ordered by id
    async fn stream_range(
        &self,
        stream: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<(StreamId, Fields)>, StoreError>;

    /// Removes a whole stream
    async fn stream_clear(&self, stream: &str) -> Result<(), StoreError>;

    /// Drops entries with `id.ms < min_ms`, returns how many were removed
    async fn stream_trim_before(&self, stream: &str, min_ms: i64) -> Result<usize, StoreError>;

    /// Makes pending writes durable; backends without buffering do nothing
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

type StreamMap = HashMap<String, BTreeMap<StreamId, Fields>>;

/// On-disk layout of a `MemoryStore` snapshot
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    values: HashMap<String, String>,
    streams: HashMap<String, Vec<(String, Fields)>>,
}

/// In-process store, optionally backed by a JSON snapshot file
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    streams: RwLock<StreamMap>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Creates an empty, purely in-memory store
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Opens a store persisted at `path`
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first `flush`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Snapshot>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No store snapshot yet, starting empty");
                Snapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        let mut streams = StreamMap::new();
        for (name, entries) in snapshot.streams {
            let mut stream = BTreeMap::new();
            for (id, fields) in entries {
                stream.insert(id.parse::<StreamId>()?, fields);
            }
            streams.insert(name, stream);
        }

        tracing::debug!(
            path = %path.display(),
            keys = snapshot.values.len(),
            streams = streams.len(),
            "Loaded store snapshot"
        );

        Ok(Self {
            values: RwLock::new(snapshot.values),
            streams: RwLock::new(streams),
            snapshot_path: Some(path),
        })
    }

    /// Number of entries currently held in a stream
    pub async fn stream_len(&self, stream: &str) -> usize {
        self.streams
            .read()
            .await
            .get(stream)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    async fn write_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = {
            let values = self.values.read().await;
            let streams = self.streams.read().await;
            Snapshot {
                values: values.clone(),
                streams: streams
                    .iter()
                    .map(|(name, entries)| {
                        let entries = entries
                            .iter()
                            .map(|(id, fields)| (id.to_string(), fields.clone()))
                            .collect();
                        (name.clone(), entries)
                    })
                    .collect(),
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write next to the target and rename so a crash never leaves half a file
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&snapshot)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn stream_add(
        &self,
        stream: &str,
        id: Option<StreamId>,
        fields: Fields,
    ) -> Result<Option<StreamId>, StoreError> {
        let mut streams = self.streams.write().await;
        let entries = streams.entry(stream.to_string()).or_default();

        let id = match id {
            Some(id) => {
                if entries.contains_key(&id) {
                    tracing::trace!(stream, id = %id, "Duplicate stream id ignored");
                    return Ok(None);
                }
                id
            }
            None => {
                let ms = Utc::now().timestamp_millis();
                let seq = entries
                    .range(StreamId::min_at(ms)..=StreamId::max_at(ms))
                    .next_back()
                    .map(|(last, _)| last.seq + 1)
                    .unwrap_or(0);
                StreamId::new(ms, seq)
            }
        };

        entries.insert(id, fields);
        Ok(Some(id))
    }

    async fn stream_range(
        &self,
        stream: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<(StreamId, Fields)>, StoreError> {
        if start_ms > end_ms {
            return Ok(Vec::new());
        }

        let streams = self.streams.read().await;
        let Some(entries) = streams.get(stream) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .range(StreamId::min_at(start_ms)..=StreamId::max_at(end_ms))
            .take(limit)
            .map(|(id, fields)| (*id, fields.clone()))
            .collect())
    }

    async fn stream_clear(&self, stream: &str) -> Result<(), StoreError> {
        self.streams.write().await.remove(stream);
        Ok(())
    }

    async fn stream_trim_before(&self, stream: &str, min_ms: i64) -> Result<usize, StoreError> {
        let mut streams = self.streams.write().await;
        let Some(entries) = streams.get_mut(stream) else {
            return Ok(0);
        };

        let kept = entries.split_off(&StreamId::min_at(min_ms));
        let removed = std::mem::replace(entries, kept).len();
        if removed > 0 {
            tracing::debug!(stream, removed, "Trimmed old stream entries");
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        match &self.snapshot_path {
            Some(path) => self.write_snapshot(path).await,
            None => Ok(()),
        }
    }
}
