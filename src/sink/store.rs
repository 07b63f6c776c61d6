//! Durable signal storage behind the `SignalStore` interface. The core only
//! ever appends; listing and aggregation serve the read-only API.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::{Signal, SignalKind, SourceClass};

/// A persisted signal with its de-duplication id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSignal {
    pub id: u64,
    #[serde(flatten)]
    pub signal: Signal,
}

/// Read-side filters for dashboards and the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalFilter {
    pub source: Option<SourceClass>,
    pub target: Option<String>,
    pub kind: Option<SignalKind>,
    /// Case-insensitive substring over target, title, body, and keywords
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl SignalFilter {
    fn matches(&self, stored: &StoredSignal) -> bool {
        let signal = &stored.signal;
        if let Some(source) = self.source {
            if signal.source != source {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if &signal.target != target {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if signal.kind != kind {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let haystack = format!(
                "{} {} {} {}",
                signal.target,
                signal.title,
                signal.body,
                signal.keywords.join(" ")
            )
            .to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("signal store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal store encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only durable storage; `save` must complete before any external
/// delivery of the signal is attempted.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn save(&self, signal: &Signal) -> Result<u64, StoreError>;
    async fn list(&self, filter: &SignalFilter) -> Result<Vec<StoredSignal>, StoreError>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    signals: Mutex<Vec<StoredSignal>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            signals: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn save(&self, signal: &Signal) -> Result<u64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.signals.lock().push(StoredSignal {
            id,
            signal: signal.clone(),
        });
        Ok(id)
    }

    async fn list(&self, filter: &SignalFilter) -> Result<Vec<StoredSignal>, StoreError> {
        let signals = self.signals.lock();
        let mut matched: Vec<StoredSignal> = signals
            .iter()
            .rev() // newest first
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

/// Append-only JSONL log on disk. One record per line; the line is flushed
/// before `save` returns, so a signal is never delivered without first
/// being recorded.
pub struct SignalLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
    next_id: AtomicU64,
}

impl SignalLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Seed the id counter from any existing log
        let mut max_id = 0;
        if path.exists() {
            for line in std::fs::read_to_string(&path)?.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: StoredSignal = serde_json::from_str(line)?;
                max_id = max_id.max(record.id);
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            next_id: AtomicU64::new(max_id + 1),
        })
    }
}

#[async_trait]
impl SignalStore for SignalLog {
    async fn save(&self, signal: &Signal) -> Result<u64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = StoredSignal {
            id,
            signal: signal.clone(),
        };
        let line = serde_json::to_string(&record)?;
        let mut file = self.file.lock();
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(id)
    }

    async fn list(&self, filter: &SignalFilter) -> Result<Vec<StoredSignal>, StoreError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let mut matched = Vec::new();
        for line in raw.lines().rev() {
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredSignal = serde_json::from_str(line)?;
            if filter.matches(&record) {
                matched.push(record);
            }
            if let Some(limit) = filter.limit {
                if matched.len() >= limit {
                    break;
                }
            }
        }
        Ok(matched)
    }
}
