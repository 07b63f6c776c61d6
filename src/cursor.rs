//! Durable cursor store: the last-observed state per `(target, kind, scope)`
//! key, used by probes to compute deltas.
//!
//! Cursors only ever advance. A probe that fails mid-fetch returns no cursor
//! delta, so partial observations are discarded rather than merged, and the
//! coordinator applies all deltas sequentially after its cycle barrier.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// What a cursor tracks for its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    /// Newest commit sha seen in a repository
    LastCommit,
    /// Confirmed-supported app listing languages
    AppLanguages,
    /// hreflang alternates present on a docs page
    Hreflangs,
    /// Content digest and matched keywords of a docs page
    DocContent,
}

impl CursorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorKind::LastCommit => "last_commit",
            CursorKind::AppLanguages => "app_languages",
            CursorKind::Hreflangs => "hreflangs",
            CursorKind::DocContent => "doc_content",
        }
    }
}

/// Key of one cursor. `scope` identifies the concrete resource under the
/// target: `org/repo`, a package id, or a document URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorKey {
    pub target: String,
    pub kind: CursorKind,
    pub scope: String,
}

impl CursorKey {
    pub fn new(target: impl Into<String>, kind: CursorKind, scope: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind,
            scope: scope.into(),
        }
    }
}

impl std::fmt::Display for CursorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.target, self.kind.as_str(), self.scope)
    }
}

/// Opaque last-observed marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cursor {
    Commit { sha: String },
    Languages { codes: BTreeSet<String> },
    Hreflangs { codes: BTreeSet<String> },
    Content {
        digest: String,
        keywords: BTreeSet<String>,
    },
}

/// Stored cursor plus the observation time used for the monotonic guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorEntry {
    pub cursor: Cursor,
    pub observed_at: DateTime<Utc>,
}

/// A pending cursor update produced by one probe unit.
#[derive(Debug, Clone)]
pub struct CursorDelta {
    pub key: CursorKey,
    pub cursor: Cursor,
    pub observed_at: DateTime<Utc>,
}

impl CursorDelta {
    pub fn new(key: CursorKey, cursor: Cursor) -> Self {
        Self {
            key,
            cursor,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("cursor snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cursor snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    key: CursorKey,
    entry: CursorEntry,
}

/// In-process cursor map with an optional JSON snapshot on disk.
///
/// Writes to different keys never block each other; the same key is only
/// ever written by the coordinator's sequential post-barrier apply.
pub struct CursorStore {
    entries: DashMap<CursorKey, CursorEntry>,
    snapshot_path: Option<PathBuf>,
}

impl CursorStore {
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a snapshot file, loading any existing state.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CursorError> {
        let path = path.as_ref().to_path_buf();
        let entries = DashMap::new();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let records: Vec<SnapshotRecord> = serde_json::from_str(&raw)?;
            for record in records {
                entries.insert(record.key, record.entry);
            }
        }
        Ok(Self {
            entries,
            snapshot_path: Some(path),
        })
    }

    /// Absence means first observation for this key.
    pub fn get(&self, key: &CursorKey) -> Option<Cursor> {
        self.entries.get(key).map(|e| e.cursor.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply one delta. Rejects updates observed earlier than the stored
    /// entry, so a stale unit can never roll a cursor back. Returns whether
    /// the delta was applied.
    pub fn apply(&self, delta: CursorDelta) -> bool {
        let mut applied = true;
        let entry = CursorEntry {
            cursor: delta.cursor,
            observed_at: delta.observed_at,
        };
        self.entries
            .entry(delta.key)
            .and_modify(|existing| {
                if existing.observed_at <= entry.observed_at {
                    *existing = entry.clone();
                } else {
                    applied = false;
                }
            })
            .or_insert(entry);
        applied
    }

    /// Apply a batch of deltas sequentially; returns how many were applied.
    pub fn apply_all(&self, deltas: Vec<CursorDelta>) -> usize {
        let mut applied = 0;
        for delta in deltas {
            let key = delta.key.clone();
            if self.apply(delta) {
                applied += 1;
            } else {
                tracing::warn!(key = %key, "rejected stale cursor update");
            }
        }
        applied
    }

    /// Drop cursors whose target is no longer configured (garbage collection
    /// after a target is removed). Returns how many entries were dropped.
    pub fn retain_targets(&self, live: &std::collections::HashSet<String>) -> usize {
        let stale: Vec<CursorKey> = self
            .entries
            .iter()
            .filter(|e| !live.contains(&e.key().target))
            .map(|e| e.key().clone())
            .collect();
        let count = stale.len();
        for key in stale {
            self.entries.remove(&key);
        }
        count
    }

    /// Persist the whole map. Writes to a temp file and renames so a crash
    /// mid-flush never leaves a torn snapshot.
    pub fn flush(&self) -> Result<(), CursorError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let records: Vec<SnapshotRecord> = self
            .entries
            .iter()
            .map(|e| SnapshotRecord {
                key: e.key().clone(),
                entry: e.value().clone(),
            })
            .collect();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&records)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn key() -> CursorKey {
        CursorKey::new("Acme", CursorKind::LastCommit, "acme/app")
    }

    #[test]
    fn test_absent_then_set() {
        let store = CursorStore::in_memory();
        assert!(store.get(&key()).is_none());

        store.apply(CursorDelta::new(key(), Cursor::Commit { sha: "c1".into() }));
        assert_eq!(store.get(&key()), Some(Cursor::Commit { sha: "c1".into() }));
    }

    #[test]
    fn test_monotonic_rejects_older_observation() {
        let store = CursorStore::in_memory();
        let newer = CursorDelta::new(key(), Cursor::Commit { sha: "c2".into() });
        let older = CursorDelta {
            key: key(),
            cursor: Cursor::Commit { sha: "c1".into() },
            observed_at: Utc::now() - ChronoDuration::seconds(60),
        };

        assert!(store.apply(newer));
        assert!(!store.apply(older));
        assert_eq!(store.get(&key()), Some(Cursor::Commit { sha: "c2".into() }));
    }

    #[test]
    fn test_apply_all_counts() {
        let store = CursorStore::in_memory();
        let stale = CursorDelta {
            key: key(),
            cursor: Cursor::Commit { sha: "old".into() },
            observed_at: Utc::now() - ChronoDuration::hours(1),
        };
        let fresh = CursorDelta::new(
            CursorKey::new("Acme", CursorKind::Hreflangs, "https://docs.acme.com"),
            Cursor::Hreflangs {
                codes: ["fr".to_string()].into_iter().collect(),
            },
        );
        store.apply(CursorDelta::new(key(), Cursor::Commit { sha: "new".into() }));

        assert_eq!(store.apply_all(vec![stale, fresh]), 1);
    }

    #[test]
    fn test_retain_targets_garbage_collects() {
        let store = CursorStore::in_memory();
        store.apply(CursorDelta::new(key(), Cursor::Commit { sha: "c1".into() }));
        store.apply(CursorDelta::new(
            CursorKey::new("Other", CursorKind::LastCommit, "other/app"),
            Cursor::Commit { sha: "x".into() },
        ));

        let live = ["Other".to_string()].into_iter().collect();
        assert_eq!(store.retain_targets(&live), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key()).is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursors.json");

        let store = CursorStore::open(&path).unwrap();
        store.apply(CursorDelta::new(key(), Cursor::Commit { sha: "c9".into() }));
        store.apply(CursorDelta::new(
            CursorKey::new("Acme", CursorKind::DocContent, "https://docs.acme.com"),
            Cursor::Content {
                digest: "abc".into(),
                keywords: ["i18n".to_string()].into_iter().collect(),
            },
        ));
        store.flush().unwrap();

        let reopened = CursorStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.get(&key()),
            Some(Cursor::Commit { sha: "c9".into() })
        );
    }
}
