//! Source probes: per-target fetch-and-diff units of work.
//!
//! Each probe enumerates independent units (one per repository, package, or
//! document URL), fetches the current state for a unit, diffs it against the
//! cursor store, and returns raw observations plus the cursor deltas to
//! apply once the cycle's signals have been handed to the sink.

pub mod appstore;
pub mod docs;
pub mod repo;

pub use appstore::AppStoreProbe;
pub use docs::DocProbe;
pub use repo::RepoProbe;

use async_trait::async_trait;

use crate::cursor::{Cursor, CursorDelta, CursorKey, CursorStore};
use crate::model::{SourceClass, Target};

/// One independent schedulable unit: a single resource under a single
/// target. Exactly one unit owns each cursor key per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeUnit {
    pub target: String,
    pub source: SourceClass,
    /// `org/repo`, package id, or document URL
    pub scope: String,
}

impl std::fmt::Display for ProbeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.target, self.scope)
    }
}

/// Raw facts discovered since the prior cursor. Never persisted; always
/// passed through the classifier within the same cycle.
#[derive(Debug, Clone)]
pub enum Observation {
    /// Localization files added by a commit
    NewLocalizationFiles {
        repo: String,
        sha: String,
        author: String,
        message: String,
        files: Vec<String>,
        languages: Vec<String>,
        url: String,
    },
    /// Commit message matched intent keywords (no qualifying files)
    CommitKeywords {
        repo: String,
        sha: String,
        author: String,
        message: String,
        keywords: Vec<String>,
        url: String,
    },
    /// Open pull request with localization intent in its title
    OpenPr {
        repo: String,
        number: u64,
        title: String,
        author: String,
        keywords: Vec<String>,
        url: String,
    },
    /// Languages newly supported by an app listing
    NewAppLanguages {
        package: String,
        added: Vec<String>,
        total: usize,
        url: String,
    },
    /// hreflang alternates newly present on a docs page
    NewHreflangs {
        url: String,
        added: Vec<String>,
        total: usize,
    },
    /// Keywords newly present in a docs page's text
    DocKeywords {
        url: String,
        keywords: Vec<String>,
        first_scan: bool,
    },
}

/// Why a unit produced nothing this cycle. Soft failures are retried on the
/// next scheduled cycle, never immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftReason {
    RateLimited,
    NotFound,
    Timeout,
    Http(u16),
    Network(String),
    Parse(String),
}

impl std::fmt::Display for SoftReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftReason::RateLimited => write!(f, "rate limited"),
            SoftReason::NotFound => write!(f, "not found"),
            SoftReason::Timeout => write!(f, "timeout"),
            SoftReason::Http(status) => write!(f, "http status {status}"),
            SoftReason::Network(e) => write!(f, "network: {e}"),
            SoftReason::Parse(e) => write!(f, "parse: {e}"),
        }
    }
}

/// Per-unit result. Failures never propagate past the unit boundary; the
/// coordinator aggregates these into cycle counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Ok,
    Soft(SoftReason),
    Failed(String),
}

/// Everything a unit produced in one cycle. On any non-`Ok` status both
/// `observations` and `cursor_updates` are empty: a unit either fully
/// observes and advances, or not at all.
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit: ProbeUnit,
    pub observations: Vec<Observation>,
    pub cursor_updates: Vec<CursorDelta>,
    pub status: UnitStatus,
}

impl UnitOutcome {
    pub fn ok(unit: ProbeUnit) -> Self {
        Self {
            unit,
            observations: Vec::new(),
            cursor_updates: Vec::new(),
            status: UnitStatus::Ok,
        }
    }

    pub fn soft(unit: ProbeUnit, reason: SoftReason) -> Self {
        Self {
            unit,
            observations: Vec::new(),
            cursor_updates: Vec::new(),
            status: UnitStatus::Soft(reason),
        }
    }

    pub fn observe(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }

    pub fn advance(mut self, key: CursorKey, cursor: Cursor) -> Self {
        self.cursor_updates.push(CursorDelta::new(key, cursor));
        self
    }
}

impl From<crate::net::FetchError> for SoftReason {
    fn from(e: crate::net::FetchError) -> Self {
        match e {
            crate::net::FetchError::Timeout => SoftReason::Timeout,
            crate::net::FetchError::Network(msg) => SoftReason::Network(msg),
        }
    }
}

/// Read-only view of the cursor store handed to probes. Probes diff against
/// prior cursors but never write; updates flow back through `UnitOutcome`.
pub struct CursorView<'a> {
    store: &'a CursorStore,
}

impl<'a> CursorView<'a> {
    pub fn new(store: &'a CursorStore) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &CursorKey) -> Option<Cursor> {
        self.store.get(key)
    }
}

/// A source-specific fetch-and-diff capability. Selected per target based on
/// which identifiers the target carries.
#[async_trait]
pub trait Probe: Send + Sync {
    fn source(&self) -> SourceClass;

    /// Units this probe schedules for a target (empty when the target has no
    /// matching identifiers).
    fn units(&self, target: &Target) -> Vec<ProbeUnit>;

    /// Run one fetch cycle for one unit.
    async fn probe(&self, unit: &ProbeUnit, cursors: &CursorView<'_>) -> UnitOutcome;
}
