//! Core domain types: monitored targets and the signals emitted for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A company/entity monitored across one or more sources.
///
/// Immutable for the duration of a polling cycle; the target list is
/// re-read from its source at the start of each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Unique name, used as the key in cursors and signals
    pub name: String,
    /// Organization owning the monitored repositories
    #[serde(default)]
    pub repo_org: Option<String>,
    /// Repository names under `repo_org`
    #[serde(default)]
    pub repos: Vec<String>,
    /// App store package identifier
    #[serde(default)]
    pub app_package: Option<String>,
    /// Documentation page URLs
    #[serde(default)]
    pub doc_urls: Vec<String>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_org: None,
            repos: Vec::new(),
            app_package: None,
            doc_urls: Vec::new(),
        }
    }

    pub fn with_repos(mut self, org: impl Into<String>, repos: &[&str]) -> Self {
        self.repo_org = Some(org.into());
        self.repos = repos.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_app_package(mut self, package: impl Into<String>) -> Self {
        self.app_package = Some(package.into());
        self
    }

    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_urls.push(url.into());
        self
    }
}

/// Source classes, each polled on its own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceClass {
    /// Commit and pull-request feeds (fast interval)
    Repository,
    /// App store language inventories (slow interval)
    AppStore,
    /// Documentation pages (slow interval)
    Docs,
}

impl SourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceClass::Repository => "repository",
            SourceClass::AppStore => "appstore",
            SourceClass::Docs => "docs",
        }
    }
}

impl std::fmt::Display for SourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    /// A localization file was added to a repository
    NewLangFile,
    /// A documentation page grew a new hreflang alternate
    NewHreflang,
    /// An app listing became available in a new language
    NewAppLang,
    /// An open pull request with localization intent in its title
    OpenPr,
    /// Keyword match only (low confidence)
    Keyword,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::NewLangFile => "NEW_LANG_FILE",
            SignalKind::NewHreflang => "NEW_HREFLANG",
            SignalKind::NewAppLang => "NEW_APP_LANG",
            SignalKind::OpenPr => "OPEN_PR",
            SignalKind::Keyword => "KEYWORD",
        }
    }

    /// High-value kinds are strong evidence of concrete localization work,
    /// as opposed to mere keyword mentions.
    pub fn is_high_value(&self) -> bool {
        !matches!(self, SignalKind::Keyword)
    }

    pub fn priority(&self) -> Priority {
        if self.is_high_value() {
            Priority::High
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Low,
}

/// The unit of output: a classified, typed change event. Immutable once
/// created; persisted exactly once by the alert sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub source: SourceClass,
    pub target: String,
    pub kind: SignalKind,
    pub title: String,
    pub body: String,
    pub keywords: Vec<String>,
    /// Evidence URL (commit, PR, listing, or page)
    pub url: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub priority: Priority,
    pub detected_at: DateTime<Utc>,
}

/// Yields the current target list; read once per cycle, not watched for
/// live changes mid-cycle.
pub trait TargetSource: Send + Sync {
    fn load(&self) -> Result<Vec<Target>, TargetError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("failed to read target file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse target file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fixed in-memory target list.
pub struct StaticTargets(pub Vec<Target>);

impl TargetSource for StaticTargets {
    fn load(&self) -> Result<Vec<Target>, TargetError> {
        Ok(self.0.clone())
    }
}

/// Target list stored as a JSON array on disk, re-read on every load so
/// edits take effect on the next cycle.
pub struct FileTargetSource {
    path: std::path::PathBuf,
}

impl FileTargetSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TargetSource for FileTargetSource {
    fn load(&self) -> Result<Vec<Target>, TargetError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_builder() {
        let target = Target::new("Acme")
            .with_repos("acme", &["app", "web"])
            .with_app_package("com.acme.app")
            .with_doc_url("https://docs.acme.com/api");

        assert_eq!(target.repo_org.as_deref(), Some("acme"));
        assert_eq!(target.repos.len(), 2);
        assert_eq!(target.doc_urls.len(), 1);
    }

    #[test]
    fn test_kind_priority() {
        assert!(SignalKind::NewLangFile.is_high_value());
        assert!(SignalKind::OpenPr.is_high_value());
        assert!(!SignalKind::Keyword.is_high_value());
        assert_eq!(SignalKind::Keyword.priority(), Priority::Low);
        assert_eq!(SignalKind::NewHreflang.priority(), Priority::High);
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&SignalKind::NewLangFile).unwrap();
        assert_eq!(json, "\"NEW_LANG_FILE\"");
        let kind: SignalKind = serde_json::from_str("\"OPEN_PR\"").unwrap();
        assert_eq!(kind, SignalKind::OpenPr);
    }

    #[test]
    fn test_file_target_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let targets = vec![Target::new("Acme").with_repos("acme", &["app"])];
        std::fs::write(&path, serde_json::to_string(&targets).unwrap()).unwrap();

        let loaded = FileTargetSource::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Acme");
    }
}
