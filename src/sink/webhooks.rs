//! Webhook subscription registry with JSON-file persistence.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::SignalKind;

/// One registered webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub name: String,
    pub url: String,
    /// Kind allow-list; `None` subscribes to everything
    #[serde(default)]
    pub kinds: Option<Vec<SignalKind>>,
    /// Extra headers sent with each delivery
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Subscription {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kinds: None,
            headers: Vec::new(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<SignalKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn accepts(&self, kind: SignalKind) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("webhook registry io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("webhook registry parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Registered webhook subscriptions. Registration changes persist
/// immediately; reads are lock-cheap for the per-signal fan-out path.
pub struct WebhookRegistry {
    subscriptions: RwLock<Vec<Subscription>>,
    path: Option<PathBuf>,
}

impl WebhookRegistry {
    pub fn in_memory() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            path: None,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let subscriptions = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            Vec::new()
        };
        Ok(Self {
            subscriptions: RwLock::new(subscriptions),
            path: Some(path),
        })
    }

    /// Insert or replace by name.
    pub fn register(&self, subscription: Subscription) -> Result<(), RegistryError> {
        {
            let mut subs = self.subscriptions.write();
            subs.retain(|s| s.name != subscription.name);
            subs.push(subscription);
        }
        self.persist()
    }

    pub fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        let removed = {
            let mut subs = self.subscriptions.write();
            let before = subs.len();
            subs.retain(|s| s.name != name);
            subs.len() != before
        };
        self.persist()?;
        Ok(removed)
    }

    pub fn list(&self) -> Vec<Subscription> {
        self.subscriptions.read().clone()
    }

    /// Subscriptions whose filter matches the kind.
    pub fn matching(&self, kind: SignalKind) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.accepts(kind))
            .cloned()
            .collect()
    }

    fn persist(&self) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let subs = self.subscriptions.read();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&*subs)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
