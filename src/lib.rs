//! Locwatch: Localization Launch Monitor
//!
//! Polls public sources for signs that a monitored company is preparing an
//! international launch: new translation files and localization chatter in
//! repository commits and pull requests, new languages appearing on an app
//! store listing, and new hreflang alternates or localization wording on
//! documentation pages.
//!
//! # Features
//!
//! - **Cursor Store**: Per-target, per-source cursors so every observation is
//!   reported exactly once; snapshots survive restarts
//! - **Source Probes**: Repository commits/PRs, app store language sweeps,
//!   docs hreflang and content-digest checks, all behind one trait
//! - **Signal Classifier**: Pure mapping from raw observations to prioritized,
//!   deduplicated signals
//! - **Bounded Fan-Out**: Concurrent probing with a hard cap, cursor updates
//!   applied only after a unit fully succeeds
//! - **Alert Sink**: Durable append-only signal log, webhook subscriptions,
//!   optional chat relay
//! - **HTTP API**: Manual cycle triggers, signal queries, webhook management
//!
//! # Example
//!
//! ```no_run
//! use locwatch::model::{StaticTargets, Target};
//! use locwatch::config::MonitorConfig;
//! use std::sync::Arc;
//!
//! let config = Arc::new(MonitorConfig::default());
//! let targets = StaticTargets(vec![
//!     Target::new("Acme")
//!         .with_repos("acme", &["app", "web"])
//!         .with_app_package("com.acme.app")
//!         .with_doc_url("https://docs.acme.com/"),
//! ]);
//! # let _ = (config, targets);
//! ```

pub mod api;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod detect;
pub mod model;
pub mod net;
pub mod probes;
pub mod scheduler;
pub mod sink;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use cursor::{Cursor, CursorError, CursorStore};
pub use model::{Priority, Signal, SignalKind, SourceClass, Target};
pub use scheduler::{Coordinator, CycleError, CycleReport, MonitorWorker};
pub use sink::{AlertSink, SignalStore};
