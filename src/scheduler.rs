//! Scheduler and concurrency coordinator.
//!
//! Each cycle fans probe units out to a bounded pool, waits for all of them
//! at a barrier, then sequentially classifies observations, hands signals to
//! the sink, and applies cursor deltas. No cursor is advanced until its
//! unit's observations have reached the sink, and no worker ever mutates
//! shared state: all deltas flow back to the coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::classify::classify;
use crate::config::MonitorConfig;
use crate::cursor::{CursorDelta, CursorStore};
use crate::model::{SourceClass, Target, TargetError, TargetSource};
use crate::net::{Fetcher, GithubClient};
use crate::probes::{AppStoreProbe, CursorView, DocProbe, Probe, ProbeUnit, RepoProbe, UnitStatus};
use crate::sink::AlertSink;

/// Per-cycle aggregate counts, the only user-visible failure surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CycleReport {
    pub source: SourceClass,
    pub units: usize,
    pub signals: usize,
    pub soft_errors: usize,
    pub failures: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("target configuration unavailable: {0}")]
    Targets(#[from] TargetError),
}

pub struct Coordinator {
    config: Arc<MonitorConfig>,
    targets: Arc<dyn TargetSource>,
    probes: Vec<Arc<dyn Probe>>,
    cursors: Arc<CursorStore>,
    sink: Arc<AlertSink>,
}

impl Coordinator {
    pub fn new(
        config: Arc<MonitorConfig>,
        targets: Arc<dyn TargetSource>,
        probes: Vec<Arc<dyn Probe>>,
        cursors: Arc<CursorStore>,
        sink: Arc<AlertSink>,
    ) -> Self {
        Self {
            config,
            targets,
            probes,
            cursors,
            sink,
        }
    }

    /// Coordinator with the three standard probes over a shared fetcher.
    pub fn with_default_probes(
        config: Arc<MonitorConfig>,
        targets: Arc<dyn TargetSource>,
        fetcher: Arc<dyn Fetcher>,
        github: Arc<GithubClient>,
        cursors: Arc<CursorStore>,
        sink: Arc<AlertSink>,
    ) -> Self {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(RepoProbe::new(config.clone(), fetcher.clone(), github)),
            Arc::new(AppStoreProbe::new(config.clone(), fetcher.clone())),
            Arc::new(DocProbe::new(config.clone(), fetcher)),
        ];
        Self::new(config, targets, probes, cursors, sink)
    }

    /// Run one cycle for a source class: enumerate targets × identifiers,
    /// probe every unit concurrently (bounded), then settle results.
    pub async fn run_cycle(&self, class: SourceClass) -> Result<CycleReport, CycleError> {
        let targets = self.targets.load()?;

        // Cursors for targets dropped from the configuration are collected
        // here rather than at removal time. An empty list never collects:
        // it reads as a truncated config, not a teardown of every target.
        if !targets.is_empty() {
            let live: std::collections::HashSet<String> =
                targets.iter().map(|t| t.name.clone()).collect();
            let removed = self.cursors.retain_targets(&live);
            if removed > 0 {
                tracing::info!(removed, "garbage collected cursors of removed targets");
            }
        }

        let units = self.collect_units(class, &targets);
        let unit_count = units.len();

        tracing::info!(source = %class, units = unit_count, "cycle started");

        let cursors = self.cursors.clone();
        let probe_futures: Vec<_> = units
            .into_iter()
            .map(|(probe, unit)| {
                let cursors = cursors.clone();
                async move {
                    let view = CursorView::new(&cursors);
                    probe.probe(&unit, &view).await
                }
            })
            .collect();
        let outcomes: Vec<_> = stream::iter(probe_futures)
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        // Barrier passed: settle sequentially. Each unit's cursor deltas are
        // staged only after its signals have been handed to the sink.
        let mut report = CycleReport {
            source: class,
            units: unit_count,
            signals: 0,
            soft_errors: 0,
            failures: 0,
        };
        let mut deltas: Vec<CursorDelta> = Vec::new();

        for outcome in outcomes {
            match outcome.status {
                UnitStatus::Ok => {
                    let signals =
                        classify(&outcome.unit.target, outcome.unit.source, &outcome.observations);
                    let mut persisted_all = true;
                    for signal in &signals {
                        match self.sink.emit(signal).await {
                            Ok(_) => report.signals += 1,
                            Err(e) => {
                                tracing::error!(unit = %outcome.unit, error = %e, "signal persistence failed");
                                persisted_all = false;
                                break;
                            }
                        }
                    }
                    if persisted_all {
                        deltas.extend(outcome.cursor_updates);
                    } else {
                        // No observation may be silently dropped after a
                        // cursor advance, so the advance is withheld.
                        report.failures += 1;
                    }
                }
                UnitStatus::Soft(reason) => {
                    tracing::debug!(unit = %outcome.unit, reason = %reason, "unit deferred to next cycle");
                    report.soft_errors += 1;
                }
                UnitStatus::Failed(error) => {
                    tracing::error!(unit = %outcome.unit, error = %error, "unit failed");
                    report.failures += 1;
                }
            }
        }

        self.cursors.apply_all(deltas);
        if let Err(e) = self.cursors.flush() {
            tracing::error!(source = %class, error = %e, "cursor snapshot flush failed");
        }

        tracing::info!(
            source = %class,
            units = report.units,
            signals = report.signals,
            soft_errors = report.soft_errors,
            failures = report.failures,
            "cycle complete"
        );
        Ok(report)
    }

    /// Manual trigger: run every source class once.
    pub async fn run_all(&self) -> Result<Vec<CycleReport>, CycleError> {
        let mut reports = Vec::new();
        for class in [SourceClass::Repository, SourceClass::AppStore, SourceClass::Docs] {
            reports.push(self.run_cycle(class).await?);
        }
        Ok(reports)
    }

    fn collect_units(
        &self,
        class: SourceClass,
        targets: &[Target],
    ) -> Vec<(Arc<dyn Probe>, ProbeUnit)> {
        let mut units = Vec::new();
        for probe in &self.probes {
            if probe.source() != class {
                continue;
            }
            for target in targets {
                for unit in probe.units(target) {
                    units.push((probe.clone(), unit));
                }
            }
        }
        units
    }
}

/// Background driver with independent fast (repository/PR) and slow
/// (app-store/documentation) schedules. Cycles are awaited inline, so a new
/// cycle for a class never starts while one is in flight, and in-flight
/// work is never cancelled by timer expiry.
pub struct MonitorWorker {
    coordinator: Arc<Coordinator>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl MonitorWorker {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
        }
    }

    pub fn start(&mut self) -> tokio::task::JoinHandle<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.running.store(true, Ordering::SeqCst);

        let coordinator = self.coordinator.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let config = coordinator.config.clone();
            tracing::info!(
                fast_secs = config.fast_interval.as_secs(),
                slow_secs = config.slow_interval.as_secs(),
                "monitor worker started"
            );

            let mut fast = interval(config.fast_interval);
            let mut slow = interval(config.slow_interval);
            // A cycle can outlast its interval; skip the burst of missed ticks
            fast.set_missed_tick_behavior(MissedTickBehavior::Delay);
            slow.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = fast.tick() => {
                        if let Err(e) = coordinator.run_cycle(SourceClass::Repository).await {
                            tracing::error!(error = %e, "repository cycle aborted");
                        }
                    }
                    _ = slow.tick() => {
                        for class in [SourceClass::AppStore, SourceClass::Docs] {
                            if let Err(e) = coordinator.run_cycle(class).await {
                                tracing::error!(source = %class, error = %e, "cycle aborted");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("monitor worker shutting down");
                        break;
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
        })
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{Cursor, CursorDelta, CursorKey, CursorKind};
    use crate::model::{SignalKind, StaticTargets};
    use crate::net::stub::StubFetcher;
    use crate::sink::{MemoryStore, SignalFilter, SignalStore, StoreError, WebhookRegistry};
    use async_trait::async_trait;

    fn acme() -> Target {
        Target::new("Acme").with_repos("acme", &["app"])
    }

    fn test_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.repo_api_base = "http://api".to_string();
        config
    }

    fn coordinator_with(
        fetcher: Arc<StubFetcher>,
        store: Arc<dyn SignalStore>,
        targets: Vec<Target>,
        cursors: Arc<CursorStore>,
    ) -> Coordinator {
        let config = Arc::new(test_config());
        let sink = Arc::new(AlertSink::new(
            store,
            Arc::new(WebhookRegistry::in_memory()),
            None,
        ));
        Coordinator::with_default_probes(
            config,
            Arc::new(StaticTargets(targets)),
            fetcher,
            Arc::new(GithubClient::with_token("t", None)),
            cursors,
            sink,
        )
    }

    const COMMITS_URL: &str = "http://api/repos/acme/app/commits?per_page=20";

    fn commit_json(sha: &str) -> String {
        format!(
            r#"{{"sha":"{sha}","html_url":"http://gh/{sha}","commit":{{"message":"add strings","author":{{"name":"Jane"}}}}}}"#
        )
    }

    fn commit_cursor() -> CursorKey {
        CursorKey::new("Acme", CursorKind::LastCommit, "acme/app")
    }

    #[tokio::test]
    async fn test_three_cycle_scenario() {
        let fetcher = Arc::new(StubFetcher::new());
        // Cycle 1 and 2 see the same page; cycle 3 is rate limited
        let page = format!("[{},{}]", commit_json("c1"), commit_json("c0"));
        fetcher.respond(COMMITS_URL, 200, &page);
        fetcher.respond(COMMITS_URL, 200, &page);
        fetcher.respond(COMMITS_URL, 403, r#"{"message":"rate limited"}"#);
        fetcher.respond(
            "http://api/repos/acme/app/commits/c1",
            200,
            r#"{"files":[{"filename":"locales/es.json","status":"added"}]}"#,
        );

        let store = Arc::new(MemoryStore::new());
        let cursors = Arc::new(CursorStore::in_memory());
        cursors.apply(CursorDelta::new(commit_cursor(), Cursor::Commit { sha: "c0".into() }));
        let coordinator =
            coordinator_with(fetcher, store.clone(), vec![acme()], cursors.clone());

        // Cycle 1: one new commit adding locales/es.json
        let report = coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert_eq!(report.units, 1);
        assert_eq!(report.signals, 1);
        assert_eq!(report.soft_errors, 0);
        assert_eq!(cursors.get(&commit_cursor()), Some(Cursor::Commit { sha: "c1".into() }));

        let stored = store.list(&SignalFilter::default()).await.unwrap();
        assert_eq!(stored[0].signal.kind, SignalKind::NewLangFile);
        assert_eq!(stored[0].signal.keywords, vec!["es".to_string()]);

        // Cycle 2: nothing new, cursor unchanged
        let report = coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert_eq!(report.signals, 0);
        assert_eq!(cursors.get(&commit_cursor()), Some(Cursor::Commit { sha: "c1".into() }));

        // Cycle 3: rate limited, soft error, cursor unchanged
        let report = coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert_eq!(report.signals, 0);
        assert_eq!(report.soft_errors, 1);
        assert_eq!(cursors.get(&commit_cursor()), Some(Cursor::Commit { sha: "c1".into() }));
        assert_eq!(store.list(&SignalFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unit_failures_are_isolated() {
        let fetcher = Arc::new(StubFetcher::new());
        let good = format!("[{},{}]", commit_json("c1"), commit_json("c0"));
        fetcher.respond(COMMITS_URL, 200, &good);
        fetcher.respond(
            "http://api/repos/acme/app/commits/c1",
            200,
            r#"{"files":[{"filename":"locales/fr.json","status":"added"}]}"#,
        );
        // Second target's repository is gone
        fetcher.respond("http://api/repos/beta/web/commits?per_page=20", 404, "");

        let store = Arc::new(MemoryStore::new());
        let cursors = Arc::new(CursorStore::in_memory());
        cursors.apply(CursorDelta::new(commit_cursor(), Cursor::Commit { sha: "c0".into() }));
        let beta = Target::new("Beta").with_repos("beta", &["web"]);
        let coordinator =
            coordinator_with(fetcher, store.clone(), vec![acme(), beta], cursors.clone());

        let report = coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert_eq!(report.units, 2);
        assert_eq!(report.signals, 1);
        assert_eq!(report.soft_errors, 1);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn test_empty_target_list_preserves_cursors() {
        let fetcher = Arc::new(StubFetcher::new());
        let store = Arc::new(MemoryStore::new());
        let cursors = Arc::new(CursorStore::in_memory());
        cursors.apply(CursorDelta::new(commit_cursor(), Cursor::Commit { sha: "c0".into() }));
        let coordinator = coordinator_with(fetcher, store, Vec::new(), cursors.clone());

        let report = coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert_eq!(report.units, 0);
        // Baselines survive a cycle that loaded zero targets
        assert_eq!(cursors.get(&commit_cursor()), Some(Cursor::Commit { sha: "c0".into() }));
    }

    #[tokio::test]
    async fn test_removed_target_cursors_garbage_collected() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(COMMITS_URL, 200, "[]");
        let store = Arc::new(MemoryStore::new());
        let cursors = Arc::new(CursorStore::in_memory());
        let gone = CursorKey::new("Gone", CursorKind::LastCommit, "gone/app");
        cursors.apply(CursorDelta::new(gone.clone(), Cursor::Commit { sha: "z".into() }));
        let coordinator = coordinator_with(fetcher, store, vec![acme()], cursors.clone());

        coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert!(cursors.get(&gone).is_none());
    }

    struct FailingStore;

    #[async_trait]
    impl SignalStore for FailingStore {
        async fn save(&self, _signal: &crate::model::Signal) -> Result<u64, StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        async fn list(
            &self,
            _filter: &SignalFilter,
        ) -> Result<Vec<crate::sink::StoredSignal>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_withholds_cursor_advance() {
        let fetcher = Arc::new(StubFetcher::new());
        let page = format!("[{},{}]", commit_json("c1"), commit_json("c0"));
        fetcher.respond(COMMITS_URL, 200, &page);
        fetcher.respond(
            "http://api/repos/acme/app/commits/c1",
            200,
            r#"{"files":[{"filename":"locales/es.json","status":"added"}]}"#,
        );

        let cursors = Arc::new(CursorStore::in_memory());
        cursors.apply(CursorDelta::new(commit_cursor(), Cursor::Commit { sha: "c0".into() }));
        let coordinator = coordinator_with(
            fetcher,
            Arc::new(FailingStore),
            vec![acme()],
            cursors.clone(),
        );

        let report = coordinator.run_cycle(SourceClass::Repository).await.unwrap();
        assert_eq!(report.failures, 1);
        assert_eq!(report.signals, 0);
        // The unit's observation never reached the sink, so its cursor must
        // not advance; the commit is re-examined next cycle.
        assert_eq!(cursors.get(&commit_cursor()), Some(Cursor::Commit { sha: "c0".into() }));
    }

    #[tokio::test]
    async fn test_worker_start_stop() {
        let fetcher = Arc::new(StubFetcher::new());
        let store = Arc::new(MemoryStore::new());
        let cursors = Arc::new(CursorStore::in_memory());
        let coordinator = Arc::new(coordinator_with(fetcher, store, Vec::new(), cursors));

        let mut worker = MonitorWorker::new(coordinator);
        let handle = worker.start();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(worker.is_running());

        worker.stop().await;
        handle.await.unwrap();
        assert!(!worker.is_running());
    }
}
