//! App-store language probe: sweeps a candidate language list against an
//! app's localized listing pages and diffs the confirmed-supported set.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::config::{FirstScanPolicy, MonitorConfig};
use crate::cursor::{Cursor, CursorKey, CursorKind};
use crate::model::{SourceClass, Target};
use crate::net::{self, Fetcher};

use super::{CursorView, Observation, Probe, ProbeUnit, SoftReason, UnitOutcome};

pub struct AppStoreProbe {
    config: Arc<MonitorConfig>,
    fetcher: Arc<dyn Fetcher>,
    description_re: Regex,
}

impl AppStoreProbe {
    pub fn new(config: Arc<MonitorConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        // content attribute may precede or follow the name/property attribute
        let description_re = Regex::new(
            r#"(?is)<meta\b[^>]*?(?:name|property|itemprop)\s*=\s*["'](?:og:)?description["'][^>]*?content\s*=\s*["']([^"']+)["']|<meta\b[^>]*?content\s*=\s*["']([^"']+)["'][^>]*?(?:name|property|itemprop)\s*=\s*["'](?:og:)?description["']"#,
        )
        .expect("static regex");
        Self {
            config,
            fetcher,
            description_re,
        }
    }

    fn listing_url(&self, package: &str, lang: &str) -> String {
        format!("{}?id={}&hl={}&gl=us", self.config.store_base, package, lang)
    }

    pub fn public_url(&self, package: &str) -> String {
        format!("{}?id={}", self.config.store_base, package)
    }

    fn extract_description(&self, html: &str) -> Option<String> {
        self.description_re.captures(html).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        })
    }

    /// Sweep every candidate language. All-or-nothing: any transport or
    /// server failure aborts the unit so a partial set is never mistaken for
    /// dropped (and later re-added) language support.
    async fn sweep(&self, package: &str) -> Result<BTreeSet<String>, SoftReason> {
        let mut supported = BTreeSet::new();
        for lang in &self.config.app_candidate_langs {
            let request = net::page_request(self.listing_url(package, lang));
            let response = self.fetcher.get(request).await.map_err(SoftReason::from)?;
            if response.is_rate_limited() {
                return Err(SoftReason::RateLimited);
            }
            if response.status >= 500 {
                return Err(SoftReason::Http(response.status));
            }
            // 404 for one language just means "not offered in this locale"
            if response.is_success() && self.extract_description(&response.body).is_some() {
                supported.insert(lang.clone());
            }
        }
        Ok(supported)
    }
}

#[async_trait]
impl Probe for AppStoreProbe {
    fn source(&self) -> SourceClass {
        SourceClass::AppStore
    }

    fn units(&self, target: &Target) -> Vec<ProbeUnit> {
        target
            .app_package
            .iter()
            .map(|package| ProbeUnit {
                target: target.name.clone(),
                source: SourceClass::AppStore,
                scope: package.clone(),
            })
            .collect()
    }

    async fn probe(&self, unit: &ProbeUnit, cursors: &CursorView<'_>) -> UnitOutcome {
        let key = CursorKey::new(&unit.target, CursorKind::AppLanguages, &unit.scope);
        let prior = match cursors.get(&key) {
            Some(Cursor::Languages { codes }) => Some(codes),
            Some(_) | None => None,
        };

        let current = match self.sweep(&unit.scope).await {
            Ok(set) => set,
            Err(reason) => {
                tracing::warn!(unit = %unit, reason = %reason, "listing sweep aborted");
                return UnitOutcome::soft(unit.clone(), reason);
            }
        };

        // A live listing supports at least one language; an empty sweep
        // means the package page is gone or unparseable.
        if current.is_empty() {
            tracing::warn!(unit = %unit, "no supported languages found");
            return UnitOutcome::soft(unit.clone(), SoftReason::NotFound);
        }

        let mut outcome = UnitOutcome::ok(unit.clone());
        match prior {
            Some(prior) => {
                let added: Vec<String> = current.difference(&prior).cloned().collect();
                if !added.is_empty() {
                    outcome.observations.push(Observation::NewAppLanguages {
                        package: unit.scope.clone(),
                        added,
                        total: current.len(),
                        url: self.public_url(&unit.scope),
                    });
                }
            }
            None => {
                if self.config.delta_first_scan == FirstScanPolicy::Report {
                    outcome.observations.push(Observation::NewAppLanguages {
                        package: unit.scope.clone(),
                        added: current.iter().cloned().collect(),
                        total: current.len(),
                        url: self.public_url(&unit.scope),
                    });
                }
            }
        }

        outcome.advance(key, Cursor::Languages { codes: current })
    }
}
