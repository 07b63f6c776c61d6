//! Documentation-page probe: tracks two independent signals per URL, the
//! hreflang alternate set and a digest/keyword view of the visible text.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::config::{FirstScanPolicy, MonitorConfig};
use crate::cursor::{Cursor, CursorKey, CursorKind};
use crate::detect;
use crate::model::{SourceClass, Target};
use crate::net::{self, Fetcher};

use super::{CursorView, Observation, Probe, ProbeUnit, SoftReason, UnitOutcome};

pub struct DocProbe {
    config: Arc<MonitorConfig>,
    fetcher: Arc<dyn Fetcher>,
    link_re: Regex,
    hreflang_re: Regex,
    rel_alternate_re: Regex,
    chrome_re: Regex,
    tag_re: Regex,
    space_re: Regex,
}

impl DocProbe {
    pub fn new(config: Arc<MonitorConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            link_re: Regex::new(r"(?is)<link\b[^>]*>").expect("static regex"),
            hreflang_re: Regex::new(r#"(?i)hreflang\s*=\s*["']?([a-z0-9-]+)"#)
                .expect("static regex"),
            rel_alternate_re: Regex::new(r#"(?i)rel\s*=\s*["']?alternate"#).expect("static regex"),
            chrome_re: Regex::new(
                r"(?is)<script\b.*?</script>|<style\b.*?</style>|<nav\b.*?</nav>|<header\b.*?</header>|<footer\b.*?</footer>",
            )
            .expect("static regex"),
            tag_re: Regex::new(r"(?s)<[^>]+>").expect("static regex"),
            space_re: Regex::new(r"\s+").expect("static regex"),
        }
    }

    /// Alternate-language link codes, lowercased, `x-default` excluded.
    fn extract_hreflangs(&self, html: &str) -> BTreeSet<String> {
        self.link_re
            .find_iter(html)
            .filter(|tag| self.rel_alternate_re.is_match(tag.as_str()))
            .filter_map(|tag| {
                self.hreflang_re
                    .captures(tag.as_str())
                    .map(|c| c[1].to_lowercase())
            })
            .filter(|code| code != "x-default")
            .collect()
    }

    /// Strip scripts, styles, and page chrome, then all markup, and collapse
    /// whitespace into the visible-text form that gets digested.
    fn visible_text(&self, html: &str) -> String {
        let without_chrome = self.chrome_re.replace_all(html, " ");
        let without_tags = self.tag_re.replace_all(&without_chrome, " ");
        self.space_re
            .replace_all(&without_tags, " ")
            .trim()
            .to_string()
    }

    fn digest(text: &str) -> String {
        blake3::hash(text.as_bytes()).to_hex().to_string()
    }
}

#[async_trait]
impl Probe for DocProbe {
    fn source(&self) -> SourceClass {
        SourceClass::Docs
    }

    fn units(&self, target: &Target) -> Vec<ProbeUnit> {
        target
            .doc_urls
            .iter()
            .map(|url| ProbeUnit {
                target: target.name.clone(),
                source: SourceClass::Docs,
                scope: url.clone(),
            })
            .collect()
    }

    async fn probe(&self, unit: &ProbeUnit, cursors: &CursorView<'_>) -> UnitOutcome {
        let response = match self.fetcher.get(net::page_request(&unit.scope)).await {
            Ok(r) => r,
            Err(e) => return UnitOutcome::soft(unit.clone(), e.into()),
        };
        if response.is_rate_limited() {
            return UnitOutcome::soft(unit.clone(), SoftReason::RateLimited);
        }
        if response.is_not_found() {
            tracing::warn!(unit = %unit, "documentation page not found");
            return UnitOutcome::soft(unit.clone(), SoftReason::NotFound);
        }
        if !response.is_success() {
            return UnitOutcome::soft(unit.clone(), SoftReason::Http(response.status));
        }

        let mut outcome = UnitOutcome::ok(unit.clone());

        // Signal (a): hreflang alternates. Additions count once a baseline
        // cursor exists, even an empty one; the first scan follows the
        // configured delta policy.
        let hreflang_key = CursorKey::new(&unit.target, CursorKind::Hreflangs, &unit.scope);
        let current_hreflangs = self.extract_hreflangs(&response.body);
        match cursors.get(&hreflang_key) {
            Some(Cursor::Hreflangs { codes: prior }) => {
                let added: Vec<String> = current_hreflangs.difference(&prior).cloned().collect();
                if !added.is_empty() {
                    outcome.observations.push(Observation::NewHreflangs {
                        url: unit.scope.clone(),
                        added,
                        total: current_hreflangs.len(),
                    });
                }
            }
            Some(_) | None => {
                if self.config.delta_first_scan == FirstScanPolicy::Report
                    && !current_hreflangs.is_empty()
                {
                    outcome.observations.push(Observation::NewHreflangs {
                        url: unit.scope.clone(),
                        added: current_hreflangs.iter().cloned().collect(),
                        total: current_hreflangs.len(),
                    });
                }
            }
        }
        outcome = outcome.advance(
            hreflang_key,
            Cursor::Hreflangs {
                codes: current_hreflangs,
            },
        );

        // Signal (b): content digest + keyword delta.
        let content_key = CursorKey::new(&unit.target, CursorKind::DocContent, &unit.scope);
        let text = self.visible_text(&response.body);
        let digest = Self::digest(&text);
        let matched: BTreeSet<String> = detect::contains_keywords(&text, &self.config.keywords)
            .into_iter()
            .map(String::from)
            .collect();

        match cursors.get(&content_key) {
            Some(Cursor::Content {
                digest: prior_digest,
                keywords: prior_keywords,
            }) => {
                if digest != prior_digest {
                    let new_keywords: Vec<String> =
                        matched.difference(&prior_keywords).cloned().collect();
                    if !new_keywords.is_empty() {
                        outcome.observations.push(Observation::DocKeywords {
                            url: unit.scope.clone(),
                            keywords: new_keywords,
                            first_scan: false,
                        });
                    }
                }
            }
            Some(_) | None => {
                // The keyword check intentionally reports its first scan,
                // unlike the delta-based probes.
                if self.config.doc_keyword_first_scan == FirstScanPolicy::Report
                    && !matched.is_empty()
                {
                    outcome.observations.push(Observation::DocKeywords {
                        url: unit.scope.clone(),
                        keywords: matched.iter().cloned().collect(),
                        first_scan: true,
                    });
                }
            }
        }
        outcome.advance(
            content_key,
            Cursor::Content {
                digest,
                keywords: matched,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{CursorDelta, CursorStore};
    use crate::net::stub::StubFetcher;
    use crate::probes::UnitStatus;

    const URL: &str = "https://docs.acme.com/api";

    fn probe_with(fetcher: Arc<StubFetcher>) -> DocProbe {
        DocProbe::new(Arc::new(MonitorConfig::default()), fetcher)
    }

    fn unit() -> ProbeUnit {
        ProbeUnit {
            target: "Acme".to_string(),
            source: SourceClass::Docs,
            scope: URL.to_string(),
        }
    }

    fn hreflang_key() -> CursorKey {
        CursorKey::new("Acme", CursorKind::Hreflangs, URL)
    }

    fn content_key() -> CursorKey {
        CursorKey::new("Acme", CursorKind::DocContent, URL)
    }

    fn page(links: &str, body: &str) -> String {
        format!(
            "<html><head>{links}<style>.x{{color:red}}</style></head>\
             <body><nav>menu</nav><p>{body}</p><script>var x=1;</script></body></html>"
        )
    }

    #[tokio::test]
    async fn test_first_scan_reports_keywords_once() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(URL, 200, &page("", "Our API supports localization workflows"));
        let probe = probe_with(fetcher);
        let store = CursorStore::in_memory();

        let outcome = probe.probe(&unit(), &CursorView::new(&store)).await;

        assert_eq!(outcome.status, UnitStatus::Ok);
        assert_eq!(outcome.observations.len(), 1);
        match &outcome.observations[0] {
            Observation::DocKeywords { keywords, first_scan, .. } => {
                assert!(*first_scan);
                assert!(keywords.contains(&"localization".to_string()));
            }
            other => panic!("unexpected observation: {other:?}"),
        }
        // Both cursors established
        assert_eq!(outcome.cursor_updates.len(), 2);
    }

    #[tokio::test]
    async fn test_keyword_delta_reports_only_new_keywords() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(URL, 200, &page("", "Now with translation and i18n support"));
        let probe = probe_with(fetcher);
        let store = CursorStore::in_memory();
        store.apply(CursorDelta::new(
            content_key(),
            Cursor::Content {
                digest: "old-digest".to_string(),
                keywords: ["i18n".to_string(), "language".to_string()]
                    .into_iter()
                    .collect(),
            },
        ));
        store.apply(CursorDelta::new(
            hreflang_key(),
            Cursor::Hreflangs { codes: BTreeSet::new() },
        ));

        let outcome = probe.probe(&unit(), &CursorView::new(&store)).await;

        assert_eq!(outcome.observations.len(), 1);
        match &outcome.observations[0] {
            Observation::DocKeywords { keywords, first_scan, .. } => {
                assert!(!*first_scan);
                assert_eq!(keywords, &["translation".to_string()]);
            }
            other => panic!("unexpected observation: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unchanged_digest_reports_nothing() {
        let fetcher = Arc::new(StubFetcher::new());
        let body = page("", "Stable text with translation notes");
        fetcher.respond(URL, 200, &body);
        let probe = probe_with(fetcher.clone());
        let store = CursorStore::in_memory();

        // First pass establishes cursors (and the one-time first-scan event)
        let first = probe.probe(&unit(), &CursorView::new(&store)).await;
        store.apply_all(first.cursor_updates);

        let second = probe.probe(&unit(), &CursorView::new(&store)).await;
        assert!(second.observations.is_empty());
    }

    #[tokio::test]
    async fn test_new_hreflang_detected_once_baseline_exists() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(
            URL,
            200,
            &page(
                r#"<link rel="alternate" hreflang="fr" href="/fr">
                   <link rel="alternate" hreflang="DE" href="/de">
                   <link rel="alternate" hreflang="x-default" href="/">
                   <link rel="stylesheet" hreflang="xx" href="/x.css">"#,
                "plain text",
            ),
        );
        let probe = probe_with(fetcher);
        let store = CursorStore::in_memory();
        store.apply(CursorDelta::new(
            hreflang_key(),
            Cursor::Hreflangs {
                codes: ["fr".to_string()].into_iter().collect(),
            },
        ));

        let outcome = probe.probe(&unit(), &CursorView::new(&store)).await;

        let hreflangs: Vec<_> = outcome
            .observations
            .iter()
            .filter(|o| matches!(o, Observation::NewHreflangs { .. }))
            .collect();
        assert_eq!(hreflangs.len(), 1);
        match hreflangs[0] {
            Observation::NewHreflangs { added, total, .. } => {
                assert_eq!(added, &["de".to_string()]);
                assert_eq!(*total, 2);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_first_hreflang_scan_is_silent() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(
            URL,
            200,
            &page(r#"<link rel="alternate" hreflang="fr" href="/fr">"#, "text"),
        );
        let probe = probe_with(fetcher);
        let store = CursorStore::in_memory();

        let outcome = probe.probe(&unit(), &CursorView::new(&store)).await;

        assert!(!outcome
            .observations
            .iter()
            .any(|o| matches!(o, Observation::NewHreflangs { .. })));
        // Baseline cursor recorded for the next cycle
        assert!(outcome
            .cursor_updates
            .iter()
            .any(|d| matches!(&d.cursor, Cursor::Hreflangs { codes } if codes.contains("fr"))));
    }

    #[tokio::test]
    async fn test_hreflang_first_scan_honors_report_policy() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(
            URL,
            200,
            &page(r#"<link rel="alternate" hreflang="fr" href="/fr">"#, "text"),
        );
        let mut config = MonitorConfig::default();
        config.delta_first_scan = FirstScanPolicy::Report;
        let probe = DocProbe::new(Arc::new(config), fetcher);
        let store = CursorStore::in_memory();

        let outcome = probe.probe(&unit(), &CursorView::new(&store)).await;

        let hreflangs: Vec<_> = outcome
            .observations
            .iter()
            .filter(|o| matches!(o, Observation::NewHreflangs { .. }))
            .collect();
        assert_eq!(hreflangs.len(), 1);
        match hreflangs[0] {
            Observation::NewHreflangs { added, total, .. } => {
                assert_eq!(added, &["fr".to_string()]);
                assert_eq!(*total, 1);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cursors_alone() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(URL, 503, "");
        let probe = probe_with(fetcher);
        let store = CursorStore::in_memory();

        let outcome = probe.probe(&unit(), &CursorView::new(&store)).await;

        assert_eq!(outcome.status, UnitStatus::Soft(SoftReason::Http(503)));
        assert!(outcome.cursor_updates.is_empty());
    }

    #[test]
    fn test_visible_text_strips_markup_and_chrome() {
        let fetcher = Arc::new(StubFetcher::new());
        let probe = probe_with(fetcher);
        let text = probe.visible_text(&page("", "Hello   world"));
        assert_eq!(text, "Hello world");
        assert!(!text.contains("menu"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color:red"));
    }
}
