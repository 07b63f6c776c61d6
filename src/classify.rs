//! Signal classifier: a deterministic mapping from raw observations to
//! typed signals. No network or store access; duplicates within one cycle
//! for the same evidence and kind collapse to a single signal.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;

use crate::model::{Signal, SignalKind, SourceClass};
use crate::probes::Observation;

/// First line of a message, truncated for titles.
fn short(message: &str, max: usize) -> String {
    let line = message.lines().next().unwrap_or("");
    line.chars().take(max).collect()
}

fn display_files(files: &[String]) -> String {
    let names: Vec<&str> = files
        .iter()
        .take(3)
        .map(|f| f.rsplit('/').next().unwrap_or(f))
        .collect();
    let mut out = names.join(", ");
    if files.len() > 3 {
        out.push_str(&format!(" (+{} more)", files.len() - 3));
    }
    out
}

fn build(
    target: &str,
    source: SourceClass,
    observation: &Observation,
) -> (Signal, String) {
    let (kind, title, body, keywords, url, metadata, evidence) = match observation {
        Observation::NewLocalizationFiles {
            repo,
            sha,
            author,
            message,
            files,
            languages,
            url,
        } => (
            SignalKind::NewLangFile,
            format!("{repo}: {}", display_files(files)),
            format!(
                "New localization files by {author}. {}",
                short(message, 100)
            ),
            if languages.is_empty() {
                vec!["new localization file".to_string()]
            } else {
                languages.clone()
            },
            url.clone(),
            json!({
                "sha": sha,
                "author": author,
                "files": files.iter().take(5).collect::<Vec<_>>(),
            }),
            sha.clone(),
        ),
        Observation::CommitKeywords {
            repo,
            sha,
            author,
            message,
            keywords,
            url,
        } => (
            SignalKind::Keyword,
            format!("{repo}: {}", short(message, 100)),
            format!("By {author}"),
            keywords.clone(),
            url.clone(),
            json!({ "sha": sha, "author": author }),
            sha.clone(),
        ),
        Observation::OpenPr {
            repo,
            number,
            title,
            author,
            keywords,
            url,
        } => (
            SignalKind::OpenPr,
            format!("{repo} PR #{number}: {}", short(title, 80)),
            format!("Open pull request by {author} - early localization signal"),
            keywords.clone(),
            url.clone(),
            json!({ "pr_number": number, "author": author }),
            url.clone(),
        ),
        Observation::NewAppLanguages {
            package,
            added,
            total,
            url,
        } => (
            SignalKind::NewAppLang,
            format!("{package}: +{} languages", added.len()),
            format!("Added: {}. Total: {total} languages.", added.join(", ")),
            added.clone(),
            url.clone(),
            json!({
                "package": package,
                "new_langs": added,
                "total_langs": total,
            }),
            package.clone(),
        ),
        Observation::NewHreflangs { url, added, total } => (
            SignalKind::NewHreflang,
            format!(
                "New regional docs: {}",
                added.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
            ),
            format!("Doc change detected: {url}"),
            added.clone(),
            url.clone(),
            json!({ "new_hreflangs": added, "total_hreflangs": total }),
            url.clone(),
        ),
        Observation::DocKeywords {
            url,
            keywords,
            first_scan,
        } => (
            SignalKind::Keyword,
            format!("Doc change detected: {}", short(url, 80)),
            if *first_scan {
                "New keywords: first scan".to_string()
            } else {
                format!("New keywords: {}", keywords.join(", "))
            },
            keywords.clone(),
            url.clone(),
            json!({ "first_scan": first_scan }),
            url.clone(),
        ),
    };

    let priority = kind.priority();
    (
        Signal {
            source,
            target: target.to_string(),
            kind,
            title,
            body,
            keywords,
            url,
            metadata,
            priority,
            detected_at: Utc::now(),
        },
        evidence,
    )
}

/// Classify one unit's observations. The same evidence reaching this twice
/// in a cycle (e.g. one commit surfacing via two code paths) yields exactly
/// one signal per `(kind, evidence)` pair.
pub fn classify(
    target: &str,
    source: SourceClass,
    observations: &[Observation],
) -> Vec<Signal> {
    let mut seen: HashSet<(SignalKind, String)> = HashSet::new();
    let mut signals = Vec::new();
    for observation in observations {
        let (signal, evidence) = build(target, source, observation);
        if seen.insert((signal.kind, evidence)) {
            signals.push(signal);
        }
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    fn lang_file_obs(sha: &str) -> Observation {
        Observation::NewLocalizationFiles {
            repo: "acme/app".to_string(),
            sha: sha.to_string(),
            author: "Jane".to_string(),
            message: "add spanish\n\nlong body".to_string(),
            files: vec!["locales/es.json".to_string()],
            languages: vec!["es".to_string()],
            url: format!("http://gh/{sha}"),
        }
    }

    #[test]
    fn test_new_lang_file_signal_shape() {
        let signals = classify("Acme", SourceClass::Repository, &[lang_file_obs("c1")]);
        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.kind, SignalKind::NewLangFile);
        assert_eq!(signal.priority, Priority::High);
        assert_eq!(signal.keywords, vec!["es".to_string()]);
        assert_eq!(signal.title, "acme/app: es.json");
        assert!(signal.body.contains("by Jane"));
        assert_eq!(signal.metadata["sha"], "c1");
    }

    #[test]
    fn test_duplicate_evidence_collapses() {
        let signals = classify(
            "Acme",
            SourceClass::Repository,
            &[lang_file_obs("c1"), lang_file_obs("c1")],
        );
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn test_same_evidence_different_kind_kept() {
        let keyword = Observation::CommitKeywords {
            repo: "acme/app".to_string(),
            sha: "c1".to_string(),
            author: "Jane".to_string(),
            message: "add spanish".to_string(),
            keywords: vec!["spanish".to_string()],
            url: "http://gh/c1".to_string(),
        };
        let signals = classify(
            "Acme",
            SourceClass::Repository,
            &[lang_file_obs("c1"), keyword],
        );
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn test_keyword_signal_is_low_priority() {
        let obs = Observation::DocKeywords {
            url: "https://docs.acme.com".to_string(),
            keywords: vec!["translation".to_string()],
            first_scan: false,
        };
        let signals = classify("Acme", SourceClass::Docs, &[obs]);
        assert_eq!(signals[0].kind, SignalKind::Keyword);
        assert_eq!(signals[0].priority, Priority::Low);
        assert!(signals[0].body.contains("translation"));
    }

    #[test]
    fn test_app_lang_signal() {
        let obs = Observation::NewAppLanguages {
            package: "com.acme.app".to_string(),
            added: vec!["hi".to_string(), "th".to_string()],
            total: 12,
            url: "http://store?id=com.acme.app".to_string(),
        };
        let signals = classify("Acme", SourceClass::AppStore, &[obs]);
        assert_eq!(signals[0].kind, SignalKind::NewAppLang);
        assert_eq!(signals[0].title, "com.acme.app: +2 languages");
        assert_eq!(signals[0].metadata["total_langs"], 12);
    }

    #[test]
    fn test_file_display_truncates() {
        let files: Vec<String> = (0..5).map(|i| format!("locales/f{i}.json")).collect();
        assert_eq!(
            display_files(&files),
            "f0.json, f1.json, f2.json (+2 more)"
        );
    }
}
