//! Monitoring configuration: keyword lists, matching rules, and schedules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a probe does on its very first observation of a key, when no prior
/// cursor exists to diff against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstScanPolicy {
    /// Record the observed state silently; report nothing
    Baseline,
    /// Report everything found on the first scan, once
    Report,
}

/// Full monitoring configuration. `Default` mirrors the stock keyword and
/// pattern lists; callers override fields as needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Localization-intent keywords matched against commit messages,
    /// descriptions, and page text
    pub keywords: Vec<String>,
    /// Keywords matched against open pull-request titles
    pub pr_keywords: Vec<String>,
    /// Author substrings identifying automation accounts
    pub bot_patterns: Vec<String>,
    /// Path segments marking localization directories
    pub localization_dirs: Vec<String>,
    /// File extensions counted as localization resources
    pub localization_exts: Vec<String>,
    /// Recognized language codes for filename/path extraction
    pub language_codes: Vec<String>,
    /// Candidate languages swept when probing app store listings
    pub app_candidate_langs: Vec<String>,

    /// Commits fetched per repository per cycle (one page, never more)
    pub commit_page_size: u32,
    /// Open pull requests fetched per repository per cycle
    pub pr_page_size: u32,

    /// Repository/PR polling interval
    #[serde(with = "duration_secs")]
    pub fast_interval: Duration,
    /// App-store/documentation polling interval
    #[serde(with = "duration_secs")]
    pub slow_interval: Duration,
    /// Maximum concurrent in-flight probe units
    pub max_concurrent: usize,
    /// Per-request network timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Directory for cursor/webhook/signal persistence
    pub data_dir: String,

    /// Repository API base, e.g. `https://api.github.com`
    pub repo_api_base: String,
    /// App store listing base, e.g. `https://play.google.com/store/apps/details`
    pub store_base: String,

    /// First-scan behavior for commit, app-language, and hreflang diffs
    pub delta_first_scan: FirstScanPolicy,
    /// First-scan behavior for the documentation keyword check
    pub doc_keyword_first_scan: FirstScanPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "i18n", "l10n", "localization", "localisation", "translate", "translation",
                "rtl", "right-to-left", "pluralization", "language", "locale", "gettext",
                "es.json", "fr.json", "de.json", "ar.json", "ja.json", "ko.json", "zh.json",
                "arabic", "spanish", "french", "german", "korean", "hindi", "japanese",
                "chinese", "portuguese", "italian", "dutch", "russian", "turkish",
                "phrase", "strings", "string file", "translations", "multi-language",
                "international", "internationalization", "i18next", "formatjs", "intl",
                "polyglot", "globalize", "messageformat",
            ]),
            pr_keywords: strings(&[
                "translation", "translate", "localization", "localisation",
                "i18n", "l10n", "language", "arabic", "french", "spanish",
                "german", "chinese", "japanese", "korean", "portuguese",
            ]),
            bot_patterns: strings(&[
                "[bot]", "dependabot", "github-actions", "renovate", "greenkeeper",
                "snyk-bot", "codecov", "semantic-release", "auto-merge",
            ]),
            localization_dirs: strings(&[
                "locales/", "locale/", "i18n/", "l10n/", "translations/", "lang/",
                "languages/", "res/values-", "strings/", "messages/", "intl/",
            ]),
            localization_exts: strings(&[
                ".json", ".yaml", ".yml", ".properties", ".po", ".pot", ".xliff",
                ".strings", ".resx", ".arb",
            ]),
            language_codes: strings(&[
                "ar", "zh", "cs", "da", "nl", "fi", "fr", "de", "el", "he", "hi",
                "hu", "id", "it", "ja", "ko", "ms", "no", "pl", "pt", "pt-br",
                "ro", "ru", "sk", "es", "sv", "th", "tr", "uk", "vi", "bn", "ta",
                "te", "mr", "gu", "kn", "ml", "pa", "sw", "zu", "af", "sq", "am",
                "hy", "az", "eu", "be", "bs", "bg", "ca", "hr", "et", "fil", "gl",
                "ka", "is", "lv", "lt", "mk", "mt", "mn", "ne", "fa", "sr", "si", "sl",
            ]),
            app_candidate_langs: strings(&[
                "en", "es", "fr", "de", "ja", "ko", "zh", "pt", "ru", "ar", "hi",
                "it", "nl", "pl", "tr", "vi", "th", "id",
            ]),
            commit_page_size: 20,
            pr_page_size: 30,
            fast_interval: Duration::from_secs(6 * 60 * 60),
            slow_interval: Duration::from_secs(24 * 60 * 60),
            max_concurrent: 8,
            request_timeout: Duration::from_secs(30),
            data_dir: "monitoring_data".to_string(),
            repo_api_base: "https://api.github.com".to_string(),
            store_base: "https://play.google.com/store/apps/details".to_string(),
            delta_first_scan: FirstScanPolicy::Baseline,
            doc_keyword_first_scan: FirstScanPolicy::Report,
        }
    }
}

impl MonitorConfig {
    /// Apply `LOCWATCH_*` environment overrides for operational knobs.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("LOCWATCH_FAST_INTERVAL_SECS") {
            config.fast_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("LOCWATCH_SLOW_INTERVAL_SECS") {
            config.slow_interval = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("LOCWATCH_MAX_CONCURRENT") {
            config.max_concurrent = (n as usize).max(1);
        }
        if let Some(secs) = env_u64("LOCWATCH_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(dir) = std::env::var("LOCWATCH_DATA_DIR") {
            config.data_dir = dir;
        }
        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
