//! Pure matching helpers shared by the probes and classifier.

/// Return every keyword present in `text` as a case-insensitive substring,
/// preserving the order of the keyword list.
pub fn contains_keywords<'a>(text: &str, keywords: &'a [String]) -> Vec<&'a str> {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .filter(|kw| lower.contains(&kw.to_lowercase()))
        .map(|kw| kw.as_str())
        .collect()
}

/// True if the author string matches any known automation pattern
/// (case-insensitive substring).
pub fn is_bot_author(author: &str, patterns: &[String]) -> bool {
    let lower = author.to_lowercase();
    patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
}

/// A file counts as a localization resource iff its path contains a
/// localization directory marker and its extension is in the configured set.
pub fn is_localization_file(path: &str, dirs: &[String], exts: &[String]) -> bool {
    let lower = path.to_lowercase();
    let in_dir = dirs.iter().any(|d| lower.contains(d.as_str()));
    let has_ext = exts.iter().any(|e| lower.ends_with(e.as_str()));
    in_dir && has_ext
}

/// Extract a language code from a file path. First match wins, in order:
/// exact stem match, `_code`/`-code` stem suffix, `/code/` or `/code.` path
/// segment, `values-code` resource directory.
pub fn extract_language<'a>(path: &str, codes: &'a [String]) -> Option<&'a str> {
    let lower = path.to_lowercase();
    let filename = lower.rsplit('/').next().unwrap_or(&lower);
    let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);

    for code in codes {
        let code = code.as_str();
        if stem == code
            || stem.ends_with(&format!("_{code}"))
            || stem.ends_with(&format!("-{code}"))
        {
            return Some(code);
        }
        if lower.contains(&format!("/{code}/")) || lower.contains(&format!("/{code}.")) {
            return Some(code);
        }
        if lower.contains(&format!("values-{code}")) {
            return Some(code);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    fn config() -> MonitorConfig {
        MonitorConfig::default()
    }

    #[test]
    fn test_contains_keywords_case_insensitive() {
        let c = config();
        let matched = contains_keywords("Added Spanish TRANSLATION support", &c.keywords);
        assert!(matched.contains(&"translation"));
        assert!(matched.contains(&"spanish"));
        assert!(!matched.contains(&"arabic"));
    }

    #[test]
    fn test_bot_author_match() {
        let c = config();
        assert!(is_bot_author("dependabot[bot]", &c.bot_patterns));
        assert!(is_bot_author("Renovate Bot", &c.bot_patterns));
        assert!(!is_bot_author("Jane Doe", &c.bot_patterns));
    }

    #[test]
    fn test_localization_file_requires_both_dir_and_ext() {
        let c = config();
        assert!(is_localization_file(
            "locales/fr.json",
            &c.localization_dirs,
            &c.localization_exts
        ));
        // .xml is not in the extension set
        assert!(!is_localization_file(
            "app/src/main/res/values-es/strings.xml",
            &c.localization_dirs,
            &c.localization_exts
        ));
        assert!(is_localization_file(
            "res/values-es/strings.arb",
            &c.localization_dirs,
            &c.localization_exts
        ));
        // right extension, wrong directory
        assert!(!is_localization_file(
            "config/settings.json",
            &c.localization_dirs,
            &c.localization_exts
        ));
    }

    #[test]
    fn test_extract_language_stem() {
        let c = config();
        assert_eq!(extract_language("locales/fr.json", &c.language_codes), Some("fr"));
        assert_eq!(
            extract_language("i18n/messages_de.properties", &c.language_codes),
            Some("de")
        );
        assert_eq!(
            extract_language("translations/app-ja.yaml", &c.language_codes),
            Some("ja")
        );
    }

    #[test]
    fn test_extract_language_values_dir() {
        let c = config();
        assert_eq!(
            extract_language("res/values-es/strings.xml", &c.language_codes),
            Some("es")
        );
    }

    #[test]
    fn test_extract_language_path_segment() {
        let c = config();
        assert_eq!(
            extract_language("locale/ko/LC_MESSAGES/app.po", &c.language_codes),
            Some("ko")
        );
    }

    #[test]
    fn test_extract_language_no_false_positive() {
        let c = config();
        // "fr_helper" ends with neither "_fr" nor "-fr" as a stem suffix and
        // has no /fr/ segment
        assert_eq!(extract_language("src/fr_helper.py", &c.language_codes), None);
        assert_eq!(extract_language("README.md", &c.language_codes), None);
    }
}
