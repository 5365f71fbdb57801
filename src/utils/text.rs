//! Text normalization helpers shared by the extractor.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Collapse internal whitespace and trim. Returns `None` for empty input so
/// callers can map "nothing there" straight onto an absent field.
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Extract a project id from a project URL, e.g.
/// `https://www.adb.org/projects/55220-001` -> `55220-001`.
pub fn extract_project_id(url: &str) -> Option<String> {
    static STRICT: OnceLock<Regex> = OnceLock::new();
    static LOOSE: OnceLock<Regex> = OnceLock::new();

    let strict = STRICT.get_or_init(|| Regex::new(r"/projects/(\d{5}-\d{3})").expect("id pattern"));
    if let Some(caps) = strict.captures(url) {
        return Some(caps[1].to_string());
    }

    // Some project pages use non-numeric slugs.
    let loose =
        LOOSE.get_or_init(|| Regex::new(r"/projects/([A-Za-z0-9-]+)").expect("slug pattern"));
    loose.captures(url).map(|caps| caps[1].to_string())
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d %b %Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
];

/// Normalize a date string to ISO-8601 (`YYYY-MM-DD`). Falls back to the
/// cleaned original text when no known format matches; the site mixes
/// formats and a raw date beats a dropped one.
pub fn normalize_date(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw)?;
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    Some(cleaned)
}

/// Resolve a possibly-relative href against the site base URL.
pub fn absolutize(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Greater  Mekong\n Subregion "), Some("Greater Mekong Subregion".to_string()));
        assert_eq!(clean_text("   "), None);
        assert_eq!(clean_text(""), None);
    }

    #[test]
    fn project_id_from_canonical_url() {
        assert_eq!(
            extract_project_id("https://www.adb.org/projects/55220-001"),
            Some("55220-001".to_string())
        );
        assert_eq!(
            extract_project_id("/projects/55220-001/main"),
            Some("55220-001".to_string())
        );
    }

    #[test]
    fn project_id_falls_back_to_slug() {
        assert_eq!(
            extract_project_id("https://www.adb.org/projects/REG-2021"),
            Some("REG-2021".to_string())
        );
        assert_eq!(extract_project_id("https://www.adb.org/news"), None);
    }

    #[test]
    fn dates_normalize_to_iso() {
        assert_eq!(normalize_date("15 May 2023"), Some("2023-05-15".to_string()));
        assert_eq!(normalize_date("May 15, 2023"), Some("2023-05-15".to_string()));
        assert_eq!(normalize_date("2023-05-15"), Some("2023-05-15".to_string()));
    }

    #[test]
    fn unknown_date_format_passes_through() {
        assert_eq!(normalize_date("Q2 2023"), Some("Q2 2023".to_string()));
        assert_eq!(normalize_date("  "), None);
    }

    #[test]
    fn absolutize_joins_relative_hrefs() {
        let base = Url::parse("https://www.adb.org").unwrap();
        assert_eq!(
            absolutize(&base, "/projects/55220-001"),
            Some("https://www.adb.org/projects/55220-001".to_string())
        );
        assert_eq!(
            absolutize(&base, "https://other.org/doc.pdf"),
            Some("https://other.org/doc.pdf".to_string())
        );
        assert_eq!(absolutize(&base, ""), None);
    }
}
