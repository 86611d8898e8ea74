use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::registry;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} cannot be blank")]
    BlankField(&'static str),
    #[error("slug {0} is reserved for bundled content")]
    ReservedSlug(String),
}

/// Returns the trimmed value of a field that must be present and non-blank.
pub fn required(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(field)),
        Some(value) if value.trim().is_empty() => Err(ValidationError::BlankField(field)),
        Some(value) => Ok(value.trim().to_string()),
    }
}

/// Optional on updates, but never blank when supplied.
pub fn non_blank(field: &'static str, value: Option<&str>) -> Result<Option<String>, ValidationError> {
    value.map(|value| required(field, Some(value))).transpose()
}

/// Lowercases `text` and collapses every run of characters outside ASCII
/// `[a-z0-9]` into a single hyphen, trimmed at both ends.
///
/// Slugs stay plain ASCII so they need no percent-encoding in URLs. Accented
/// and non-Latin letters are not transliterated and act as separators:
/// `"Café"` becomes `"caf"`.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Slug for a new article: the slugified title plus the creation time in
/// milliseconds. A title with no ASCII letters or digits (a Bengali-only
/// headline, say) uses `article` as its base.
pub fn generated_slug(title: &str, created_at: DateTime<Utc>) -> String {
    let base = slugify(title);
    let base = if base.is_empty() { "article".to_string() } else { base };
    format!("{base}-{}", created_at.timestamp_millis())
}

/// Normalizes a slug supplied explicitly by the caller.
pub fn explicit_slug(value: &str) -> Result<String, ValidationError> {
    let slug = slugify(value);
    if slug.is_empty() {
        return Err(ValidationError::BlankField("slug"));
    }
    if registry::is_reserved(&slug) {
        return Err(ValidationError::ReservedSlug(slug));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert_eq!(
            required("title", None),
            Err(ValidationError::MissingField("title"))
        );
        assert_eq!(
            required("title", Some("   ")),
            Err(ValidationError::BlankField("title"))
        );
        assert_eq!(required("title", Some(" Hello ")).unwrap(), "Hello");
    }

    #[test]
    fn test_non_blank_allows_absent_values() {
        assert_eq!(non_blank("content", None), Ok(None));
        assert!(non_blank("content", Some("")).is_err());
    }

    #[test]
    fn test_slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("Eid Schedule Update"), "eid-schedule-update");
        assert_eq!(slugify("  Dhaka -> Barishal!! (night) "), "dhaka-barishal-night");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_slugify_drops_non_ascii_letters() {
        assert_eq!(slugify("Café Crème 2024"), "caf-cr-me-2024");
        assert_eq!(slugify("Café"), "caf");
        assert_eq!(slugify("ঈদের সময়সূচি"), "");
    }

    #[test]
    fn test_generated_slug_falls_back_for_non_latin_titles() {
        let created_at = DateTime::from_timestamp_millis(1_718_000_000_123).unwrap();
        assert_eq!(
            generated_slug("ঈদের সময়সূচি", created_at),
            "article-1718000000123"
        );
        assert_eq!(
            generated_slug("লঞ্চ MV Sundarban", created_at),
            "mv-sundarban-1718000000123"
        );
    }

    #[test]
    fn test_generated_slug_appends_millis() {
        let created_at = DateTime::from_timestamp_millis(1_718_000_000_123).unwrap();
        assert_eq!(
            generated_slug("Eid Schedule Update", created_at),
            "eid-schedule-update-1718000000123"
        );
        assert_eq!(generated_slug("!!!", created_at), "article-1718000000123");
    }

    #[test]
    fn test_explicit_slug_rejects_reserved_names() {
        let reserved = registry::list()[0].slug;
        assert!(matches!(
            explicit_slug(reserved),
            Err(ValidationError::ReservedSlug(_))
        ));
        assert_eq!(explicit_slug("Welcome Aboard").unwrap(), "welcome-aboard");
        assert_eq!(
            explicit_slug("???"),
            Err(ValidationError::BlankField("slug"))
        );
    }
}
