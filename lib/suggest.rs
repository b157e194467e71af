//! Fuzzy matching utilities for name suggestions.

use strsim::jaro_winkler;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Minimum similarity threshold for suggestions (0.0 to 1.0).
const MIN_SIMILARITY: f64 = 0.6;

/// Maximum number of suggestions to show.
const MAX_SUGGESTIONS: usize = 3;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Find names similar to `query`, best match first.
pub fn find_similar(query: &str, available: &[&str]) -> Vec<String> {
    let query = query.to_ascii_lowercase();
    let mut scored: Vec<(&str, f64)> = available
        .iter()
        .map(|name| (*name, jaro_winkler(&query, name)))
        .filter(|(_, score)| *score >= MIN_SIMILARITY)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Format suggestions in cargo-style.
///
/// Returns None if no suggestions are available.
pub fn format_suggestions(suggestions: &[String]) -> Option<String> {
    match suggestions.len() {
        0 => None,
        1 => Some(format!("Did you mean `{}`?", suggestions[0])),
        _ => {
            let formatted: Vec<String> = suggestions.iter().map(|s| format!("`{}`", s)).collect();
            Some(format!("Did you mean one of: {}?", formatted.join(", ")))
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS: &[&str] = &["build", "validate", "package", "templates", "clean"];

    #[test]
    fn test_find_similar() {
        let found = find_similar("biuld", TARGETS);
        assert_eq!(found.first().map(String::as_str), Some("build"));

        let found = find_similar("VALIDAT", TARGETS);
        assert_eq!(found.first().map(String::as_str), Some("validate"));

        assert!(find_similar("xyz", TARGETS).is_empty());
    }

    #[test]
    fn test_format_suggestions() {
        assert_eq!(format_suggestions(&[]), None);
        assert_eq!(
            format_suggestions(&["build".into()]),
            Some("Did you mean `build`?".into())
        );
        assert_eq!(
            format_suggestions(&["build".into(), "clean".into()]),
            Some("Did you mean one of: `build`, `clean`?".into())
        );
    }
}
