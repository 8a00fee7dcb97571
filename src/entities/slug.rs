//! Slug normalization for roles and groups.
//!
//! Slugs are normalized to lowercase `a-z0-9-` with collapsing separators.

pub const SLUG_MAX: usize = 64;

/// Normalizes user input into a URL-safe slug (`a-z0-9-`) of at most `max` characters.
/// Returns `None` when the normalized result is empty.
/// Caller must still enforce uniqueness.
pub fn normalize_slug(input: &str, max: usize) -> Option<String> {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in input.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let truncated: String = slug.trim_matches('-').chars().take(max).collect();
    let normalized = truncated.trim_matches('-').to_string();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators_and_lowercases() {
        assert_eq!(
            normalize_slug("  Content   Editors!! ", SLUG_MAX),
            Some("content-editors".to_string())
        );
        assert_eq!(
            normalize_slug("full_access", SLUG_MAX),
            Some("full-access".to_string())
        );
    }

    #[test]
    fn empty_or_symbol_only_input_has_no_slug() {
        assert_eq!(normalize_slug("", SLUG_MAX), None);
        assert_eq!(normalize_slug("***", SLUG_MAX), None);
    }

    #[test]
    fn truncation_does_not_leave_trailing_dash() {
        assert_eq!(normalize_slug("abc def", 4), Some("abc".to_string()));
    }
}
