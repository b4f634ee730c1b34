use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Socket ids handed out by Pusher-compatible relays
    /// - Valid: "1234.5678", "0.1"
    /// - Invalid: "1234", "abc.def", "1234.5678:private-user.1", " 1.2"
    pub static ref SOCKET_ID_REGEX: Regex = Regex::new(r"^\d+\.\d+$").unwrap();

    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Lowercase, trimmed email so lookups match the case-insensitive unique index
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// URL-friendly slug: lowercase ASCII alphanumerics separated by single hyphens
///
/// - "Public Works" -> "public-works"
/// - "  Water & Sewage!! " -> "water-sewage"
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// `%term%` for ILIKE with the wildcard characters of `term` escaped
pub fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Trimmed value, `None` when blank
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_id_regex() {
        assert!(SOCKET_ID_REGEX.is_match("1234.5678"));
        assert!(SOCKET_ID_REGEX.is_match("0.1"));
        assert!(!SOCKET_ID_REGEX.is_match("1234"));
        assert!(!SOCKET_ID_REGEX.is_match("abc.def"));
        assert!(!SOCKET_ID_REGEX.is_match("1.2:private-user.1"));
        assert!(!SOCKET_ID_REGEX.is_match(" 1.2"));
        assert!(!SOCKET_ID_REGEX.is_match(""));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Public Works"), "public-works");
        assert_eq!(slugify("  Water & Sewage!! "), "water-sewage");
        assert_eq!(slugify("Roads--and__Bridges"), "roads-and-bridges");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("pothole"), "%pothole%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
