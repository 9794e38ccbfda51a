//! User and channel identifier helpers

use regex::Regex;
use std::sync::OnceLock;

/// Trim whitespace and surrounding quotes from an identifier
///
/// Identifiers copied out of env files or chat clients frequently arrive
/// wrapped in `'` or `"`.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_string()
}

/// Split a comma-separated identifier list, normalizing and dropping blanks
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_id)
        .filter(|id| !id.is_empty())
        .collect()
}

fn user_ref_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:<@(U[A-Z0-9]+)(?:\|[^>]*)?>|(U[A-Z0-9]+))$").ok())
        .as_ref()
}

fn channel_ref_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:<#(C[A-Z0-9]+)(?:\|[^>]*)?>|(C[A-Z0-9]+))$").ok())
        .as_ref()
}

/// Extract a user id from `<@U123>` or a bare `U123`
pub fn parse_user_ref(arg: &str) -> Option<String> {
    let arg = normalize_id(arg);
    let caps = user_ref_regex()?.captures(&arg)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
}

/// Extract a channel id from `<#C123|name>`, `<#C123>` or a bare `C123`
pub fn parse_channel_ref(arg: &str) -> Option<String> {
    let arg = normalize_id(arg);
    let caps = channel_ref_regex()?.captures(&arg)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_quotes() {
        assert_eq!(normalize_id("  'U123' "), "U123");
        assert_eq!(normalize_id("\"U123\""), "U123");
        assert_eq!(normalize_id("U123"), "U123");
    }

    #[test]
    fn test_parse_id_list() {
        let ids = parse_id_list("U1, 'U2',,\"U3\" , ");
        assert_eq!(ids, vec!["U1", "U2", "U3"]);
    }

    #[test]
    fn test_parse_id_list_empty() {
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_parse_user_mention() {
        assert_eq!(parse_user_ref("<@U0ABC123>"), Some("U0ABC123".to_string()));
        assert_eq!(parse_user_ref("<@U0ABC123|alice>"), Some("U0ABC123".to_string()));
        assert_eq!(parse_user_ref("U0ABC123"), Some("U0ABC123".to_string()));
    }

    #[test]
    fn test_parse_user_rejects_garbage() {
        assert_eq!(parse_user_ref("alice"), None);
        assert_eq!(parse_user_ref("<@alice>"), None);
        assert_eq!(parse_user_ref("C0ABC"), None);
        assert_eq!(parse_user_ref(""), None);
    }

    #[test]
    fn test_parse_channel_mention() {
        assert_eq!(parse_channel_ref("<#C0OPS|ops>"), Some("C0OPS".to_string()));
        assert_eq!(parse_channel_ref("<#C0OPS>"), Some("C0OPS".to_string()));
        assert_eq!(parse_channel_ref("C0OPS"), Some("C0OPS".to_string()));
        assert_eq!(parse_channel_ref("#ops"), None);
    }
}
