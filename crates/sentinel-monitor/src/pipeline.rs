//! Pure per-event decisions: source matching, global gates, alert formatting.
//! Kept free of I/O so the whole filter chain is directly testable.

use sentinel_core::refs::{normalize_ref, refs_equal};
use sentinel_telegram::TelegramUpdate;

/// Match the event's chat against the configured source list.
///
/// The chat yields up to three candidate identifiers — `@username`, the raw
/// id, and the `-100`-stripped id — and matches when any configured ref
/// equals any candidate under normalization. Returns the matched configured
/// ref and the display name used in alerts and event records.
pub(crate) fn match_source<'a>(
    sources: &'a [String],
    update: &TelegramUpdate,
) -> Option<(&'a str, String)> {
    let mut candidates: Vec<String> = Vec::new();
    if let Some(username) = &update.chat_username {
        candidates.push(username.clone());
    }
    candidates.push(update.chat_id.to_string());

    let matched = sources
        .iter()
        .find(|r| candidates.iter().any(|c| refs_equal(r, c)))?;

    let name = update
        .chat_username
        .clone()
        .unwrap_or_else(|| normalize_ref(&update.chat_id.to_string()));
    Some((matched.as_str(), name))
}

/// Global sender gate. An empty list admits everyone; otherwise the sender's
/// username or numeric id must appear in it.
pub(crate) fn sender_allowed(from_users: &[String], update: &TelegramUpdate) -> bool {
    if from_users.is_empty() {
        return true;
    }
    from_users.iter().any(|entry| {
        if let Some(username) = &update.sender_username {
            if refs_equal(entry, username) {
                return true;
            }
        }
        if let Some(id) = update.sender_id {
            if entry == &id.to_string() {
                return true;
            }
        }
        false
    })
}

/// `["none"]` is a sentinel that disables global keyword filtering.
pub(crate) fn is_keyword_sentinel(keywords: &[String]) -> bool {
    keywords.len() == 1 && keywords[0].eq_ignore_ascii_case("none")
}

/// Global keyword gate: skipped entirely when the list is empty or the
/// sentinel; otherwise a case-insensitive substring match.
pub(crate) fn keywords_pass(keywords: &[String], text: &str) -> bool {
    if keywords.is_empty() || is_keyword_sentinel(keywords) {
        return true;
    }
    let text = text.to_lowercase();
    keywords.iter().any(|k| text.contains(&k.to_lowercase()))
}

pub(crate) fn format_alert(text: &str, source_name: &str) -> String {
    format!(
        "🔔【New Alert】\n\n{}\n\n— Source: {}",
        collapse_whitespace(text),
        source_name
    )
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(chat_id: i64, username: Option<&str>, text: &str) -> TelegramUpdate {
        TelegramUpdate {
            message_id: 1,
            chat_id,
            chat_username: username.map(str::to_string),
            chat_title: None,
            sender_id: Some(500),
            sender_username: Some("alice".to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn matches_by_signed_id_against_raw_chat_id() {
        let sources = vec!["-1001234567890".to_string(), "@news".to_string()];
        let ev = update(1234567890, None, "hello");
        let (matched, name) = match_source(&sources, &ev).unwrap();
        assert_eq!(matched, "-1001234567890");
        assert_eq!(name, "1234567890");
    }

    #[test]
    fn matches_by_username_any_case() {
        let sources = vec!["@News".to_string()];
        let ev = update(77, Some("news"), "hi");
        let (matched, name) = match_source(&sources, &ev).unwrap();
        assert_eq!(matched, "@News");
        assert_eq!(name, "news");
    }

    #[test]
    fn unmatched_chat_is_dropped() {
        let sources = vec!["@news".to_string()];
        assert!(match_source(&sources, &update(99, Some("other"), "x")).is_none());
        assert!(match_source(&sources, &update(99, None, "x")).is_none());
    }

    #[test]
    fn empty_from_users_admits_everyone() {
        assert!(sender_allowed(&[], &update(1, None, "x")));
    }

    #[test]
    fn from_users_matches_username_or_id() {
        let ev = update(1, None, "x");
        assert!(sender_allowed(&["@alice".to_string()], &ev));
        assert!(sender_allowed(&["alice".to_string()], &ev));
        assert!(sender_allowed(&["500".to_string()], &ev));
        assert!(!sender_allowed(&["bob".to_string()], &ev));
    }

    #[test]
    fn keyword_sentinel_disables_filtering() {
        let keywords = vec!["none".to_string()];
        assert!(keywords_pass(&keywords, "totally unrelated"));
        assert!(is_keyword_sentinel(&keywords));
        assert!(!is_keyword_sentinel(&["none".to_string(), "btc".to_string()]));
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let keywords = vec!["bitcoin".to_string()];
        assert!(keywords_pass(&keywords, "Bitcoin at ATH"));
        assert!(!keywords_pass(&keywords, "nothing relevant"));
        assert!(keywords_pass(&[], "anything"));
    }

    #[test]
    fn alert_format_collapses_whitespace() {
        let alert = format_alert("breaking\n\n  news   here", "1234567890");
        assert_eq!(
            alert,
            "🔔【New Alert】\n\nbreaking news here\n\n— Source: 1234567890"
        );
    }
}
