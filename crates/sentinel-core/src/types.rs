use serde::{Deserialize, Serialize};

/// A single matched message as delivered to history rows and stream clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorEvent {
    pub id: String,
    pub text: String,
    /// Display name of the matched source (`username` without `@`, or the
    /// normalized numeric id when the channel has no username).
    pub source: String,
    /// Raw chat id as delivered by the MTProto layer.
    pub source_id: i64,
    /// ISO-8601 UTC.
    pub timestamp: String,
}

impl MonitorEvent {
    pub fn new(text: impl Into<String>, source: impl Into<String>, source_id: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            source: source.into(),
            source_id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Per-user filter policy over monitor events.
///
/// The exact same predicate drives history persistence and the live stream;
/// a user sees an event on the WebSocket if and only if the event also lands
/// in their history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Persisted and exposed over the API; not yet evaluated by `accepts`.
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn bool_true() -> bool {
    true
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            keywords: Vec::new(),
            users: Vec::new(),
            enabled: true,
        }
    }
}

impl FilterPolicy {
    /// Parse a stored JSON document, merging with defaults. Unknown or
    /// malformed documents fall back to the default (accept-all) policy.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// The per-user predicate shared by the history and broadcast paths.
    pub fn accepts(&self, event: &MonitorEvent) -> bool {
        if !self.enabled {
            return false;
        }

        if !self.channels.is_empty() {
            let id_str = event.source_id.to_string();
            let at_source = format!("@{}", event.source);
            let matched = self
                .channels
                .iter()
                .any(|c| c == &event.source || c == &id_str || c == &at_source);
            if !matched {
                return false;
            }
        }

        if !self.keywords.is_empty() {
            let text = event.text.to_lowercase();
            if !self
                .keywords
                .iter()
                .any(|k| text.contains(&k.to_lowercase()))
            {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str, source: &str, source_id: i64) -> MonitorEvent {
        MonitorEvent::new(text, source, source_id)
    }

    #[test]
    fn default_policy_accepts_everything() {
        let policy = FilterPolicy::default();
        assert!(policy.accepts(&event("anything at all", "news", 42)));
    }

    #[test]
    fn disabled_policy_rejects_everything() {
        let policy = FilterPolicy {
            enabled: false,
            ..Default::default()
        };
        assert!(!policy.accepts(&event("bitcoin", "news", 42)));
    }

    #[test]
    fn channel_filter_matches_name_id_and_at_form() {
        let ev = event("hello", "news", 1234567890);
        for entry in ["news", "@news", "1234567890"] {
            let policy = FilterPolicy {
                channels: vec![entry.to_string()],
                ..Default::default()
            };
            assert!(policy.accepts(&ev), "entry {entry} should match");
        }

        let policy = FilterPolicy {
            channels: vec!["other".to_string()],
            ..Default::default()
        };
        assert!(!policy.accepts(&ev));
    }

    #[test]
    fn keyword_filter_is_case_insensitive_substring() {
        let policy = FilterPolicy {
            keywords: vec!["bitcoin".to_string()],
            ..Default::default()
        };
        assert!(policy.accepts(&event("Bitcoin at ATH", "news", 1)));
        assert!(!policy.accepts(&event("ethereum only", "news", 1)));
    }

    #[test]
    fn malformed_json_falls_back_to_default() {
        let policy = FilterPolicy::from_json("not json");
        assert_eq!(policy, FilterPolicy::default());
    }

    #[test]
    fn partial_json_merges_with_defaults() {
        let policy = FilterPolicy::from_json(r#"{"keywords":["eth"]}"#);
        assert!(policy.enabled);
        assert!(policy.channels.is_empty());
        assert_eq!(policy.keywords, vec!["eth".to_string()]);
    }
}
