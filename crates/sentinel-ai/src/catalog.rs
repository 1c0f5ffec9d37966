//! Prompt catalog — a static mapping from job ids to a system preamble and a
//! prompt builder. Builders validate required payload fields and clip free
//! text to per-job character budgets; jobs that must return JSON end the
//! prompt with an explicit schema skeleton.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    Analysis,
    Chat,
    Summarize,
    Translate,
    LanguageLearning,
    Research,
    CodingToolUse,
    FunctionCall,
    ClaudeSkill,
    Categorize,
    Extract,
    Sentiment,
    SmartFilterMatch,
    Digest,
    RankRelevance,
    ChatSummary,
    ChatNotes,
}

pub const ALL_JOBS: &[JobId] = &[
    JobId::Analysis,
    JobId::Chat,
    JobId::Summarize,
    JobId::Translate,
    JobId::LanguageLearning,
    JobId::Research,
    JobId::CodingToolUse,
    JobId::FunctionCall,
    JobId::ClaudeSkill,
    JobId::Categorize,
    JobId::Extract,
    JobId::Sentiment,
    JobId::SmartFilterMatch,
    JobId::Digest,
    JobId::RankRelevance,
    JobId::ChatSummary,
    JobId::ChatNotes,
];

impl JobId {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobId::Analysis => "analysis",
            JobId::Chat => "chat",
            JobId::Summarize => "summarize",
            JobId::Translate => "translate",
            JobId::LanguageLearning => "language_learning",
            JobId::Research => "research",
            JobId::CodingToolUse => "coding_tool_use",
            JobId::FunctionCall => "function_call",
            JobId::ClaudeSkill => "claude_skill",
            JobId::Categorize => "categorize",
            JobId::Extract => "extract",
            JobId::Sentiment => "sentiment",
            JobId::SmartFilterMatch => "smart_filter_match",
            JobId::Digest => "digest",
            JobId::RankRelevance => "rank_relevance",
            JobId::ChatSummary => "chat_summary",
            JobId::ChatNotes => "chat_notes",
        }
    }

    /// Parse a catalog id or one of the REST route aliases.
    pub fn parse(s: &str) -> Option<Self> {
        let id = match s {
            "analyze" => "analysis",
            "language-learning" => "language_learning",
            "filter-match" => "smart_filter_match",
            "rank" => "rank_relevance",
            "tool-plan" => "coding_tool_use",
            "function-call" => "function_call",
            "skill-call" => "claude_skill",
            other => other,
        };
        ALL_JOBS.iter().copied().find(|j| j.as_str() == id)
    }
}

/// System preamble for a job.
pub fn system(job: JobId) -> &'static str {
    match job {
        JobId::Analysis => {
            "You are an analyst. Examine the given text and report key facts, \
             implications, and anything unusual. Be concise and concrete."
        }
        JobId::Chat => {
            "You are a helpful assistant inside a Telegram monitoring tool. \
             Answer plainly; keep responses short unless asked otherwise."
        }
        JobId::Summarize => {
            "You summarize text faithfully. Keep every load-bearing fact; \
             drop filler. Output only the summary."
        }
        JobId::Translate => "You are a professional translator. Preserve tone and formatting.",
        JobId::LanguageLearning => {
            "You are a language tutor. Explain vocabulary, grammar and usage \
             found in the given text with short examples."
        }
        JobId::Research => {
            "You are a research assistant. Structure the answer with short \
             headed sections and state uncertainty explicitly."
        }
        JobId::CodingToolUse => {
            "You plan tool invocations for a coding task. Propose concrete \
             steps; do not execute anything."
        }
        JobId::FunctionCall => {
            "You select the single best function for a request and produce \
             its arguments. Never invent functions."
        }
        JobId::ClaudeSkill => {
            "You route a request to the most suitable skill and produce its \
             input. Never invent skills."
        }
        JobId::Categorize => "You assign texts to categories. Choose only from the given set.",
        JobId::Extract => "You extract structured fields from free text. Omit fields you cannot find.",
        JobId::Sentiment => "You judge the sentiment of short texts.",
        JobId::SmartFilterMatch => {
            "You decide whether a message matches a user's stated interest \
             criteria. Judge meaning, not keywords."
        }
        JobId::Digest => {
            "You compile a digest of news items: group related items, order \
             by importance, one line each."
        }
        JobId::RankRelevance => "You rank items by relevance to a query.",
        JobId::ChatSummary => {
            "You maintain a running summary of a conversation so it can be \
             continued later. Third person, past tense, under 150 words."
        }
        JobId::ChatNotes => {
            "You turn a conversation transcript into structured notes: topic, \
             key points, decisions, open questions."
        }
    }
}

/// Build the user prompt for `job` from a JSON payload.
pub fn build_prompt(job: JobId, payload: &Value) -> Result<String, CatalogError> {
    match job {
        JobId::Analysis => {
            let text = require_str(payload, "text")?;
            Ok(format!("Analyze the following text:\n\n{text}"))
        }
        JobId::Chat => {
            let message = require_str(payload, "message")?;
            Ok(message.to_string())
        }
        JobId::Summarize => {
            let text = clip(require_str(payload, "text")?, 5000);
            Ok(format!("Summarize the following text:\n\n{text}"))
        }
        JobId::Translate => {
            let text = clip(require_str(payload, "text")?, 6000);
            let target = optional_str(payload, "target_lang").unwrap_or("English");
            Ok(format!("Translate the following text into {target}:\n\n{text}"))
        }
        JobId::LanguageLearning => {
            let text = clip(require_str(payload, "text")?, 3000);
            Ok(format!(
                "Help me learn from this text. Explain vocabulary, grammar and \
                 idioms worth knowing:\n\n{text}"
            ))
        }
        JobId::Research => {
            let topic = require_str(payload, "topic")?;
            Ok(format!("Research the following topic:\n\n{topic}"))
        }
        JobId::CodingToolUse => {
            let task = require_str(payload, "task")?;
            let tools = payload.get("tools").cloned().unwrap_or(Value::Null);
            Ok(format!(
                "Task:\n{task}\n\nAvailable tools (JSON):\n{tools}\n\n\
                 Produce an ordered plan of tool invocations."
            ))
        }
        JobId::FunctionCall => {
            let query = require_str(payload, "query")?;
            let functions = require_value(payload, "functions")?;
            Ok(format!(
                "Request:\n{query}\n\nAvailable functions (JSON):\n{functions}\n\n\
                 Pick the single best function and its arguments.{}",
                json_skeleton(r#"{"function": "<name>", "arguments": {}}"#)
            ))
        }
        JobId::ClaudeSkill => {
            let query = require_str(payload, "query")?;
            let skills = require_value(payload, "skills")?;
            Ok(format!(
                "Request:\n{query}\n\nAvailable skills (JSON):\n{skills}\n\n\
                 Pick the single best skill and its input.{}",
                json_skeleton(r#"{"skill": "<name>", "input": "<string>"}"#)
            ))
        }
        JobId::Categorize => {
            let text = clip(require_str(payload, "text")?, 3000);
            let categories = payload
                .get("categories")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_else(|| "news, finance, technology, politics, other".to_string());
            Ok(format!(
                "Categories: {categories}\n\nAssign the following text to one \
                 category:\n\n{text}{}",
                json_skeleton(r#"{"category": "<name>", "confidence": 0.0}"#)
            ))
        }
        JobId::Extract => {
            let text = clip(require_str(payload, "text")?, 3000);
            let fields = require_value(payload, "fields")?;
            Ok(format!(
                "Extract these fields: {fields}\n\nFrom the following \
                 text:\n\n{text}{}",
                json_skeleton(r#"{"<field>": "<value or null>"}"#)
            ))
        }
        JobId::Sentiment => {
            let text = clip(require_str(payload, "text")?, 500);
            Ok(format!(
                "Judge the sentiment of this text:\n\n{text}{}",
                json_skeleton(r#"{"sentiment": "positive|neutral|negative", "score": 0.0}"#)
            ))
        }
        JobId::SmartFilterMatch => {
            let text = clip(require_str(payload, "text")?, 1000);
            let criteria = require_str(payload, "criteria")?;
            Ok(format!(
                "Interest criteria:\n{criteria}\n\nMessage:\n{text}\n\nDoes the \
                 message match the criteria?{}",
                json_skeleton(r#"{"match": true, "reason": "<short>"}"#)
            ))
        }
        JobId::Digest => {
            let items = payload
                .get("items")
                .and_then(|v| v.as_array())
                .ok_or_else(|| {
                    CatalogError::InvalidArgument("missing required field 'items'".into())
                })?;
            if items.is_empty() {
                return Err(CatalogError::InvalidArgument("'items' is empty".into()));
            }
            let lines: Vec<String> = items
                .iter()
                .take(20)
                .enumerate()
                .map(|(i, item)| {
                    let text = item.as_str().unwrap_or_default();
                    format!("{}. {}", i + 1, clip(text, 120))
                })
                .collect();
            Ok(format!(
                "Compile a digest of these items:\n\n{}",
                lines.join("\n")
            ))
        }
        JobId::RankRelevance => {
            let query = require_str(payload, "query")?;
            let items = require_value(payload, "items")?;
            Ok(format!(
                "Query:\n{query}\n\nItems (JSON):\n{items}\n\nRank the items by \
                 relevance to the query.{}",
                json_skeleton(r#"{"ranking": [{"index": 0, "score": 0.0}]}"#)
            ))
        }
        JobId::ChatSummary => {
            let text = require_str(payload, "text")?;
            Ok(format!(
                "Update the conversation summary from this transcript:\n\n{text}"
            ))
        }
        JobId::ChatNotes => {
            let text = clip(require_str(payload, "text")?, 15000);
            Ok(format!(
                "Produce structured notes for this conversation:\n\n{text}"
            ))
        }
    }
}

fn require_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, CatalogError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CatalogError::InvalidArgument(format!("missing required field '{field}'")))
}

fn optional_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

fn require_value<'a>(payload: &'a Value, field: &str) -> Result<&'a Value, CatalogError> {
    payload
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| CatalogError::InvalidArgument(format!("missing required field '{field}'")))
}

/// Clip to a character budget (not bytes — inputs are arbitrary Unicode).
fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn json_skeleton(skeleton: &str) -> String {
    format!("\n\nRespond with JSON only, shaped exactly like:\n{skeleton}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_ids_and_route_aliases() {
        assert_eq!(JobId::parse("summarize"), Some(JobId::Summarize));
        assert_eq!(JobId::parse("analyze"), Some(JobId::Analysis));
        assert_eq!(JobId::parse("filter-match"), Some(JobId::SmartFilterMatch));
        assert_eq!(JobId::parse("rank"), Some(JobId::RankRelevance));
        assert_eq!(JobId::parse("no-such-job"), None);
    }

    #[test]
    fn every_job_has_a_system_preamble() {
        for job in ALL_JOBS {
            assert!(!system(*job).is_empty());
        }
    }

    #[test]
    fn missing_required_field_is_invalid_argument() {
        let err = build_prompt(JobId::Summarize, &json!({})).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
        let err = build_prompt(JobId::SmartFilterMatch, &json!({"text": "x"})).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn summarize_clips_to_budget() {
        let long = "x".repeat(9000);
        let prompt = build_prompt(JobId::Summarize, &json!({ "text": long })).unwrap();
        assert!(prompt.chars().count() < 5100);
    }

    #[test]
    fn clip_is_char_safe() {
        let s = "日本語のテキスト";
        assert_eq!(clip(s, 3), "日本語");
        assert_eq!(clip(s, 100), s);
    }

    #[test]
    fn digest_limits_items_and_item_length() {
        let items: Vec<String> = (0..30).map(|i| format!("{i} {}", "y".repeat(300))).collect();
        let prompt = build_prompt(JobId::Digest, &json!({ "items": items })).unwrap();
        assert!(prompt.contains("20. "));
        assert!(!prompt.contains("21. "));
        // each line clipped to 120 chars
        for line in prompt.lines().filter(|l| l.contains(" y")) {
            assert!(line.chars().count() <= 130, "line too long: {line}");
        }
    }

    #[test]
    fn json_jobs_end_with_schema_skeleton() {
        let prompt = build_prompt(JobId::Sentiment, &json!({"text": "great stuff"})).unwrap();
        assert!(prompt.contains("Respond with JSON only"));
        let prompt = build_prompt(
            JobId::FunctionCall,
            &json!({"query": "weather", "functions": [{"name": "get_weather"}]}),
        )
        .unwrap();
        assert!(prompt.trim_end().ends_with(r#"{"function": "<name>", "arguments": {}}"#));
    }

    #[test]
    fn translate_defaults_target_language() {
        let prompt = build_prompt(JobId::Translate, &json!({"text": "hola"})).unwrap();
        assert!(prompt.contains("into English"));
        let prompt =
            build_prompt(JobId::Translate, &json!({"text": "hola", "target_lang": "German"}))
                .unwrap();
        assert!(prompt.contains("into German"));
    }
}
