use serde::Serialize;

/// Title given to a chat until the first user message replaces it.
pub const NEW_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: i64,
    #[serde(rename = "ref")]
    pub source_ref: String,
    pub title: String,
    pub error_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub user_id: i64,
    pub source: Source,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiChat {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiMessage {
    pub id: i64,
    pub chat_id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiSettings {
    pub user_id: i64,
    pub provider: String,
    pub model: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub id: i64,
    pub user_id: i64,
    pub source: String,
    pub source_id: i64,
    pub message: String,
    pub created_at: String,
}
