use rusqlite::{Connection, Result};

/// Initialise all tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_source_tables(conn)?;
    create_monitor_tables(conn)?;
    create_ai_tables(conn)?;
    Ok(())
}

/// Sources + subscriptions + seen content (shared with the RSS collaborator).
fn create_source_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sources (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            ref         TEXT NOT NULL UNIQUE,
            title       TEXT NOT NULL DEFAULT '',
            error_count INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS subscriptions (
            user_id     INTEGER NOT NULL,
            source_id   INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, source_id)
        );
        CREATE TABLE IF NOT EXISTS contents (
            hash_id     TEXT PRIMARY KEY,
            source_id   INTEGER NOT NULL,
            item_id     TEXT NOT NULL,
            link        TEXT NOT NULL DEFAULT '',
            title       TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_contents_source
            ON contents(source_id);",
    )
}

/// Per-user filter policies and append-only history.
/// `monitor_history.ai_summary` / `ai_category` stay NULL until the
/// enrichment hook is wired into the pipeline.
pub(crate) fn create_monitor_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS monitor_filters (
            user_id     INTEGER PRIMARY KEY,
            filters     TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS monitor_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            source      TEXT NOT NULL,
            source_id   INTEGER NOT NULL,
            message     TEXT NOT NULL,
            ai_summary  TEXT,
            ai_category TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_user
            ON monitor_history(user_id, created_at DESC);",
    )
}

/// Chat threads, messages, and per-user provider settings.
fn create_ai_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ai_chats (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            title       TEXT NOT NULL,
            summary     TEXT,
            is_active   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chats_user
            ON ai_chats(user_id, updated_at DESC);
        CREATE TABLE IF NOT EXISTS ai_messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id     INTEGER NOT NULL,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON ai_messages(chat_id, id);
        CREATE TABLE IF NOT EXISTS ai_settings (
            user_id     INTEGER PRIMARY KEY,
            provider    TEXT NOT NULL,
            model       TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )
}
