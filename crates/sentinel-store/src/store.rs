use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use sentinel_core::types::{FilterPolicy, MonitorEvent};
use tracing::{debug, info, instrument};

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{AiChat, AiMessage, AiSettings, HistoryRow, Source, Subscription, NEW_CHAT_TITLE};

/// Thread-safe durable storage for sources, filters, history, chat threads
/// and AI settings.
///
/// Wraps a single SQLite connection in a `Mutex`. For high-concurrency
/// deployments consider a connection pool, but a Mutex is sufficient for the
/// single-node target.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and initialise all tables.
    ///
    /// Callers treat a failure here as "storage unavailable" and carry on
    /// without a store rather than aborting startup.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        db::init_db(&conn)?;
        info!(path, "store opened");
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Idempotent re-check of the monitor tables. The monitor service calls
    /// this before its first write so a store created by an older build still
    /// works.
    pub fn ensure_monitor_tables(&self) -> Result<()> {
        let conn = self.db.lock().unwrap();
        db::create_monitor_tables(&conn)?;
        Ok(())
    }

    // ── Sources & subscriptions ─────────────────────────────────────────────

    /// Upsert a source on its ref, returning the persistent id.
    #[instrument(skip(self))]
    pub fn create_source(&self, source_ref: &str, title: &str) -> Result<i64> {
        let now = now();
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO sources (ref, title, error_count, created_at)
             VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(ref) DO UPDATE SET title = excluded.title",
            params![source_ref, title, now],
        )?;
        let id = conn.query_row(
            "SELECT id FROM sources WHERE ref = ?1",
            params![source_ref],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_source(&self, id: i64) -> Result<Option<Source>> {
        let conn = self.db.lock().unwrap();
        let source = conn
            .query_row(
                "SELECT id, ref, title, error_count, created_at FROM sources WHERE id = ?1",
                params![id],
                row_to_source,
            )
            .optional()?;
        Ok(source)
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, ref, title, error_count, created_at FROM sources ORDER BY id")?;
        let rows = stmt.query_map([], row_to_source)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete a source and everything hanging off it.
    pub fn delete_source(&self, id: i64) -> Result<()> {
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM subscriptions WHERE source_id = ?1", params![id])?;
        tx.execute("DELETE FROM contents WHERE source_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
        tx.commit()?;
        if rows == 0 {
            return Err(StoreError::NotFound {
                what: format!("source {id}"),
            });
        }
        Ok(())
    }

    /// Returns `false` when the user is already subscribed; other failures
    /// propagate.
    #[instrument(skip(self))]
    pub fn add_subscription(&self, user_id: i64, source_id: i64) -> Result<bool> {
        let now = now();
        let conn = self.db.lock().unwrap();
        match conn.execute(
            "INSERT INTO subscriptions (user_id, source_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, source_id, now],
        ) {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                debug!(user_id, source_id, "already subscribed");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete_subscription(&self, user_id: i64, source_id: i64) -> Result<bool> {
        let conn = self.db.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND source_id = ?2",
            params![user_id, source_id],
        )?;
        Ok(rows > 0)
    }

    pub fn list_subscriptions(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.ref, s.title, s.error_count, s.created_at, sub.created_at
             FROM subscriptions sub
             JOIN sources s ON s.id = sub.source_id
             WHERE sub.user_id = ?1
             ORDER BY sub.created_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Subscription {
                user_id,
                source: row_to_source(row)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// RSS collaborator contract: failure streaks retire a source.
    pub fn bump_source_error(&self, id: i64) -> Result<i64> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "UPDATE sources SET error_count = error_count + 1 WHERE id = ?1",
            params![id],
        )?;
        let count = conn.query_row(
            "SELECT error_count FROM sources WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn reset_source_error(&self, id: i64) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute("UPDATE sources SET error_count = 0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Seen content (dedup) ────────────────────────────────────────────────

    pub fn content_exists(&self, hash_id: &str) -> Result<bool> {
        let conn = self.db.lock().unwrap();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM contents WHERE hash_id = ?1)",
            params![hash_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Insert-if-absent. Returns `true` only for the writer that actually
    /// inserted the row; concurrent writers never both observe success.
    pub fn add_content(
        &self,
        source_id: i64,
        item_id: &str,
        link: &str,
        title: &str,
    ) -> Result<bool> {
        let hash_id = format!("{source_id}:{item_id}");
        let now = now();
        let conn = self.db.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO contents (hash_id, source_id, item_id, link, title, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![hash_id, source_id, item_id, link, title, now],
        )?;
        Ok(rows > 0)
    }

    // ── Monitor filters & history ───────────────────────────────────────────

    /// Read a user's filter policy, merged with defaults. A missing row is
    /// the default (accept-all) policy.
    pub fn get_filters(&self, user_id: i64) -> Result<FilterPolicy> {
        let conn = self.db.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT filters FROM monitor_filters WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw
            .map(|json| FilterPolicy::from_json(&json))
            .unwrap_or_default())
    }

    /// Wholesale replace a user's filter policy.
    pub fn set_filters(&self, user_id: i64, policy: &FilterPolicy) -> Result<()> {
        let json = serde_json::to_string(policy)?;
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO monitor_filters (user_id, filters) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET filters = excluded.filters",
            params![user_id, json],
        )?;
        Ok(())
    }

    /// Append one history row for a user the event matched.
    pub fn add_history(&self, user_id: i64, event: &MonitorEvent) -> Result<()> {
        let now = now();
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO monitor_history (user_id, source, source_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, event.source, event.source_id, event.text, now],
        )?;
        Ok(())
    }

    /// Newest-first, bounded by `limit`.
    pub fn get_history(&self, user_id: i64, limit: usize) -> Result<Vec<HistoryRow>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, source, source_id, message, created_at
             FROM monitor_history
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok(HistoryRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                source: row.get(2)?,
                source_id: row.get(3)?,
                message: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ── AI chats ────────────────────────────────────────────────────────────

    /// Return the user's active chat, creating one atomically when none
    /// exists. After this call exactly one chat is active for the user.
    pub fn get_or_create_active_chat(&self, user_id: i64) -> Result<AiChat> {
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, user_id, title, summary, is_active, created_at, updated_at
                 FROM ai_chats WHERE user_id = ?1 AND is_active = 1
                 ORDER BY updated_at DESC LIMIT 1",
                params![user_id],
                row_to_chat,
            )
            .optional()?;

        let chat = match existing {
            Some(chat) => chat,
            None => {
                let now = now();
                tx.execute(
                    "INSERT INTO ai_chats (user_id, title, is_active, created_at, updated_at)
                     VALUES (?1, ?2, 1, ?3, ?3)",
                    params![user_id, NEW_CHAT_TITLE, now],
                )?;
                let id = tx.last_insert_rowid();
                AiChat {
                    id,
                    user_id,
                    title: NEW_CHAT_TITLE.to_string(),
                    summary: None,
                    is_active: true,
                    created_at: now.clone(),
                    updated_at: now,
                }
            }
        };

        tx.commit()?;
        Ok(chat)
    }

    /// Create a fresh chat and make it the single active one.
    pub fn create_chat(&self, user_id: i64, title: Option<&str>) -> Result<AiChat> {
        let now = now();
        let title = title.unwrap_or(NEW_CHAT_TITLE);
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE ai_chats SET is_active = 0 WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            "INSERT INTO ai_chats (user_id, title, is_active, created_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?3)",
            params![user_id, title, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(AiChat {
            id,
            user_id,
            title: title.to_string(),
            summary: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Demote every active chat for the user, then promote the given one.
    /// Final state: exactly one active chat.
    pub fn set_active_chat(&self, user_id: i64, chat_id: i64) -> Result<()> {
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE ai_chats SET is_active = 0 WHERE user_id = ?1",
            params![user_id],
        )?;
        let rows = tx.execute(
            "UPDATE ai_chats SET is_active = 1 WHERE id = ?1 AND user_id = ?2",
            params![chat_id, user_id],
        )?;
        tx.commit()?;
        if rows == 0 {
            return Err(StoreError::NotFound {
                what: format!("chat {chat_id}"),
            });
        }
        Ok(())
    }

    pub fn get_chat(&self, user_id: i64, chat_id: i64) -> Result<Option<AiChat>> {
        let conn = self.db.lock().unwrap();
        let chat = conn
            .query_row(
                "SELECT id, user_id, title, summary, is_active, created_at, updated_at
                 FROM ai_chats WHERE id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
                row_to_chat,
            )
            .optional()?;
        Ok(chat)
    }

    /// Most-recently-updated first.
    pub fn list_chats(&self, user_id: i64) -> Result<Vec<AiChat>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, summary, is_active, created_at, updated_at
             FROM ai_chats WHERE user_id = ?1
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_chat)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn rename_chat(&self, chat_id: i64, title: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "UPDATE ai_chats SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now(), chat_id],
        )?;
        Ok(())
    }

    pub fn set_summary(&self, chat_id: i64, summary: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "UPDATE ai_chats SET summary = ?1, updated_at = ?2 WHERE id = ?3",
            params![summary, now(), chat_id],
        )?;
        Ok(())
    }

    // ── AI messages ─────────────────────────────────────────────────────────

    /// Append a message and bump the chat's `updated_at`.
    pub fn save_message(&self, chat_id: i64, role: &str, content: &str) -> Result<i64> {
        let now = now();
        let mut conn = self.db.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO ai_messages (chat_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, role, content, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE ai_chats SET updated_at = ?1 WHERE id = ?2",
            params![now, chat_id],
        )?;
        tx.commit()?;
        Ok(id)
    }

    pub fn message_count(&self, chat_id: i64) -> Result<i64> {
        let conn = self.db.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM ai_messages WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The most recent `n` messages in chronological order.
    pub fn recent_messages(&self, chat_id: i64, n: usize) -> Result<Vec<AiMessage>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at
             FROM ai_messages WHERE chat_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![chat_id, n as i64], row_to_message)?;
        let mut messages: Vec<AiMessage> = rows.filter_map(|r| r.ok()).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Full transcript in chronological order (export path).
    pub fn all_messages(&self, chat_id: i64) -> Result<Vec<AiMessage>> {
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at
             FROM ai_messages WHERE chat_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![chat_id], row_to_message)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn clear_messages(&self, chat_id: i64) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute("DELETE FROM ai_messages WHERE chat_id = ?1", params![chat_id])?;
        Ok(())
    }

    // ── AI settings ─────────────────────────────────────────────────────────

    pub fn get_settings(&self, user_id: i64) -> Result<Option<AiSettings>> {
        let conn = self.db.lock().unwrap();
        let settings = conn
            .query_row(
                "SELECT user_id, provider, model, updated_at
                 FROM ai_settings WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(AiSettings {
                        user_id: row.get(0)?,
                        provider: row.get(1)?,
                        model: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }

    pub fn set_settings(&self, user_id: i64, provider: &str, model: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO ai_settings (user_id, provider, model, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                provider = excluded.provider,
                model = excluded.model,
                updated_at = excluded.updated_at",
            params![user_id, provider, model, now()],
        )?;
        Ok(())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        source_ref: row.get(1)?,
        title: row.get(2)?,
        error_count: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<AiChat> {
    Ok(AiChat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<AiMessage> {
    Ok(AiMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn create_source_upserts_on_ref() {
        let s = store();
        let a = s.create_source("@news", "News").unwrap();
        let b = s.create_source("@news", "News Renamed").unwrap();
        assert_eq!(a, b);
        let sources = s.list_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "News Renamed");
    }

    #[test]
    fn duplicate_subscription_returns_false() {
        let s = store();
        let src = s.create_source("@news", "News").unwrap();
        assert!(s.add_subscription(7, src).unwrap());
        assert!(!s.add_subscription(7, src).unwrap());
        assert_eq!(s.list_subscriptions(7).unwrap().len(), 1);
    }

    #[test]
    fn delete_source_cascades() {
        let s = store();
        let src = s.create_source("@news", "News").unwrap();
        s.add_subscription(7, src).unwrap();
        s.add_content(src, "item-1", "https://x/1", "one").unwrap();
        s.delete_source(src).unwrap();
        assert!(s.list_subscriptions(7).unwrap().is_empty());
        assert!(!s.content_exists(&format!("{src}:item-1")).unwrap());
    }

    #[test]
    fn content_insert_if_absent() {
        let s = store();
        let src = s.create_source("@news", "News").unwrap();
        assert!(s.add_content(src, "item-1", "", "").unwrap());
        assert!(!s.add_content(src, "item-1", "", "").unwrap());
        assert!(s.content_exists(&format!("{src}:item-1")).unwrap());
    }

    #[test]
    fn source_error_streak() {
        let s = store();
        let src = s.create_source("@flaky", "").unwrap();
        for _ in 0..4 {
            s.bump_source_error(src).unwrap();
        }
        assert_eq!(s.bump_source_error(src).unwrap(), 5);
        s.reset_source_error(src).unwrap();
        assert_eq!(s.get_source(src).unwrap().unwrap().error_count, 0);
    }

    #[test]
    fn active_chat_is_created_once_and_unique() {
        let s = store();
        let a = s.get_or_create_active_chat(1).unwrap();
        let b = s.get_or_create_active_chat(1).unwrap();
        assert_eq!(a.id, b.id);

        let fresh = s.create_chat(1, None).unwrap();
        assert_ne!(fresh.id, a.id);
        let active: Vec<_> = s
            .list_chats(1)
            .unwrap()
            .into_iter()
            .filter(|c| c.is_active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, fresh.id);
    }

    #[test]
    fn set_active_chat_demotes_then_promotes() {
        let s = store();
        let first = s.get_or_create_active_chat(1).unwrap();
        let second = s.create_chat(1, Some("second")).unwrap();
        s.set_active_chat(1, first.id).unwrap();

        let chats = s.list_chats(1).unwrap();
        let active: Vec<_> = chats.iter().filter(|c| c.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, first.id);
        assert!(!chats.iter().any(|c| c.id == second.id && c.is_active));
    }

    #[test]
    fn set_active_chat_rejects_foreign_chat() {
        let s = store();
        let other = s.get_or_create_active_chat(2).unwrap();
        let err = s.set_active_chat(1, other.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn save_message_bumps_chat_updated_at() {
        let s = store();
        let chat = s.get_or_create_active_chat(1).unwrap();
        s.save_message(chat.id, "user", "hello").unwrap();
        let after = s.get_chat(1, chat.id).unwrap().unwrap();
        assert!(after.updated_at >= chat.updated_at);
        assert_eq!(s.message_count(chat.id).unwrap(), 1);
    }

    #[test]
    fn recent_messages_are_chronological() {
        let s = store();
        let chat = s.get_or_create_active_chat(1).unwrap();
        for i in 0..6 {
            s.save_message(chat.id, "user", &format!("m{i}")).unwrap();
        }
        let recent = s.recent_messages(chat.id, 4).unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4", "m5"]);
    }

    #[test]
    fn filters_roundtrip_merges_defaults() {
        use sentinel_core::types::FilterPolicy;
        let s = store();
        assert_eq!(s.get_filters(9).unwrap(), FilterPolicy::default());

        let policy = FilterPolicy {
            keywords: vec!["bitcoin".to_string()],
            ..Default::default()
        };
        s.set_filters(9, &policy).unwrap();
        let read = s.get_filters(9).unwrap();
        assert_eq!(read.keywords, vec!["bitcoin".to_string()]);
        assert!(read.enabled);
        assert!(read.channels.is_empty());
    }

    #[test]
    fn history_reads_newest_first_with_limit() {
        use sentinel_core::types::MonitorEvent;
        let s = store();
        for i in 0..5 {
            let ev = MonitorEvent::new(format!("msg {i}"), "news", 42);
            s.add_history(3, &ev).unwrap();
        }
        let rows = s.get_history(3, 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].message, "msg 4");
        assert_eq!(rows[2].message, "msg 2");
        // ingestion order is monotonic per (user, source)
        assert!(rows[0].created_at >= rows[2].created_at);
    }

    #[test]
    fn settings_single_row_per_user() {
        let s = store();
        assert!(s.get_settings(1).unwrap().is_none());
        s.set_settings(1, "groq", "llama-3.3-70b-versatile").unwrap();
        s.set_settings(1, "gemini", "gemini-2.0-flash").unwrap();
        let settings = s.get_settings(1).unwrap().unwrap();
        assert_eq!(settings.provider, "gemini");
        assert_eq!(settings.model, "gemini-2.0-flash");
    }
}
