//! Translation history: append-only audit log in SQLite.
//! One row per provider translation (cache hits are not logged).
//! Rows are never updated; they are only deleted in bulk by age.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
use crate::translate::RequestContext;

const SECS_PER_DAY: i64 = 86_400;

/// Retention used when a clear request gives no positive age.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// A single translation history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Assigned by the store; `None` until appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub provider: String,
    pub char_count: u64,
    pub cache_key: String,
    pub post_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Unix seconds.
    pub created_at: i64,
}

impl HistoryRecord {
    pub fn new(
        original_text: &str,
        translated_text: &str,
        source_lang: &str,
        target_lang: &str,
        provider: &str,
        cache_key: &str,
        ctx: &RequestContext,
    ) -> Self {
        Self {
            id: None,
            original_text: original_text.to_string(),
            translated_text: translated_text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            provider: provider.to_string(),
            char_count: original_text.chars().count() as u64,
            cache_key: cache_key.to_string(),
            post_id: ctx.post_id,
            user_id: ctx.user_id,
            created_at: crate::now_unix(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            original_text: row.get(1)?,
            translated_text: row.get(2)?,
            source_lang: row.get(3)?,
            target_lang: row.get(4)?,
            provider: row.get(5)?,
            char_count: row.get::<_, i64>(6)? as u64,
            cache_key: row.get(7)?,
            post_id: row.get(8)?,
            user_id: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

/// Page request. `language` matches either side of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub page: u32,
    pub per_page: u32,
    pub language: Option<String>,
    pub provider: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            language: None,
            provider: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history table in the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::init(conn)?;
        info!(path = %db_path.display(), "history store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original_text TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                source_lang TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                provider TEXT NOT NULL,
                char_count INTEGER NOT NULL,
                cache_key TEXT NOT NULL,
                post_id INTEGER,
                user_id INTEGER,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_created
                ON translation_history(created_at);
            CREATE INDEX IF NOT EXISTS idx_history_provider
                ON translation_history(provider);
            CREATE INDEX IF NOT EXISTS idx_history_cache_key
                ON translation_history(cache_key);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append a record, returning its row id.
    pub fn append(&self, record: &HistoryRecord) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO translation_history
             (original_text, translated_text, source_lang, target_lang, provider,
              char_count, cache_key, post_id, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.original_text,
                record.translated_text,
                record.source_lang,
                record.target_lang,
                record.provider,
                record.char_count as i64,
                record.cache_key,
                record.post_id,
                record.user_id,
                record.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest-first page of records matching the optional filters.
    pub fn query(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        let page = query.page.max(1);
        let per_page = query.per_page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);
        let language = query.language.as_deref().filter(|l| !l.is_empty());
        let provider = query.provider.as_deref().filter(|p| !p.is_empty());

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, original_text, translated_text, source_lang, target_lang,
                    provider, char_count, cache_key, post_id, user_id, created_at
             FROM translation_history
             WHERE (?1 IS NULL OR source_lang = ?1 OR target_lang = ?1)
               AND (?2 IS NULL OR provider = ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let records = stmt
            .query_map(
                params![language, provider, i64::from(per_page), offset],
                HistoryRecord::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM translation_history
             WHERE (?1 IS NULL OR source_lang = ?1 OR target_lang = ?1)
               AND (?2 IS NULL OR provider = ?2)",
            params![language, provider],
            |row| row.get(0),
        )?;

        Ok(HistoryPage {
            records,
            total: total as u64,
            page,
            per_page,
        })
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM translation_history", [], |row| row.get(0))?;
        Ok(total as u64)
    }

    /// Delete records created more than `days` days ago.
    pub fn delete_older_than_days(&self, days: u32) -> Result<usize> {
        let cutoff = crate::now_unix() - i64::from(days) * SECS_PER_DAY;
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM translation_history WHERE created_at < ?1",
            params![cutoff],
        )?;
        if removed > 0 {
            info!(removed, days, "history cleanup");
        }
        Ok(removed)
    }
}
