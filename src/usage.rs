//! Monthly usage ledger backed by SQLite.
//! One row per (month, provider, language). Increments are applied with a single
//! `INSERT .. ON CONFLICT DO UPDATE` so concurrent writers never lose updates.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Month key (`YYYY-MM`, UTC) for the current date.
pub fn current_month() -> String {
    chrono::Utc::now().format("%Y-%m").to_string()
}

/// Aggregate counters for one (month, provider, language) triple.
/// Also used as an increment: every field is added on upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub month: String,
    pub provider: String,
    pub language: String,
    pub char_count: u64,
    pub translation_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl UsageCounter {
    /// Increment for one provider translation of `chars` characters.
    pub fn translation(month: &str, provider: &str, language: &str, chars: u64) -> Self {
        Self {
            month: month.to_string(),
            provider: provider.to_string(),
            language: language.to_string(),
            char_count: chars,
            translation_count: 1,
            cache_hits: 0,
            cache_misses: 1,
        }
    }

    /// Increment for one answer served from cache. Hits consume no provider quota.
    pub fn cache_hit(month: &str, provider: &str, language: &str) -> Self {
        Self {
            month: month.to_string(),
            provider: provider.to_string(),
            language: language.to_string(),
            cache_hits: 1,
            ..Self::default()
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            month: row.get(0)?,
            provider: row.get(1)?,
            language: row.get(2)?,
            char_count: row.get::<_, i64>(3)? as u64,
            translation_count: row.get::<_, i64>(4)? as u64,
            cache_hits: row.get::<_, i64>(5)? as u64,
            cache_misses: row.get::<_, i64>(6)? as u64,
        })
    }
}

pub struct UsageStore {
    conn: Mutex<Connection>,
}

impl UsageStore {
    /// Open (or create) the usage table in the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, Some(db_path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<&Path>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS usage_counters (
                month TEXT NOT NULL,
                provider TEXT NOT NULL,
                language TEXT NOT NULL,
                char_count INTEGER NOT NULL DEFAULT 0,
                translation_count INTEGER NOT NULL DEFAULT 0,
                cache_hits INTEGER NOT NULL DEFAULT 0,
                cache_misses INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (month, provider, language)
            );",
        )?;
        if let Some(path) = path {
            info!(path = %path.display(), "usage ledger opened");
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Add `delta` to the row for its (month, provider, language), creating it if needed.
    pub fn add(&self, delta: &UsageCounter) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO usage_counters
             (month, provider, language, char_count, translation_count, cache_hits, cache_misses)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(month, provider, language) DO UPDATE SET
                char_count = char_count + excluded.char_count,
                translation_count = translation_count + excluded.translation_count,
                cache_hits = cache_hits + excluded.cache_hits,
                cache_misses = cache_misses + excluded.cache_misses",
            params![
                delta.month,
                delta.provider,
                delta.language,
                delta.char_count as i64,
                delta.translation_count as i64,
                delta.cache_hits as i64,
                delta.cache_misses as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, month: &str, provider: &str, language: &str) -> Result<Option<UsageCounter>> {
        let conn = self.conn.lock();
        let counter = conn
            .query_row(
                "SELECT month, provider, language, char_count, translation_count,
                        cache_hits, cache_misses
                 FROM usage_counters
                 WHERE month = ?1 AND provider = ?2 AND language = ?3",
                params![month, provider, language],
                UsageCounter::from_row,
            )
            .optional()?;
        Ok(counter)
    }

    /// Characters already charged to (month, provider, language).
    pub fn char_usage(&self, month: &str, provider: &str, language: &str) -> Result<u64> {
        Ok(self
            .get(month, provider, language)?
            .map(|c| c.char_count)
            .unwrap_or(0))
    }

    /// Every language row for one provider and month, ordered by language.
    pub fn monthly(&self, month: &str, provider: &str) -> Result<Vec<UsageCounter>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT month, provider, language, char_count, translation_count,
                    cache_hits, cache_misses
             FROM usage_counters
             WHERE month = ?1 AND provider = ?2
             ORDER BY language",
        )?;
        let rows = stmt
            .query_map(params![month, provider], UsageCounter::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
impl UsageStore {
    /// Drop the ledger table so every later read and write fails.
    pub(crate) fn drop_table(&self) {
        self.conn
            .lock()
            .execute_batch("DROP TABLE usage_counters;")
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_format() {
        let month = current_month();
        assert_eq!(month.len(), 7);
        assert_eq!(&month[4..5], "-");
    }

    #[test]
    fn upsert_merges_counters() {
        let store = UsageStore::open_in_memory().unwrap();
        for _ in 0..3 {
            store
                .add(&UsageCounter::translation("2024-05", "libre", "hu", 5))
                .unwrap();
        }
        store
            .add(&UsageCounter::cache_hit("2024-05", "libre", "hu"))
            .unwrap();
        store
            .add(&UsageCounter::cache_hit("2024-05", "libre", "hu"))
            .unwrap();

        let row = store.get("2024-05", "libre", "hu").unwrap().unwrap();
        assert_eq!(row.char_count, 15);
        assert_eq!(row.translation_count, 3);
        assert_eq!(row.cache_misses, 3);
        assert_eq!(row.cache_hits, 2);
    }

    #[test]
    fn rows_are_keyed_by_month_provider_language() {
        let store = UsageStore::open_in_memory().unwrap();
        store.add(&UsageCounter::translation("2024-05", "libre", "hu", 10)).unwrap();
        store.add(&UsageCounter::translation("2024-06", "libre", "hu", 20)).unwrap();
        store.add(&UsageCounter::translation("2024-05", "deepl_free", "hu", 30)).unwrap();
        store.add(&UsageCounter::translation("2024-05", "libre", "de", 40)).unwrap();

        assert_eq!(store.char_usage("2024-05", "libre", "hu").unwrap(), 10);
        assert_eq!(store.char_usage("2024-06", "libre", "hu").unwrap(), 20);
        assert_eq!(store.char_usage("2024-05", "deepl_free", "hu").unwrap(), 30);
        assert_eq!(store.char_usage("2024-05", "libre", "fr").unwrap(), 0);

        let may: Vec<String> = store
            .monthly("2024-05", "libre")
            .unwrap()
            .into_iter()
            .map(|c| c.language)
            .collect();
        assert_eq!(may, vec!["de", "hu"]);
    }

    #[test]
    fn concurrent_writers_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.db");
        UsageStore::open(&path).unwrap();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = UsageStore::open(&path).unwrap();
                    for _ in 0..100 {
                        store
                            .add(&UsageCounter::translation("2024-05", "libre", "hu", 3))
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let row = UsageStore::open(&path)
            .unwrap()
            .get("2024-05", "libre", "hu")
            .unwrap()
            .unwrap();
        assert_eq!(row.char_count, 2_400);
        assert_eq!(row.translation_count, 800);
        assert_eq!(row.cache_misses, 800);
    }

    #[test]
    fn file_backed_ledger_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.db");
        {
            let store = UsageStore::open(&path).unwrap();
            store.add(&UsageCounter::translation("2024-05", "libre", "hu", 7)).unwrap();
        }
        let store = UsageStore::open(&path).unwrap();
        assert_eq!(store.char_usage("2024-05", "libre", "hu").unwrap(), 7);
    }
}
