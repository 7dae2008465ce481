//! Translation cache: content-addressed entries namespaced by target language.
//! Key: blake3 of (text | source_lang | target_lang), first 16 bytes as hex.
//! Expiry is checked on read; deletion is left to the sweep and clear operations.

pub mod file;
pub mod memory;
pub mod sweeper;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use file::FileCache;
pub use memory::MemoryCache;
pub use sweeper::CacheSweeper;

/// Default entry lifetime: 30 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Length of a cache key in hex characters.
pub const KEY_LEN: usize = 32;

/// Compute the cache key for a (text, language pair) tuple.
pub fn cache_key(text: &str, source_lang: &str, target_lang: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(source_lang.as_bytes());
    hasher.update(b"|");
    hasher.update(target_lang.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..KEY_LEN].to_string()
}

/// Language codes double as namespace names, so keep them path-safe.
pub fn validate_lang(lang: &str) -> Result<()> {
    let ok = !lang.is_empty()
        && lang.len() <= 16
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidLanguage(lang.to_string()))
    }
}

/// Persisted cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub original: String,
    pub translated: String,
    pub from_lang: String,
    pub to_lang: String,
    #[serde(default)]
    pub provider: String,
    /// Write time, `YYYY-MM-DD HH:MM:SS` UTC.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub chars: u64,
    /// Unix seconds. Entries written before expiry existed have none and never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl CacheEntry {
    pub fn new(
        original: &str,
        from_lang: &str,
        to_lang: &str,
        translated: &str,
        provider: &str,
        ttl: Duration,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            original: original.to_string(),
            translated: translated.to_string(),
            from_lang: from_lang.to_string(),
            to_lang: to_lang.to_string(),
            provider: provider.to_string(),
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            chars: original.chars().count() as u64,
            expires: Some(now.timestamp().saturating_add(ttl.as_secs() as i64)),
        }
    }

    pub fn key(&self) -> String {
        cache_key(&self.original, &self.from_lang, &self.to_lang)
    }

    pub fn is_valid_at(&self, now_unix: i64) -> bool {
        match self.expires {
            None => true,
            Some(expires) => now_unix < expires,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(crate::now_unix())
    }
}

/// What an admin clear operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "language", rename_all = "lowercase")]
pub enum CacheScope {
    All,
    Expired,
    Language(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub bytes: u64,
}

/// Storage backend for cache entries. Implementations must be safe to share
/// between request handlers and the background sweeper.
pub trait CacheStore: Send + Sync {
    /// Look up a valid entry. Expired entries read as absent but are not removed.
    fn get(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry under its target language, replacing any previous one.
    fn insert(&self, entry: CacheEntry) -> Result<()>;

    fn clear_all(&self) -> Result<usize>;

    fn clear_expired(&self) -> Result<usize>;

    fn clear_language(&self, lang: &str) -> Result<usize>;

    fn stats(&self) -> Result<CacheStats>;

    fn put(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        translated: &str,
        provider: &str,
        ttl: Duration,
    ) -> Result<()> {
        self.insert(CacheEntry::new(
            text,
            source_lang,
            target_lang,
            translated,
            provider,
            ttl,
        ))
    }

    fn clear(&self, scope: &CacheScope) -> Result<usize> {
        match scope {
            CacheScope::All => self.clear_all(),
            CacheScope::Expired => self.clear_expired(),
            CacheScope::Language(lang) => self.clear_language(lang),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_and_fixed_length() {
        let a = cache_key("Hello", "en", "hu");
        assert_eq!(a, cache_key("Hello", "en", "hu"));
        assert_eq!(a.len(), KEY_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        assert_ne!(a, cache_key("Hello", "en", "de"));
        assert_ne!(a, cache_key("Hello", "de", "hu"));
        assert_ne!(a, cache_key("hello", "en", "hu"));
    }

    #[test]
    fn separator_keeps_fields_apart() {
        assert_ne!(cache_key("ab", "c", "d"), cache_key("a", "bc", "d"));
    }

    #[test]
    fn entry_validity() {
        let mut entry = CacheEntry::new("Hello", "en", "hu", "Szia", "libre", DEFAULT_TTL);
        let now = crate::now_unix();
        assert!(entry.is_valid_at(now));
        assert_eq!(entry.chars, 5);
        assert_eq!(entry.key(), cache_key("Hello", "en", "hu"));

        entry.expires = Some(now - 1);
        assert!(!entry.is_valid_at(now));

        entry.expires = None;
        assert!(entry.is_valid_at(i64::MAX));
    }

    #[test]
    fn legacy_record_without_expiry_parses() {
        let raw = r#"{"original":"Hello","translated":"Hallo","from_lang":"en","to_lang":"de"}"#;
        let entry: CacheEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.expires, None);
        assert!(entry.is_valid());
    }

    #[test]
    fn lang_validation_rejects_paths() {
        assert!(validate_lang("hu").is_ok());
        assert!(validate_lang("pt-BR").is_ok());
        assert!(validate_lang("").is_err());
        assert!(validate_lang("../etc").is_err());
        assert!(validate_lang("a/b").is_err());
    }
}
