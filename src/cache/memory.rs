//! In-process cache: one LRU per target language.
//! Lost on restart; suited to single-process deployments and tests.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use super::{cache_key, validate_lang, CacheEntry, CacheStats, CacheStore};
use crate::error::{Error, Result};

pub struct MemoryCache {
    inner: Mutex<HashMap<String, LruCache<String, CacheEntry>>>,
    capacity: NonZeroUsize,
}

impl MemoryCache {
    /// `capacity` bounds the number of entries kept per language.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::InvalidConfig("cache capacity must be > 0".into()))?;
        Ok(Self {
            inner: Mutex::new(HashMap::new()),
            capacity,
        })
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<Option<CacheEntry>> {
        let key = cache_key(text, source_lang, target_lang);
        let mut langs = self.inner.lock();
        let hit = langs
            .get_mut(target_lang)
            .and_then(|lru| lru.get(&key))
            .filter(|entry| entry.is_valid())
            .cloned();
        Ok(hit)
    }

    fn insert(&self, entry: CacheEntry) -> Result<()> {
        validate_lang(&entry.to_lang)?;
        let key = entry.key();
        let mut langs = self.inner.lock();
        langs
            .entry(entry.to_lang.clone())
            .or_insert_with(|| LruCache::new(self.capacity))
            .put(key, entry);
        Ok(())
    }

    fn clear_all(&self) -> Result<usize> {
        let mut langs = self.inner.lock();
        let removed = langs.values().map(|lru| lru.len()).sum();
        langs.clear();
        Ok(removed)
    }

    fn clear_expired(&self) -> Result<usize> {
        let now = crate::now_unix();
        let mut langs = self.inner.lock();
        let mut removed = 0;
        for lru in langs.values_mut() {
            let expired: Vec<String> = lru
                .iter()
                .filter(|(_, entry)| !entry.is_valid_at(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in expired {
                lru.pop(&key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clear_language(&self, lang: &str) -> Result<usize> {
        validate_lang(lang)?;
        let mut langs = self.inner.lock();
        Ok(langs.remove(lang).map(|lru| lru.len()).unwrap_or(0))
    }

    fn stats(&self) -> Result<CacheStats> {
        let langs = self.inner.lock();
        let mut stats = CacheStats::default();
        for (_, entry) in langs.values().flat_map(|lru| lru.iter()) {
            stats.entries += 1;
            stats.bytes += (entry.original.len() + entry.translated.len()) as u64;
        }
        Ok(stats)
    }
}
