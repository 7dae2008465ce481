//! File-backed cache: `<root>/<target_lang>/<key>.json`, one JSON record per entry.
//! Writes go to a temp file in the same directory and are renamed into place,
//! so readers never observe a torn record.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{cache_key, validate_lang, CacheEntry, CacheStats, CacheStore};
use crate::error::Result;

const ENTRY_EXT: &str = "json";

pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open (or create) the cache directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!(path = %root.display(), "file cache opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, lang: &str, key: &str) -> PathBuf {
        self.root.join(lang).join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Language namespaces currently on disk.
    fn language_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let read = match fs::read_dir(&self.root) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        for dent in read {
            let dent = dent?;
            if dent.file_type()?.is_dir() {
                dirs.push(dent.path());
            }
        }
        Ok(dirs)
    }

    /// Entry files in one namespace. Temp files are skipped.
    fn entry_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        for dent in read {
            let path = dent?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn all_entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for dir in self.language_dirs()? {
            files.extend(Self::entry_files(&dir)?);
        }
        Ok(files)
    }

    fn remove_files(files: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in files {
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                // A concurrent clear got there first.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, path = %path.display(), "cache file removal failed"),
            }
        }
        removed
    }
}

impl CacheStore for FileCache {
    fn get(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<Option<CacheEntry>> {
        if validate_lang(target_lang).is_err() {
            return Ok(None);
        }
        let path = self.entry_path(target_lang, &cache_key(text, source_lang, target_lang));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        if entry.translated.is_empty() || !entry.is_valid() {
            debug!(to_lang = target_lang, "cache entry present but unusable");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn insert(&self, entry: CacheEntry) -> Result<()> {
        validate_lang(&entry.to_lang)?;
        let dir = self.root.join(&entry.to_lang);
        fs::create_dir_all(&dir)?;

        let key = entry.key();
        let tmp = dir.join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        if let Err(e) = fs::rename(&tmp, self.entry_path(&entry.to_lang, &key)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn clear_all(&self) -> Result<usize> {
        let removed = Self::remove_files(&self.all_entry_files()?);
        info!(removed, "file cache cleared");
        Ok(removed)
    }

    fn clear_expired(&self) -> Result<usize> {
        let now = crate::now_unix();
        let mut expired = Vec::new();
        for path in self.all_entry_files()? {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) if !entry.is_valid_at(now) => expired.push(path),
                Ok(_) => {}
                Err(e) => warn!(error = %e, path = %path.display(), "skipping unreadable cache file"),
            }
        }
        let removed = Self::remove_files(&expired);
        if removed > 0 {
            info!(removed, "expired cache entries removed");
        }
        Ok(removed)
    }

    fn clear_language(&self, lang: &str) -> Result<usize> {
        validate_lang(lang)?;
        let removed = Self::remove_files(&Self::entry_files(&self.root.join(lang))?);
        info!(removed, lang, "language cache cleared");
        Ok(removed)
    }

    fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.all_entry_files()? {
            match fs::metadata(&path) {
                Ok(meta) => {
                    stats.entries += 1;
                    stats.bytes += meta.len();
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TTL;

    fn open() -> (tempfile::TempDir, FileCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn put_then_get() {
        let (_dir, cache) = open();
        assert!(cache.get("Hello", "en", "hu").unwrap().is_none());

        cache
            .put("Hello", "en", "hu", "Szia", "libre", DEFAULT_TTL)
            .unwrap();
        let entry = cache.get("Hello", "en", "hu").unwrap().unwrap();
        assert_eq!(entry.translated, "Szia");
        assert_eq!(entry.provider, "libre");

        let path = cache.entry_path("hu", &cache_key("Hello", "en", "hu"));
        assert!(path.exists());
        // other pairs stay misses
        assert!(cache.get("Hello", "en", "de").unwrap().is_none());
    }

    #[test]
    fn record_uses_flat_json_shape() {
        let (_dir, cache) = open();
        cache
            .put("Hello", "en", "hu", "Szia", "libre", DEFAULT_TTL)
            .unwrap();
        let path = cache.entry_path("hu", &cache_key("Hello", "en", "hu"));
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        for field in [
            "original",
            "translated",
            "from_lang",
            "to_lang",
            "provider",
            "timestamp",
            "chars",
            "expires",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn expired_entry_reads_as_absent_but_stays_on_disk() {
        let (_dir, cache) = open();
        let mut entry = CacheEntry::new("Hello", "en", "hu", "Szia", "libre", DEFAULT_TTL);
        entry.expires = Some(crate::now_unix() - 1);
        cache.insert(entry).unwrap();

        assert!(cache.get("Hello", "en", "hu").unwrap().is_none());
        assert_eq!(cache.stats().unwrap().entries, 1);

        assert_eq!(cache.clear_expired().unwrap(), 1);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn legacy_entry_without_expiry_never_expires() {
        let (_dir, cache) = open();
        let mut entry = CacheEntry::new("Hello", "en", "de", "Hallo", "libre", DEFAULT_TTL);
        entry.expires = None;
        cache.insert(entry).unwrap();

        assert_eq!(cache.clear_expired().unwrap(), 0);
        assert_eq!(
            cache.get("Hello", "en", "de").unwrap().unwrap().translated,
            "Hallo"
        );
    }

    #[test]
    fn clear_language_only_touches_its_namespace() {
        let (_dir, cache) = open();
        cache.put("Hello", "en", "hu", "Szia", "libre", DEFAULT_TTL).unwrap();
        cache.put("Bye", "en", "hu", "Viszlát", "libre", DEFAULT_TTL).unwrap();
        cache.put("Hello", "en", "de", "Hallo", "libre", DEFAULT_TTL).unwrap();

        assert_eq!(cache.clear_language("hu").unwrap(), 2);
        assert!(cache.get("Hello", "en", "hu").unwrap().is_none());
        assert_eq!(
            cache.get("Hello", "en", "de").unwrap().unwrap().translated,
            "Hallo"
        );
        assert_eq!(cache.clear_language("fr").unwrap(), 0);
        assert!(cache.clear_language("../x").is_err());
    }

    #[test]
    fn clear_all_and_stats() {
        let (_dir, cache) = open();
        cache.put("a", "en", "hu", "A", "libre", DEFAULT_TTL).unwrap();
        cache.put("b", "en", "de", "B", "libre", DEFAULT_TTL).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.bytes > 0);

        assert_eq!(cache.clear_all().unwrap(), 2);
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn rewrite_replaces_entry() {
        let (_dir, cache) = open();
        cache.put("Hello", "en", "hu", "Helló", "libre", DEFAULT_TTL).unwrap();
        cache.put("Hello", "en", "hu", "Szia", "deepl_free", DEFAULT_TTL).unwrap();
        let entry = cache.get("Hello", "en", "hu").unwrap().unwrap();
        assert_eq!(entry.translated, "Szia");
        assert_eq!(cache.stats().unwrap().entries, 1);
    }

    #[test]
    fn corrupt_file_is_a_read_error() {
        let (_dir, cache) = open();
        let path = cache.entry_path("hu", &cache_key("Hello", "en", "hu"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(cache.get("Hello", "en", "hu").is_err());
        // the sweep skips it rather than failing
        assert_eq!(cache.clear_expired().unwrap(), 0);
    }
}
