//! Layered settings: built-in defaults < optional TOML file < `AUTOTRANSLATE_*` env vars.
//!
//! Nested keys use `__` in environment variables, e.g.
//! `AUTOTRANSLATE_CACHE__TTL_DAYS=7` or `AUTOTRANSLATE_MONTHLY_LIMITS__LIBRE=2000000`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::translate::libre;

const ENV_PREFIX: &str = "AUTOTRANSLATE";

/// Top-level engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub cache: CacheSettings,
    /// SQLite file holding the usage ledger and the history log.
    pub database_path: PathBuf,
    /// Per-provider monthly character limits, layered over the built-in defaults.
    pub monthly_limits: HashMap<String, u64>,
    pub default_from_lang: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            cache: CacheSettings::default(),
            database_path: PathBuf::from("autotranslate.db"),
            monthly_limits: HashMap::new(),
            default_from_lang: "en".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Which backend answers translation requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderSettings {
    Libre {
        #[serde(default = "default_libre_url")]
        url: String,
    },
    Deepl {
        #[serde(default)]
        api_key: String,
        /// Overrides the tier endpoint derived from the key.
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings::Libre {
            url: default_libre_url(),
        }
    }
}

fn default_libre_url() -> String {
    libre::DEFAULT_URL.to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    /// Root directory of the file cache; one subdirectory per target language.
    pub dir: PathBuf,
    pub ttl_days: u32,
    /// Entries kept per language by the memory backend.
    pub memory_capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            dir: PathBuf::from("autotranslate-cache"),
            ttl_days: 30,
            memory_capacity: 4096,
            sweep_interval_secs: 24 * 3600,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_days) * 24 * 3600)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Settings {
    /// Load settings with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file, if given
    /// 3. Defaults (lowest)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=365).contains(&self.cache.ttl_days) {
            return Err(Error::InvalidConfig(format!(
                "cache.ttl_days must be between 1 and 365, got {}",
                self.cache.ttl_days
            )));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "cache.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.cache.memory_capacity == 0 {
            return Err(Error::InvalidConfig(
                "cache.memory_capacity must be greater than 0".into(),
            ));
        }
        if let ProviderSettings::Libre { url } = &self.provider {
            if url.trim().is_empty() {
                return Err(Error::InvalidConfig("provider.url must not be empty".into()));
            }
        }
        Ok(())
    }
}
