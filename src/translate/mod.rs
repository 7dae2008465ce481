//! Translation requests and the provider adapter seam.
//! Concrete backends: LibreTranslate (self-hosted/free) and DeepL (free/pro tiers).

pub mod deepl;
pub mod libre;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ProviderSettings;
use deepl::DeepLClient;
use libre::LibreTranslateClient;

/// Timeout for translate calls.
pub const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for availability probes.
pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for provider-side usage probes.
pub const USAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Languages the engine offers, as (ISO 639-1 code, English name).
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("hu", "Hungarian"),
    ("en", "English"),
    ("de", "German"),
    ("fr", "French"),
    ("es", "Spanish"),
    ("it", "Italian"),
    ("th", "Thai"),
    ("ru", "Russian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("nl", "Dutch"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("ar", "Arabic"),
];

pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// A single translation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub use_cache: bool,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            use_cache: true,
        }
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Empty text or an identical language pair: nothing to translate.
    pub fn is_noop(&self) -> bool {
        self.text.is_empty() || self.source_lang == self.target_lang
    }

    /// Character count used for quota and usage accounting.
    pub fn char_count(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

/// Optional attribution recorded with history entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub post_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// Character usage as reported by the provider itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub character_count: u64,
    pub character_limit: u64,
}

/// Why a provider call failed. The orchestrator treats every variant the same way.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API key missing")]
    MissingApiKey,

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("authentication rejected (status {0})")]
    Auth(u16),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Translator trait (adapter for different backends).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `from` to `to`. Never retried by the caller.
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError>;

    /// Stable identifier used for usage accounting and limits, e.g. `libre`.
    fn name(&self) -> &str;

    async fn is_available(&self) -> bool;

    /// Provider-reported usage, where the backend exposes it.
    async fn usage(&self) -> Option<ProviderUsage> {
        None
    }
}

/// Shared pooled HTTP client for provider adapters.
pub fn http_client() -> crate::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(TRANSLATE_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Build the active provider from validated settings.
/// A DeepL configuration without an API key falls back to LibreTranslate.
pub fn build_provider(settings: &ProviderSettings) -> crate::Result<Arc<dyn Translator>> {
    let http = http_client()?;
    let provider: Arc<dyn Translator> = match settings {
        ProviderSettings::Libre { url } => Arc::new(LibreTranslateClient::with_client(http, url)),
        ProviderSettings::Deepl { api_key, base_url } => {
            if api_key.trim().is_empty() {
                warn!("DeepL selected without an API key, falling back to LibreTranslate");
                Arc::new(LibreTranslateClient::with_client(http, libre::DEFAULT_URL))
            } else {
                Arc::new(DeepLClient::with_client(http, api_key, base_url.as_deref()))
            }
        }
    };
    info!(provider = provider.name(), "translation provider initialized");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_requests() {
        assert!(TranslationRequest::new("", "en", "hu").is_noop());
        assert!(TranslationRequest::new("Hello", "en", "en").is_noop());
        assert!(!TranslationRequest::new("Hello", "en", "hu").is_noop());
    }

    #[test]
    fn char_count_counts_characters_not_bytes() {
        assert_eq!(TranslationRequest::new("Hello", "en", "hu").char_count(), 5);
        assert_eq!(TranslationRequest::new("árvíztűrő", "hu", "en").char_count(), 9);
    }

    #[test]
    fn language_table_lookup() {
        assert_eq!(language_name("hu"), Some("Hungarian"));
        assert_eq!(language_name("xx"), None);
        assert_eq!(SUPPORTED_LANGUAGES.len(), 15);
    }

    #[test]
    fn factory_selects_provider_by_settings() {
        let libre = build_provider(&ProviderSettings::default()).unwrap();
        assert_eq!(libre.name(), "libre");

        let free = build_provider(&ProviderSettings::Deepl {
            api_key: "key:fx".into(),
            base_url: None,
        })
        .unwrap();
        assert_eq!(free.name(), "deepl_free");

        let pro = build_provider(&ProviderSettings::Deepl {
            api_key: "key".into(),
            base_url: None,
        })
        .unwrap();
        assert_eq!(pro.name(), "deepl_pro");
    }

    #[test]
    fn factory_falls_back_without_api_key() {
        let provider = build_provider(&ProviderSettings::Deepl {
            api_key: "  ".into(),
            base_url: None,
        })
        .unwrap();
        assert_eq!(provider.name(), "libre");
    }
}
