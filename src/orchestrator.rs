//! Translation orchestrator.
//!
//! Per request: entry guard → cache lookup → quota check → provider call →
//! cache write + history append + usage update. Every failure degrades to
//! returning the input text; nothing here surfaces an error to the caller of
//! [`Orchestrator::translate`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::cache::{
    self, CacheEntry, CacheScope, CacheStats, CacheStore, CacheSweeper, FileCache, MemoryCache,
};
use crate::config::{CacheBackend, Settings};
use crate::error::Result;
use crate::history::{
    HistoryPage, HistoryQuery, HistoryRecord, HistoryStore, DEFAULT_RETENTION_DAYS,
};
use crate::metrics::{metric_names, MetricsRegistry, MetricsSnapshot};
use crate::quota::{MonthlyLimits, QuotaDecision, QuotaTracker};
use crate::translate::{
    build_provider, ProviderUsage, RequestContext, TranslationRequest, Translator,
};
use crate::usage::{current_month, UsageCounter, UsageStore};

/// Terminal state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Empty text or identical languages; nothing touched.
    Bypassed,
    CacheHit,
    Translated,
    QuotaExceeded,
    ProviderFailed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Bypassed => write!(f, "bypassed"),
            Outcome::CacheHit => write!(f, "cache_hit"),
            Outcome::Translated => write!(f, "translated"),
            Outcome::QuotaExceeded => write!(f, "quota_exceeded"),
            Outcome::ProviderFailed => write!(f, "provider_failed"),
        }
    }
}

/// Result text plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub outcome: Outcome,
}

impl Translation {
    fn unchanged(req: &TranslationRequest, outcome: Outcome) -> Self {
        Self {
            text: req.text.clone(),
            outcome,
        }
    }
}

/// Current-month usage for the active provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    pub month: String,
    pub provider: String,
    pub languages: Vec<UsageCounter>,
    pub total_chars: u64,
    pub limit: u64,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSummary {
    pub cleared: usize,
    pub message: String,
}

/// Which fields of a bulk item to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentScope {
    Title,
    Content,
    Both,
}

impl ContentScope {
    fn includes_title(self) -> bool {
        matches!(self, ContentScope::Title | ContentScope::Both)
    }

    fn includes_content(self) -> bool {
        matches!(self, ContentScope::Content | ContentScope::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub provider: String,
    pub available: bool,
    pub month: String,
    pub cache: Option<CacheStats>,
    pub history_records: Option<u64>,
    pub provider_usage: Option<ProviderUsage>,
}

fn outcome_metric(outcome: Outcome) -> Option<&'static str> {
    match outcome {
        Outcome::Bypassed => None,
        Outcome::CacheHit => Some(metric_names::OUTCOME_CACHE_HIT),
        Outcome::Translated => Some(metric_names::OUTCOME_TRANSLATED),
        Outcome::QuotaExceeded => Some(metric_names::OUTCOME_QUOTA_EXCEEDED),
        Outcome::ProviderFailed => Some(metric_names::OUTCOME_PROVIDER_FAILED),
    }
}

/// Store and filesystem calls run on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

pub struct Orchestrator {
    provider: Arc<dyn Translator>,
    cache: Arc<dyn CacheStore>,
    quota: Arc<QuotaTracker>,
    usage: Arc<UsageStore>,
    history: Arc<HistoryStore>,
    metrics: Arc<MetricsRegistry>,
    cache_ttl: Duration,
}

impl Orchestrator {
    /// Wire an orchestrator from explicit components, with default limits and TTL.
    pub fn new(
        provider: Arc<dyn Translator>,
        cache: Arc<dyn CacheStore>,
        usage: Arc<UsageStore>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            provider,
            cache,
            quota: Arc::new(QuotaTracker::new(Arc::clone(&usage), MonthlyLimits::default())),
            usage,
            history,
            metrics: Arc::new(MetricsRegistry::new()),
            cache_ttl: cache::DEFAULT_TTL,
        }
    }

    pub fn with_limits(mut self, limits: MonthlyLimits) -> Self {
        self.quota = Arc::new(QuotaTracker::new(Arc::clone(&self.usage), limits));
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build every component from validated settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let provider = build_provider(&settings.provider)?;
        let cache: Arc<dyn CacheStore> = match settings.cache.backend {
            CacheBackend::File => Arc::new(FileCache::open(&settings.cache.dir)?),
            CacheBackend::Memory => Arc::new(MemoryCache::new(settings.cache.memory_capacity)?),
        };
        if let Some(parent) = settings.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let usage = Arc::new(UsageStore::open(&settings.database_path)?);
        let history = Arc::new(HistoryStore::open(&settings.database_path)?);

        Ok(Self::new(provider, cache, usage, history)
            .with_limits(MonthlyLimits::with_overrides(&settings.monthly_limits))
            .with_cache_ttl(settings.cache.ttl()))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn cache(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.cache)
    }

    /// Start the periodic expired-entry sweep for this orchestrator's cache.
    pub fn spawn_sweeper(&self, every: Duration) -> CacheSweeper {
        CacheSweeper::spawn(self.cache(), every)
    }

    /// Translate, returning the input unchanged on any failure.
    pub async fn translate(&self, req: &TranslationRequest, ctx: &RequestContext) -> String {
        self.translate_detailed(req, ctx).await.text
    }

    pub async fn translate_detailed(
        &self,
        req: &TranslationRequest,
        ctx: &RequestContext,
    ) -> Translation {
        if req.is_noop() {
            return Translation::unchanged(req, Outcome::Bypassed);
        }

        let span = tracing::info_span!(
            "translate",
            request_id = %uuid::Uuid::new_v4(),
            from = %req.source_lang,
            to = %req.target_lang,
            use_cache = req.use_cache,
        );
        let total = self.metrics.start_timer(metric_names::TRANSLATE_TOTAL);
        let result = self.run(req, ctx).instrument(span).await;
        total.stop();

        if let Some(name) = outcome_metric(result.outcome) {
            self.metrics.incr(name);
        }
        result
    }

    async fn run(&self, req: &TranslationRequest, ctx: &RequestContext) -> Translation {
        let provider = self.provider.name().to_string();
        let month = current_month();
        let chars = req.char_count();
        let key = cache::cache_key(&req.text, &req.source_lang, &req.target_lang);

        if req.use_cache {
            let lookup = self.metrics.start_timer(metric_names::CACHE_LOOKUP);
            let cache = Arc::clone(&self.cache);
            let (text, from, to) = (
                req.text.clone(),
                req.source_lang.clone(),
                req.target_lang.clone(),
            );
            let cached = blocking(move || cache.get(&text, &from, &to)).await;
            lookup.stop();

            match cached {
                Ok(Some(entry)) => {
                    debug!(cache_key = %key, "cache hit");
                    self.record_usage(UsageCounter::cache_hit(&month, &provider, &req.target_lang))
                        .await;
                    return Translation {
                        text: entry.translated,
                        outcome: Outcome::CacheHit,
                    };
                }
                Ok(None) => debug!(cache_key = %key, "cache miss"),
                Err(e) => warn!(error = %e, cache_key = %key, "cache read failed, calling provider"),
            }
        }

        let quota = Arc::clone(&self.quota);
        let (q_month, q_provider, q_lang) =
            (month.clone(), provider.clone(), req.target_lang.clone());
        let checked =
            blocking(move || Ok(quota.check_month(&q_month, &q_provider, &q_lang, chars))).await;
        let decision = match checked {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, provider = %provider, "quota check failed, admitting request");
                QuotaDecision {
                    used: 0,
                    requested: chars,
                    limit: self.quota.limits().limit_for(&provider),
                    admitted: true,
                }
            }
        };
        if !decision.admitted {
            warn!(
                provider = %provider,
                used = decision.used,
                requested = decision.requested,
                limit = decision.limit,
                "monthly limit exceeded"
            );
            return Translation::unchanged(req, Outcome::QuotaExceeded);
        }
        debug!(
            provider = %provider,
            used = decision.used,
            chars,
            limit = decision.limit,
            "quota admitted"
        );

        let call = self.metrics.start_timer(metric_names::PROVIDER_CALL);
        let result = self
            .provider
            .translate(&req.text, &req.source_lang, &req.target_lang)
            .await;
        call.stop();

        let translated = match result {
            Ok(text) if !text.is_empty() && text != req.text => text,
            Ok(_) => {
                debug!(provider = %provider, "provider returned the input unchanged");
                return Translation::unchanged(req, Outcome::ProviderFailed);
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "translation failed, returning original text");
                return Translation::unchanged(req, Outcome::ProviderFailed);
            }
        };

        if req.use_cache {
            let cache = Arc::clone(&self.cache);
            let entry = CacheEntry::new(
                &req.text,
                &req.source_lang,
                &req.target_lang,
                &translated,
                &provider,
                self.cache_ttl,
            );
            if let Err(e) = blocking(move || cache.insert(entry)).await {
                warn!(error = %e, cache_key = %key, "cache write failed");
            }
        }

        info!(
            target: "autotranslate::usage",
            provider = %provider,
            to_lang = %req.target_lang,
            chars,
            cache_key = %key,
            "translated"
        );

        let record = HistoryRecord::new(
            &req.text,
            &translated,
            &req.source_lang,
            &req.target_lang,
            &provider,
            &key,
            ctx,
        );
        let history = Arc::clone(&self.history);
        if let Err(e) = blocking(move || history.append(&record)).await {
            warn!(error = %e, "history append failed");
        }

        self.record_usage(UsageCounter::translation(&month, &provider, &req.target_lang, chars))
            .await;

        Translation {
            text: translated,
            outcome: Outcome::Translated,
        }
    }

    async fn record_usage(&self, delta: UsageCounter) {
        let usage = Arc::clone(&self.usage);
        let provider = delta.provider.clone();
        if let Err(e) = blocking(move || usage.add(&delta)).await {
            warn!(error = %e, provider = %provider, "usage update failed");
        }
    }

    /// Current-month per-language usage for the active provider.
    pub fn stats(&self) -> Result<StatsReport> {
        let month = current_month();
        let provider = self.provider.name().to_string();
        let languages = self.usage.monthly(&month, &provider)?;
        let total_chars = languages.iter().map(|c| c.char_count).sum();
        let limit = self.quota.limits().limit_for(&provider);
        Ok(StatsReport {
            month,
            provider,
            languages,
            total_chars,
            limit,
            remaining: limit.saturating_sub(total_chars),
        })
    }

    pub fn history(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        self.history.query(query)
    }

    /// Delete history older than `days`; 0 means the default retention.
    pub fn clear_history(&self, days: u32) -> Result<ClearSummary> {
        let days = if days == 0 { DEFAULT_RETENTION_DAYS } else { days };
        let cleared = self.history.delete_older_than_days(days)?;
        Ok(ClearSummary {
            cleared,
            message: format!("Deleted {cleared} history entries older than {days} days"),
        })
    }

    pub fn clear_cache(&self, scope: &CacheScope) -> Result<ClearSummary> {
        let cleared = self.cache.clear(scope)?;
        Ok(ClearSummary {
            cleared,
            message: format!("Cleared {cleared} cache files"),
        })
    }

    /// Translate the selected fields of each item, cache enabled.
    pub async fn bulk_translate(
        &self,
        items: &[BulkItem],
        from: &str,
        to: &str,
        scope: ContentScope,
    ) -> Vec<BulkResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let ctx = RequestContext {
                post_id: Some(item.id),
                user_id: None,
            };
            let mut result = BulkResult {
                id: item.id,
                title: None,
                content: None,
            };
            if scope.includes_title() {
                let req = TranslationRequest::new(item.title.as_str(), from, to);
                result.title = Some(self.translate(&req, &ctx).await);
            }
            if scope.includes_content() {
                let req = TranslationRequest::new(item.content.as_str(), from, to);
                result.content = Some(self.translate(&req, &ctx).await);
            }
            results.push(result);
        }
        info!(items = results.len(), from, to, "bulk translation finished");
        results
    }

    /// Diagnostics: provider availability and store health.
    pub async fn status(&self) -> StatusReport {
        let store = Arc::clone(&self.cache);
        let cache = match blocking(move || store.stats()).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "cache stats unavailable");
                None
            }
        };
        let history = Arc::clone(&self.history);
        let history_records = match blocking(move || history.count()).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "history count unavailable");
                None
            }
        };
        StatusReport {
            provider: self.provider.name().to_string(),
            available: self.provider.is_available().await,
            month: current_month(),
            cache,
            history_records,
            provider_usage: self.provider.usage().await,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.summary()
    }
}
