//! Monthly character quotas per provider and language.
//! The check is advisory: it reads the ledger and decides, it does not reserve.
//! Concurrent requests may both pass and overshoot slightly; the limit is a soft guardrail.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::usage::{current_month, UsageStore};

/// Built-in monthly limits in characters.
pub const DEFAULT_LIMITS: &[(&str, u64)] = &[
    ("libre", 1_000_000),
    ("deepl_free", 500_000),
    ("deepl_pro", 10_000_000),
];

/// Limit for providers with neither a default nor an override.
pub const FALLBACK_LIMIT: u64 = 500_000;

/// Effective limits: operator overrides layered on [`DEFAULT_LIMITS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyLimits {
    limits: HashMap<String, u64>,
}

impl Default for MonthlyLimits {
    fn default() -> Self {
        Self {
            limits: DEFAULT_LIMITS
                .iter()
                .map(|(provider, limit)| (provider.to_string(), *limit))
                .collect(),
        }
    }
}

impl MonthlyLimits {
    pub fn with_overrides(overrides: &HashMap<String, u64>) -> Self {
        let mut limits = Self::default();
        for (provider, limit) in overrides {
            limits.limits.insert(provider.clone(), *limit);
        }
        limits
    }

    pub fn limit_for(&self, provider: &str) -> u64 {
        self.limits.get(provider).copied().unwrap_or(FALLBACK_LIMIT)
    }
}

/// Outcome of one quota check, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub used: u64,
    pub requested: u64,
    pub limit: u64,
    pub admitted: bool,
}

pub struct QuotaTracker {
    usage: Arc<UsageStore>,
    limits: MonthlyLimits,
}

impl QuotaTracker {
    pub fn new(usage: Arc<UsageStore>, limits: MonthlyLimits) -> Self {
        Self { usage, limits }
    }

    pub fn limits(&self) -> &MonthlyLimits {
        &self.limits
    }

    /// Decide against the current month's counter.
    pub fn check(&self, provider: &str, language: &str, additional_chars: u64) -> QuotaDecision {
        self.check_month(&current_month(), provider, language, additional_chars)
    }

    /// Decide against an explicit month's counter.
    /// A ledger read failure admits the request: stats are best-effort.
    pub fn check_month(
        &self,
        month: &str,
        provider: &str,
        language: &str,
        additional_chars: u64,
    ) -> QuotaDecision {
        let used = match self.usage.char_usage(month, provider, language) {
            Ok(used) => used,
            Err(e) => {
                warn!(error = %e, provider, language, "usage read failed, admitting request");
                0
            }
        };
        let limit = self.limits.limit_for(provider);
        QuotaDecision {
            used,
            requested: additional_chars,
            limit,
            admitted: used.saturating_add(additional_chars) <= limit,
        }
    }

    pub fn would_exceed(&self, provider: &str, language: &str, additional_chars: u64) -> bool {
        !self.check(provider, language, additional_chars).admitted
    }
}
