//! autotranslate: cached, quota-guarded machine translation for content sites.
//! Library root: module wiring, tracing setup and shared helpers.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod orchestrator;
pub mod quota;
pub mod translate;
pub mod usage;

pub use config::{LogFormat, Settings};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, Outcome, Translation};
pub use translate::{RequestContext, TranslationRequest, Translator};

/// Initialize the global tracing subscriber. `RUST_LOG` overrides the default filter.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autotranslate=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
