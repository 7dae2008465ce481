//! Periodic removal of expired cache entries, independent of request handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::CacheStore;

/// Handle to a running sweep loop. Dropping it leaves the loop running;
/// call [`CacheSweeper::shutdown`] to stop it.
pub struct CacheSweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Start sweeping every `every`. The first sweep runs immediately.
    /// Must be called from within a Tokio runtime.
    pub fn spawn(cache: Arc<dyn CacheStore>, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let cache = Arc::clone(&cache);
                match tokio::task::spawn_blocking(move || cache.clear_expired()).await {
                    Ok(Ok(removed)) => info!(removed, "cache sweep finished"),
                    Ok(Err(e)) => warn!(error = %e, "cache sweep failed"),
                    Err(e) => warn!(error = %e, "cache sweep task panicked"),
                }
            }
            info!("cache sweeper stopped");
        });
        info!(interval_secs = every.as_secs(), "cache sweeper started");
        Self { cancel, handle }
    }

    /// Stop the loop and wait for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "cache sweeper join failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, MemoryCache, DEFAULT_TTL};

    #[tokio::test]
    async fn sweeps_expired_entries_in_background() {
        let cache = Arc::new(MemoryCache::new(16).unwrap());
        let mut stale = CacheEntry::new("old", "en", "hu", "régi", "libre", DEFAULT_TTL);
        stale.expires = Some(crate::now_unix() - 10);
        cache.insert(stale).unwrap();
        cache.put("new", "en", "hu", "új", "libre", DEFAULT_TTL).unwrap();

        let sweeper = CacheSweeper::spawn(cache.clone(), Duration::from_millis(10));
        for _ in 0..100 {
            if cache.stats().unwrap().entries == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweeper.shutdown().await;

        assert_eq!(cache.stats().unwrap().entries, 1);
        assert!(cache.get("new", "en", "hu").unwrap().is_some());
    }

    #[tokio::test]
    async fn shutdown_is_prompt() {
        let cache = Arc::new(MemoryCache::new(4).unwrap());
        let sweeper = CacheSweeper::spawn(cache, Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(5), sweeper.shutdown())
            .await
            .expect("sweeper did not stop");
    }
}
