//! End-to-end: settings → orchestrator → mock LibreTranslate, file cache and SQLite.

use std::collections::HashMap;

use autotranslate::cache::CacheScope;
use autotranslate::config::{CacheBackend, CacheSettings, ProviderSettings};
use autotranslate::history::HistoryQuery;
use autotranslate::orchestrator::{BulkItem, ContentScope};
use autotranslate::{Orchestrator, Outcome, RequestContext, Settings, TranslationRequest};
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

fn settings(dir: &TempDir, url: &str) -> Settings {
    Settings {
        provider: ProviderSettings::Libre {
            url: url.to_string(),
        },
        cache: CacheSettings {
            backend: CacheBackend::File,
            dir: dir.path().join("cache"),
            ..CacheSettings::default()
        },
        database_path: dir.path().join("db").join("autotranslate.db"),
        ..Settings::default()
    }
}

#[tokio::test]
async fn repeated_request_hits_provider_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/translate")
        .match_body(Matcher::PartialJson(json!({"q": "Hello", "target": "hu"})))
        .with_status(200)
        .with_body(r#"{"translatedText":"Szia"}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let engine = Orchestrator::from_settings(&settings(&dir, &server.url())).unwrap();
    let req = TranslationRequest::new("Hello", "en", "hu");
    let ctx = RequestContext {
        post_id: Some(5),
        user_id: None,
    };

    let first = engine.translate_detailed(&req, &ctx).await;
    let second = engine.translate_detailed(&req, &ctx).await;

    assert_eq!(first.text, "Szia");
    assert_eq!(first.outcome, Outcome::Translated);
    assert_eq!(second.text, "Szia");
    assert_eq!(second.outcome, Outcome::CacheHit);
    mock.assert_async().await;

    // cache file lands in the target-language namespace
    let key = autotranslate::cache::cache_key("Hello", "en", "hu");
    assert!(dir
        .path()
        .join("cache")
        .join("hu")
        .join(format!("{key}.json"))
        .exists());

    let history = engine.history(&HistoryQuery::default()).unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.records[0].post_id, Some(5));

    let stats = engine.stats().unwrap();
    assert_eq!(stats.provider, "libre");
    assert_eq!(stats.total_chars, 5);
    let hu = &stats.languages[0];
    assert_eq!(hu.cache_hits, 1);
    assert_eq!(hu.cache_misses, 1);
}

#[tokio::test]
async fn provider_outage_passes_text_through() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/translate")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let engine = Orchestrator::from_settings(&settings(&dir, &server.url())).unwrap();

    let out = engine
        .translate(
            &TranslationRequest::new("Hello", "en", "hu"),
            &RequestContext::default(),
        )
        .await;
    assert_eq!(out, "Hello");
    assert_eq!(engine.history(&HistoryQuery::default()).unwrap().total, 0);
    assert_eq!(engine.clear_cache(&CacheScope::All).unwrap().cleared, 0);
}

#[tokio::test]
async fn configured_limit_blocks_provider() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/translate")
        .with_status(200)
        .with_body(r#"{"translatedText":"x"}"#)
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let mut settings = settings(&dir, &server.url());
    settings.monthly_limits = HashMap::from([("libre".to_string(), 3)]);
    let engine = Orchestrator::from_settings(&settings).unwrap();

    let out = engine
        .translate_detailed(
            &TranslationRequest::new("Hello", "en", "hu"),
            &RequestContext::default(),
        )
        .await;
    assert_eq!(out.outcome, Outcome::QuotaExceeded);
    assert_eq!(out.text, "Hello");
    mock.assert_async().await;
}

#[tokio::test]
async fn admin_operations_report_counts() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/translate")
        .with_status(200)
        .with_body(r#"{"translatedText":"fordítás"}"#)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let engine = Orchestrator::from_settings(&settings(&dir, &server.url())).unwrap();

    let items = vec![
        BulkItem {
            id: 1,
            title: "First".into(),
            content: "Body one".into(),
        },
        BulkItem {
            id: 2,
            title: "Second".into(),
            content: "Body two".into(),
        },
    ];
    let results = engine
        .bulk_translate(&items, "en", "hu", ContentScope::Both)
        .await;
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.title.as_deref() == Some("fordítás")));

    let history = engine
        .history(&HistoryQuery {
            language: Some("hu".into()),
            ..HistoryQuery::default()
        })
        .unwrap();
    assert_eq!(history.total, 4);

    let cleared = engine.clear_history(1).unwrap();
    assert_eq!(cleared.cleared, 0);
    assert_eq!(
        cleared.message,
        "Deleted 0 history entries older than 1 days"
    );

    let status = engine.status().await;
    assert_eq!(status.cache.map(|c| c.entries), Some(4));
    assert_eq!(status.history_records, Some(4));

    let summary = engine.clear_cache(&CacheScope::All).unwrap();
    assert_eq!(summary.cleared, 4);
    assert_eq!(summary.message, "Cleared 4 cache files");
}
