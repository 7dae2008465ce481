use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tracing::info;

use autotranslate::cli::{Args, Command};
use autotranslate::history::HistoryQuery;
use autotranslate::orchestrator::BulkItem;
use autotranslate::{init_tracing, Orchestrator, RequestContext, Settings, TranslationRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    init_tracing(settings.log_format);

    let engine = Orchestrator::from_settings(&settings)?;
    let default_from = settings.default_from_lang.clone();

    match args.command {
        Command::Translate {
            text,
            to,
            from,
            no_cache,
            post_id,
            user_id,
        } => {
            let mut req = TranslationRequest::new(text, from.unwrap_or(default_from), to);
            if no_cache {
                req = req.without_cache();
            }
            let ctx = RequestContext { post_id, user_id };
            print_json(&engine.translate_detailed(&req, &ctx).await)?;
        }
        Command::Stats => print_json(&engine.stats()?)?,
        Command::History {
            page,
            per_page,
            language,
            provider,
        } => {
            let query = HistoryQuery {
                page,
                per_page,
                language,
                provider,
            };
            print_json(&engine.history(&query)?)?;
        }
        Command::ClearCache { target, lang } => {
            let Some(scope) = target.into_scope(lang) else {
                bail!("--lang is required when clearing a language");
            };
            print_json(&engine.clear_cache(&scope)?)?;
        }
        Command::ClearHistory { days } => print_json(&engine.clear_history(days)?)?,
        Command::Bulk {
            file,
            to,
            from,
            scope,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let items: Vec<BulkItem> =
                serde_json::from_str(&raw).context("parsing bulk items")?;
            let from = from.unwrap_or(default_from);
            let results = engine.bulk_translate(&items, &from, &to, scope.into()).await;
            print_json(&results)?;
        }
        Command::Status => print_json(&engine.status().await)?,
        Command::Sweep => {
            let sweeper = engine.spawn_sweeper(settings.cache.sweep_interval());
            info!(
                every_secs = settings.cache.sweep_interval_secs,
                "sweeper running, press Ctrl+C to stop"
            );
            signal::ctrl_c().await.context("waiting for Ctrl+C")?;
            sweeper.shutdown().await;
            info!("sweeper stopped");
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
