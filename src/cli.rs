//! Command-line arguments for the `autotranslate` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cache::CacheScope;
use crate::history::DEFAULT_RETENTION_DAYS;
use crate::orchestrator::ContentScope;

#[derive(Parser, Debug)]
#[command(name = "autotranslate", version, about, long_about = None)]
pub struct Args {
    /// TOML settings file; `AUTOTRANSLATE_*` env vars override it
    #[arg(short, long, global = true, env = "AUTOTRANSLATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate one text and print the result
    Translate {
        text: String,
        /// Target language code
        #[arg(short, long)]
        to: String,
        /// Source language code (defaults to `default_from_lang`)
        #[arg(short, long)]
        from: Option<String>,
        /// Skip cache lookup and write
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        post_id: Option<i64>,
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Current-month usage for the active provider
    Stats,
    /// Page through translation history
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
        /// Matches either the source or the target language
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        provider: Option<String>,
    },
    /// Remove cache entries
    ClearCache {
        #[arg(value_enum, default_value_t = ClearTarget::All)]
        target: ClearTarget,
        /// Language namespace, required with `language`
        #[arg(long, required_if_eq("target", "language"))]
        lang: Option<String>,
    },
    /// Delete history older than the given number of days (0 means the default)
    ClearHistory {
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
        days: u32,
    },
    /// Translate a JSON array of `{id, title, content}` items
    Bulk {
        file: PathBuf,
        #[arg(short, long)]
        to: String,
        #[arg(short, long)]
        from: Option<String>,
        #[arg(long, value_enum, default_value_t = BulkScope::Both)]
        scope: BulkScope,
    },
    /// Provider availability and store health
    Status,
    /// Run the expired-entry sweeper until interrupted
    Sweep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    All,
    Expired,
    Language,
}

impl ClearTarget {
    pub fn into_scope(self, lang: Option<String>) -> Option<CacheScope> {
        match self {
            ClearTarget::All => Some(CacheScope::All),
            ClearTarget::Expired => Some(CacheScope::Expired),
            ClearTarget::Language => lang.map(CacheScope::Language),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BulkScope {
    Title,
    Content,
    Both,
}

impl From<BulkScope> for ContentScope {
    fn from(scope: BulkScope) -> Self {
        match scope {
            BulkScope::Title => ContentScope::Title,
            BulkScope::Content => ContentScope::Content,
            BulkScope::Both => ContentScope::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_translate() {
        let args = Args::parse_from(["autotranslate", "translate", "Hello", "--to", "hu"]);
        match args.command {
            Command::Translate { text, to, from, no_cache, .. } => {
                assert_eq!(text, "Hello");
                assert_eq!(to, "hu");
                assert_eq!(from, None);
                assert!(!no_cache);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn clear_language_requires_lang() {
        assert!(Args::try_parse_from(["autotranslate", "clear-cache", "language"]).is_err());

        let args =
            Args::try_parse_from(["autotranslate", "clear-cache", "language", "--lang", "hu"])
                .unwrap();
        match args.command {
            Command::ClearCache { target, lang } => {
                assert_eq!(
                    target.into_scope(lang),
                    Some(CacheScope::Language("hu".into()))
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
