//! Command-line driver over a JSON snapshot of the content store.
//!
//! Usage:
//!   content-localizer <snapshot.json> propagate <content-type> <entry-id>
//!   content-localizer <snapshot.json> reconcile <source-locale> <marker-id>...
//!   content-localizer <snapshot.json> usage
//!
//! Required environment variables:
//! - DEEPL_API_KEY
//!
//! The snapshot is written back after `propagate` and `reconcile`.

use anyhow::{bail, Context, Result};
use content_localizer::config::Config;
use content_localizer::i18n::DispatchMetrics;
use content_localizer::store::{MarkerId, MemoryStore};
use content_localizer::LocalizationService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

fn print_usage() {
    println!(
        r#"content-localizer - translate content entries into every configured locale

USAGE:
    content-localizer <snapshot.json> <COMMAND>

COMMANDS:
    propagate <content-type> <entry-id>      Translate an entry into all other locales
    reconcile <source-locale> <marker-id>... Re-translate groups recorded as change markers
    usage                                    Show characters consumed on the DeepL account

ENVIRONMENT:
    DEEPL_API_KEY                 DeepL authentication key (required)
    DEEPL_API_URL                 Override the API endpoint
    DEEPL_LOCALE_MAP              JSON object of locale overrides
    DEEPL_GLOSSARIES              JSON array of glossaries
    DEEPL_API_OPTIONS             JSON object of engine options
    DEEPL_MAX_CONCURRENT          Concurrent engine calls (default 5)
    DEEPL_MIN_INTERVAL_MS         Minimum gap between calls (default 200)
    TRANSLATE_REGENERATE_UIDS     Regenerate uid fields for new siblings (default false)
"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("content_localizer=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let snapshot_path = PathBuf::from(&args[1]);
    let command = args[2].as_str();
    let rest = &args[3..];

    let config = Config::from_env()?;
    let store = Arc::new(MemoryStore::load(&snapshot_path)?);
    let service = LocalizationService::new(
        config.dispatcher(Arc::new(config.engine())),
        store.clone(),
        store.clone(),
        Arc::new(store.schema()),
        config.regenerate_uids,
    );

    match command {
        "propagate" => {
            let [content_type, id] = rest else {
                bail!("propagate expects <content-type> <entry-id>");
            };
            let id = id
                .parse()
                .with_context(|| format!("Invalid entry id '{}'", id))?;
            let source = service.propagate_entry(content_type, id).await?;
            info!(
                "Entry {} now has {} localizations",
                source.id,
                source.localizations.len()
            );
            store.save(&snapshot_path)?;
        }
        "reconcile" => {
            let Some((source_locale, ids)) = rest.split_first() else {
                bail!("reconcile expects <source-locale> <marker-id>...");
            };
            let marker_ids = ids
                .iter()
                .map(|id| {
                    id.parse::<MarkerId>()
                        .with_context(|| format!("Invalid marker id '{}'", id))
                })
                .collect::<Result<Vec<_>>>()?;
            let report = service.reconcile(&marker_ids, source_locale).await;
            store.save(&snapshot_path)?;
            for (id, error) in &report.failed {
                warn!("Marker {} kept: {}", id, error);
            }
            if !report.is_success() {
                bail!("{} change markers failed", report.failed.len());
            }
        }
        "usage" => {
            let characters = service.usage().await?;
            println!("{} characters used", characters);
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }

    let metrics = DispatchMetrics::global().report();
    info!("Dispatch metrics: {}", serde_json::to_string(&metrics)?);
    Ok(())
}
