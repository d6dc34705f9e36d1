pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::engine::validate_days_back;
use crate::core::notify::Notifier;
use crate::core::{CurrencyTranslator, SyncEngine, Target};
use anyhow::Result;
use chrono::{Days, NaiveDateTime, Utc};
use chrono_tz::Tz;
use providers::{FeedSource, HttpMailer, LedgerDownstream, LogNotifier, MidrangeDownstream};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Scrape,
    Push {
        target: Target,
        days_back: i64,
        force: bool,
    },
    Backfill {
        target: Target,
        days_back: i64,
    },
    BackfillBoth {
        days_back: i64,
    },
    Status {
        target: Target,
    },
    /// `None` lists every stored snapshot.
    Rates {
        days_back: Option<i64>,
    },
    Reconcile,
    Alert {
        target: Target,
    },
    TestNotice,
    Watch,
}

/// Local wall-clock time in the business timezone.
pub fn local_now(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Wires the engine from configuration: HTTP feed, fjall (or in-memory)
/// store, both SQL targets and the mail gateway when one is configured.
pub fn build_engine(config: &AppConfig) -> Result<SyncEngine> {
    let store = store::open_rate_store(config)?;
    let source = Arc::new(FeedSource::new(&config.source.base_url, &config.source.path));
    let ledger = Arc::new(LedgerDownstream::new(config.targets.ledger.clone()));
    let midrange = Arc::new(MidrangeDownstream::new(config.targets.midrange.clone()));
    let notifier: Arc<dyn Notifier> = match &config.notifier {
        Some(mail) => Arc::new(HttpMailer::new(mail)),
        None => Arc::new(LogNotifier),
    };
    let translator = CurrencyTranslator::new(
        &config.targets.ledger.currency_codes,
        &config.targets.midrange.currency_codes,
    );

    Ok(
        SyncEngine::new(store, source, ledger, midrange, notifier, translator)
            .with_per_hundred(config.source.per_hundred.clone()),
    )
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>, json: bool) -> Result<()> {
    info!("Rate sync starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let tz = config.timezone()?;
    let engine = build_engine(&config)?;
    let now = local_now(tz);
    let today = now.date();

    match command {
        AppCommand::Scrape => cli::rates::scrape(&engine, now, json).await,
        AppCommand::Push {
            target,
            days_back,
            force,
        } => cli::push::push_day(&engine, target, days_back, today, force, json).await,
        AppCommand::Backfill { target, days_back } => {
            cli::backfill::run(&engine, target, days_back, today, json).await
        }
        AppCommand::BackfillBoth { days_back } => {
            cli::backfill::run_both(&engine, days_back, today, json).await
        }
        AppCommand::Status { target } => cli::status::status(&engine, target, today, json).await,
        AppCommand::Rates { days_back } => {
            let date = match days_back {
                Some(days) => Some(today - Days::new(u64::from(validate_days_back(days)?))),
                None => None,
            };
            cli::rates::list(&engine, date, json).await
        }
        AppCommand::Reconcile => cli::push::reconcile(&engine, now, json).await,
        AppCommand::Alert { target } => cli::status::alert(&engine, target, today, json).await,
        AppCommand::TestNotice => {
            engine.send_test_notice().await;
            Ok(())
        }
        AppCommand::Watch => cli::watch::run(&engine, &config.schedule, tz).await,
    }
}
