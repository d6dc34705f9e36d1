//! Rate synchronization and push engine.
//!
//! The engine reads "today" and "now" from its callers and never from the
//! clock, so every operation is deterministic for a given store and set of
//! downstream systems. Targets and rows are processed sequentially.

use crate::core::downstream::{DayLock, Downstream};
use crate::core::error::{Result, SyncError};
use crate::core::notify::{Notice, Notifier, completion_notice, failure_notice};
use crate::core::rate::{PushRecord, RateSnapshot, Target, target_date_for};
use crate::core::report::{
    BackfillReport, CombinedBackfillReport, DayPush, PushSummary, ReconcileReport, RejectedRow,
    SkipReason, StatusReport, TargetOutcome, TargetSync,
};
use crate::core::source::RateSource;
use crate::core::store::RateStore;
use crate::core::translator::CurrencyTranslator;
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Largest accepted look-back for backfills and single-day pushes.
pub const MAX_DAYS_BACK: i64 = 365;

/// Rejects a look-back outside `[0, MAX_DAYS_BACK]` instead of clamping it.
pub fn validate_days_back(days_back: i64) -> Result<u32> {
    if !(0..=MAX_DAYS_BACK).contains(&days_back) {
        return Err(SyncError::InvalidDaysBack {
            value: days_back,
            max: MAX_DAYS_BACK,
        });
    }
    Ok(days_back as u32)
}

enum Claim {
    Held(Box<dyn DayLock>),
    Busy,
    Unreachable,
}

pub struct SyncEngine {
    store: Arc<dyn RateStore>,
    source: Arc<dyn RateSource>,
    ledger: Arc<dyn Downstream>,
    midrange: Arc<dyn Downstream>,
    notifier: Arc<dyn Notifier>,
    translator: CurrencyTranslator,
    per_hundred: Vec<String>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn RateStore>,
        source: Arc<dyn RateSource>,
        ledger: Arc<dyn Downstream>,
        midrange: Arc<dyn Downstream>,
        notifier: Arc<dyn Notifier>,
        translator: CurrencyTranslator,
    ) -> Self {
        Self {
            store,
            source,
            ledger,
            midrange,
            notifier,
            translator,
            per_hundred: vec!["YENS(100)".to_string()],
        }
    }

    /// Display names whose quotes are published per 100 units.
    pub fn with_per_hundred(mut self, names: Vec<String>) -> Self {
        self.per_hundred = names;
        self
    }

    fn downstream(&self, target: Target) -> &dyn Downstream {
        match target {
            Target::Ledger => self.ledger.as_ref(),
            Target::Midrange => self.midrange.as_ref(),
        }
    }

    /// Fetches the current table from the source, normalizes it and appends it
    /// to the store. Every row of the batch carries `now` as capture time.
    #[instrument(skip(self))]
    pub async fn scrape(&self, now: NaiveDateTime) -> Result<Vec<RateSnapshot>> {
        let rows = self.source.fetch_rates().await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.currency = row.currency.trim().to_string();
            if row.currency.is_empty() || row.currency.eq_ignore_ascii_case("Currency") {
                continue;
            }

            let per_hundred = self
                .per_hundred
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&row.currency));
            let row = if per_hundred {
                row.rescale_per_hundred()
            } else {
                row
            };

            let currency = row.currency.clone();
            match row.into_snapshot(now) {
                Some(snapshot) => snapshots.push(snapshot),
                None => warn!("Skipping {} - missing rate values", currency),
            }
        }

        if snapshots.is_empty() {
            error!("No rates extracted! Source layout may have changed");
            return Ok(snapshots);
        }

        self.store.save(&snapshots).await?;
        info!("Successfully scraped {} currencies", snapshots.len());
        Ok(snapshots)
    }

    /// Translates and derives the push rows for one target. Currencies the
    /// target has no code for are dropped without being reported.
    pub fn build_records(
        &self,
        target: Target,
        snapshots: &[RateSnapshot],
        source_date: NaiveDate,
    ) -> (Vec<PushRecord>, Vec<RejectedRow>) {
        let target_date = target_date_for(source_date);
        let mut records = Vec::new();
        let mut rejected = Vec::new();

        for snapshot in snapshots {
            let Some(code) = self.translator.translate(&snapshot.currency, target) else {
                debug!("No {} code for {}, dropping", target, snapshot.currency);
                continue;
            };

            match snapshot.derive_rate() {
                Ok(rate) => records.push(PushRecord {
                    currency: snapshot.currency.clone(),
                    currency_code: code.to_string(),
                    rate,
                    source_date,
                    target_date,
                }),
                Err(e) => {
                    warn!("Skipping {}: {}", snapshot.currency, e);
                    rejected.push(RejectedRow {
                        currency: snapshot.currency.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        (records, rejected)
    }

    /// Pushes `snapshots` captured on `source_date` into `target`, filed under
    /// the following day.
    ///
    /// No existence check happens here: calling this twice for the same day
    /// inserts the rows twice. Callers check first.
    #[instrument(skip_all, fields(%target, %source_date))]
    pub async fn push_to_system(
        &self,
        target: Target,
        snapshots: &[RateSnapshot],
        source_date: NaiveDate,
    ) -> PushSummary {
        let (records, mut rejected) = self.build_records(target, snapshots, source_date);
        let mut summary = PushSummary {
            target,
            source_date,
            target_date: target_date_for(source_date),
            pushed: Vec::new(),
            rejected: Vec::new(),
        };

        if records.is_empty() {
            summary.rejected = rejected;
            return summary;
        }

        match self.downstream(target).insert(&records).await {
            Ok(results) => {
                for (record, result) in records.into_iter().zip(results) {
                    match result {
                        Ok(()) => summary.pushed.push(record),
                        Err(e) => {
                            error!("Failed to insert currency {}: {}", record.currency, e);
                            rejected.push(RejectedRow {
                                currency: record.currency,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                error!("Aborting push to {}: {}", target, e);
                rejected.extend(records.into_iter().map(|record| RejectedRow {
                    currency: record.currency,
                    reason: e.to_string(),
                }));
            }
        }

        info!(
            "Finished inserting {} valid exchange rates into {}",
            summary.inserted(),
            target
        );
        summary.rejected = rejected;
        summary
    }

    /// One scheduled firing for `now`'s day: scrape when nothing is stored yet,
    /// otherwise bring each target up to date independently.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, now: NaiveDateTime) -> Result<ReconcileReport> {
        let today = now.date();

        if !self.store.exists_for_day(today).await? {
            info!("No rates found for today. Starting scheduled scrape at {}", now);
            let saved = self.scrape(now).await?;
            return Ok(ReconcileReport::Scraped { count: saved.len() });
        }

        info!("Exchange rates already scraped today");
        let mut targets = Vec::with_capacity(Target::ALL.len());
        for target in Target::ALL {
            let outcome = self.reconcile_target(target, now).await?;
            targets.push(TargetSync { target, outcome });
        }
        Ok(ReconcileReport::Synced { targets })
    }

    async fn reconcile_target(&self, target: Target, now: NaiveDateTime) -> Result<TargetOutcome> {
        let target_date = target_date_for(now.date());
        let lock = match self.claim(target, target_date).await {
            Claim::Held(lock) => lock,
            Claim::Busy => return Ok(TargetOutcome::InProgress),
            Claim::Unreachable => return Ok(TargetOutcome::Unreachable),
        };

        let outcome = self.sync_target(target, now).await;
        lock.release().await;
        outcome
    }

    async fn sync_target(&self, target: Target, now: NaiveDateTime) -> Result<TargetOutcome> {
        let today = now.date();
        if self.downstream(target).exists_for_date(target_date_for(today)).await {
            info!("Data already pushed to {}. No action needed.", target);
            return Ok(TargetOutcome::AlreadyPresent);
        }

        info!("Data not pushed to {} yet. Fetching from store and pushing now...", target);
        let snapshots = self.store.find_for_day(today).await?;
        let summary = self.push_to_system(target, &snapshots, today).await;
        if summary.inserted() == 0 {
            return Ok(TargetOutcome::NothingPushed);
        }

        self.send(completion_notice(&target.to_string(), &summary.pushed, now))
            .await;
        Ok(TargetOutcome::Pushed {
            inserted: summary.inserted(),
        })
    }

    /// Pushes the day `days_back` before `today`. Unless `force` is set, a day
    /// the target already has is left alone.
    #[instrument(skip(self))]
    pub async fn push_day(
        &self,
        target: Target,
        days_back: i64,
        today: NaiveDate,
        force: bool,
    ) -> Result<DayPush> {
        let days_back = validate_days_back(days_back)?;
        let source_date = today - Days::new(u64::from(days_back));
        let target_date = target_date_for(source_date);

        let lock = match self.claim(target, target_date).await {
            Claim::Held(lock) => lock,
            Claim::Busy => return Ok(DayPush::InProgress { target_date }),
            Claim::Unreachable => return Ok(DayPush::Unreachable { target_date }),
        };

        let result = self.push_claimed_day(target, source_date, force).await;
        lock.release().await;
        result
    }

    async fn push_claimed_day(
        &self,
        target: Target,
        source_date: NaiveDate,
        force: bool,
    ) -> Result<DayPush> {
        let target_date = target_date_for(source_date);
        if !force && self.downstream(target).exists_for_date(target_date).await {
            info!("{} already has data for {}", target, target_date);
            return Ok(DayPush::AlreadyPresent { target_date });
        }

        let snapshots = self.store.find_for_day(source_date).await?;
        if snapshots.is_empty() {
            warn!("No scraped data found for date: {}", source_date);
            return Ok(DayPush::NoData { source_date });
        }

        Ok(DayPush::Pushed(
            self.push_to_system(target, &snapshots, source_date).await,
        ))
    }

    pub async fn backfill(
        &self,
        target: Target,
        days_back: i64,
        today: NaiveDate,
    ) -> Result<BackfillReport> {
        self.backfill_with_progress(target, days_back, today, &|| ())
            .await
    }

    /// Walks `today`, `today - 1`, ... `today - days_back` and pushes every
    /// source day the target does not have yet. `on_day` runs once per day.
    #[instrument(skip(self, on_day))]
    pub async fn backfill_with_progress(
        &self,
        target: Target,
        days_back: i64,
        today: NaiveDate,
        on_day: &(dyn Fn() + Send + Sync),
    ) -> Result<BackfillReport> {
        let days_back = validate_days_back(days_back)?;
        let mut report = BackfillReport::new(target, days_back + 1);

        info!("Starting {} back days push for {} days", target, days_back);

        for i in 0..=days_back {
            let source_date = today - Days::new(u64::from(i));
            self.backfill_day(target, source_date, &mut report).await?;
            on_day();
        }

        info!(
            successful = report.successful_pushes,
            skipped = report.skipped_count,
            "{} back days push completed",
            target
        );
        Ok(report)
    }

    async fn backfill_day(
        &self,
        target: Target,
        source_date: NaiveDate,
        report: &mut BackfillReport,
    ) -> Result<()> {
        let target_date = target_date_for(source_date);

        let lock = match self.claim(target, target_date).await {
            Claim::Held(lock) => lock,
            Claim::Busy => {
                report.record_skipped(source_date, target_date, SkipReason::InProgress);
                return Ok(());
            }
            Claim::Unreachable => {
                report.record_skipped(source_date, target_date, SkipReason::Unreachable);
                return Ok(());
            }
        };

        let result = self.backfill_claimed_day(target, source_date, report).await;
        lock.release().await;
        result
    }

    async fn backfill_claimed_day(
        &self,
        target: Target,
        source_date: NaiveDate,
        report: &mut BackfillReport,
    ) -> Result<()> {
        let target_date = target_date_for(source_date);
        if self.downstream(target).exists_for_date(target_date).await {
            info!("{} already has data for target date: {}, skipping", target, target_date);
            report.record_skipped(source_date, target_date, SkipReason::AlreadyPresent);
            return Ok(());
        }

        let snapshots = self.store.find_for_day(source_date).await?;
        if snapshots.is_empty() {
            warn!("No scraped data found for date: {}, skipping", source_date);
            report.record_skipped(source_date, target_date, SkipReason::NoSourceData);
            return Ok(());
        }

        let summary = self.push_to_system(target, &snapshots, source_date).await;
        if summary.inserted() > 0 {
            info!(
                "Successfully pushed {} rates to {} for target date: {}",
                summary.inserted(),
                target,
                target_date
            );
            report.record_processed(source_date, target_date, summary.inserted());
        }
        Ok(())
    }

    /// Backfills both targets. Each report depends only on its own target.
    pub async fn backfill_both(
        &self,
        days_back: i64,
        today: NaiveDate,
    ) -> Result<CombinedBackfillReport> {
        let total = validate_days_back(days_back)? + 1;
        info!("Starting back days push to both systems for {} days", days_back);

        let ledger = self.backfill(Target::Ledger, days_back, today).await?;
        let midrange = self.backfill(Target::Midrange, days_back, today).await?;

        Ok(CombinedBackfillReport {
            ledger,
            midrange,
            total_days_processed: total,
        })
    }

    pub async fn check_status(&self, target: Target, today: NaiveDate) -> StatusReport {
        let target_date = target_date_for(today);
        let has_data = self.downstream(target).exists_for_date(target_date).await;
        StatusReport::new(target, today, target_date, has_data)
    }

    /// Sends the failure notice when `target` has nothing for the next
    /// business day. Returns whether the alert went out.
    pub async fn alert_if_missing(&self, target: Target, today: NaiveDate) -> bool {
        let target_date = target_date_for(today);
        if self.downstream(target).exists_for_date(target_date).await {
            info!("Data already pushed to {}. No action needed.", target);
            return false;
        }

        warn!("{} still has no rates for {}", target, target_date);
        self.send(failure_notice(&target.to_string())).await;
        true
    }

    pub async fn send_test_notice(&self) {
        self.send(failure_notice("Test-System")).await;
    }

    pub async fn rates_for_day(&self, date: NaiveDate) -> Result<Vec<RateSnapshot>> {
        self.store.find_for_day(date).await
    }

    pub async fn all_rates(&self) -> Result<Vec<RateSnapshot>> {
        self.store.find_all().await
    }

    /// Claims `target_date` on `target` for a check-then-push sequence.
    async fn claim(&self, target: Target, target_date: NaiveDate) -> Claim {
        match self.downstream(target).lock_day(target_date).await {
            Ok(Some(lock)) => Claim::Held(lock),
            Ok(None) => {
                info!("A push to {} for {} is already running", target, target_date);
                Claim::Busy
            }
            Err(e) => {
                error!("Cannot claim {} on {}: {}", target_date, target, e);
                Claim::Unreachable
            }
        }
    }

    async fn send(&self, notice: Notice) {
        match self.notifier.notify(&notice).await {
            Ok(()) => info!("Notice sent: {}", notice.subject),
            Err(e) => warn!("Failed to send notice '{}': {:#}", notice.subject, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::RawRate;
    use crate::store::memory::MemoryRateStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Day claims shared by every engine writing to the same fake system.
    struct FakeLock {
        locked: Arc<Mutex<HashSet<NaiveDate>>>,
        date: NaiveDate,
    }

    #[async_trait]
    impl DayLock for FakeLock {
        async fn release(self: Box<Self>) {
            self.locked.lock().unwrap().remove(&self.date);
        }
    }

    #[derive(Default)]
    struct FakeDownstream {
        target: Option<Target>,
        rows: Mutex<Vec<PushRecord>>,
        locked: Arc<Mutex<HashSet<NaiveDate>>>,
        fail_lock: bool,
        fail_connect: bool,
        fail_exists: bool,
        reject_codes: Vec<String>,
        lock_calls: AtomicUsize,
        exists_calls: AtomicUsize,
        insert_calls: AtomicUsize,
    }

    impl FakeDownstream {
        fn new(target: Target) -> Self {
            Self {
                target: Some(target),
                ..Default::default()
            }
        }

        fn target(&self) -> Target {
            self.target.unwrap_or(Target::Ledger)
        }

        fn rows(&self) -> Vec<PushRecord> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Downstream for FakeDownstream {
        async fn lock_day(&self, date: NaiveDate) -> Result<Option<Box<dyn DayLock>>> {
            self.lock_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_lock {
                return Err(SyncError::DownstreamConnection {
                    target: self.target(),
                    message: "connection refused".to_string(),
                });
            }
            if !self.locked.lock().unwrap().insert(date) {
                return Ok(None);
            }
            Ok(Some(Box::new(FakeLock {
                locked: Arc::clone(&self.locked),
                date,
            })))
        }

        async fn exists_for_date(&self, date: NaiveDate) -> bool {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            // Lets an overlapping run reach its own claim in between.
            tokio::task::yield_now().await;
            if self.fail_exists {
                return false;
            }
            self.rows.lock().unwrap().iter().any(|r| r.target_date == date)
        }

        async fn insert(&self, records: &[PushRecord]) -> Result<Vec<Result<()>>> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(SyncError::DownstreamConnection {
                    target: self.target(),
                    message: "connection refused".to_string(),
                });
            }
            let mut rows = self.rows.lock().unwrap();
            Ok(records
                .iter()
                .map(|record| {
                    if self.reject_codes.contains(&record.currency_code) {
                        return Err(SyncError::RowInsert {
                            target: self.target(),
                            currency: record.currency.clone(),
                            message: "value too large".to_string(),
                        });
                    }
                    rows.push(record.clone());
                    Ok(())
                })
                .collect())
        }
    }

    struct StaticSource {
        rows: Vec<RawRate>,
        fail: bool,
    }

    #[async_trait]
    impl RateSource for StaticSource {
        async fn fetch_rates(&self) -> Result<Vec<RawRate>> {
            if self.fail {
                return Err(SyncError::SourceUnavailable("timed out".to_string()));
            }
            Ok(self.rows.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notice>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &Notice) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notice.clone());
            if self.fail {
                return Err(anyhow!("mail gateway down"));
            }
            Ok(())
        }
    }

    struct Harness {
        store: Arc<MemoryRateStore>,
        ledger: Arc<FakeDownstream>,
        midrange: Arc<FakeDownstream>,
        notifier: Arc<RecordingNotifier>,
        engine: SyncEngine,
    }

    fn raw(currency: &str, transfer_sell: &str, banknote_sell: &str) -> RawRate {
        RawRate {
            currency: currency.to_string(),
            transfer_buy: Some("1.0".to_string()),
            transfer_sell: Some(transfer_sell.to_string()),
            banknote_buy: Some("1.0".to_string()),
            banknote_sell: Some(banknote_sell.to_string()),
        }
    }

    fn default_rows() -> Vec<RawRate> {
        vec![
            raw("US DOLLAR", "47.53", "47.60"),
            raw("EURO", "0", "51.25"),
            raw("CHINESE YUAN", "6.55", "6.60"),
        ]
    }

    fn harness_with(
        ledger: FakeDownstream,
        midrange: FakeDownstream,
        source: StaticSource,
        notifier: RecordingNotifier,
    ) -> Harness {
        let store = Arc::new(MemoryRateStore::new());
        let ledger = Arc::new(ledger);
        let midrange = Arc::new(midrange);
        let notifier = Arc::new(notifier);
        let engine = SyncEngine::new(
            store.clone(),
            Arc::new(source),
            ledger.clone(),
            midrange.clone(),
            notifier.clone(),
            CurrencyTranslator::default(),
        );
        Harness {
            store,
            ledger,
            midrange,
            notifier,
            engine,
        }
    }

    fn harness() -> Harness {
        harness_with(
            FakeDownstream::new(Target::Ledger),
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: default_rows(),
                fail: false,
            },
            RecordingNotifier::default(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
        day.and_hms_opt(hour, 0, 0).unwrap()
    }

    async fn seed(h: &Harness, day: NaiveDate) {
        h.engine.scrape(at(day, 16)).await.unwrap();
    }

    #[tokio::test]
    async fn test_scrape_normalizes_and_stores() {
        let h = harness_with(
            FakeDownstream::new(Target::Ledger),
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: vec![
                    raw("Currency", "Sell", "Sell"),
                    raw("  US DOLLAR ", "47.53", "47.60"),
                    raw("YENS(100)", "31.65", "31.70"),
                    RawRate {
                        currency: "EURO".to_string(),
                        transfer_sell: None,
                        ..raw("EURO", "", "")
                    },
                    raw("", "1", "1"),
                ],
                fail: false,
            },
            RecordingNotifier::default(),
        );
        let now = at(date(2024, 3, 1), 16);

        let saved = h.engine.scrape(now).await.unwrap();

        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].currency, "US DOLLAR");
        assert_eq!(saved[1].transfer_sell, "0.316500");
        assert!(saved.iter().all(|s| s.scraped_at == now));
        assert_eq!(h.store.find_all().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_scrape_source_failure_writes_nothing() {
        let h = harness_with(
            FakeDownstream::new(Target::Ledger),
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: default_rows(),
                fail: true,
            },
            RecordingNotifier::default(),
        );

        let err = h.engine.scrape(at(date(2024, 3, 1), 16)).await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable(_)));
        assert!(h.store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_shifts_date_for_every_target() {
        let h = harness();
        let source_date = date(2024, 3, 1);
        seed(&h, source_date).await;
        let snapshots = h.store.find_for_day(source_date).await.unwrap();

        for target in Target::ALL {
            let summary = h.engine.push_to_system(target, &snapshots, source_date).await;
            assert_eq!(summary.target_date, date(2024, 3, 2));
            assert!(summary.pushed.iter().all(|r| r.target_date == date(2024, 3, 2)));
            assert!(summary.pushed.iter().all(|r| r.source_date == source_date));
        }
    }

    #[tokio::test]
    async fn test_push_derives_rates_and_drops_unknown_currencies() {
        let h = harness();
        let source_date = date(2024, 3, 1);
        seed(&h, source_date).await;
        let snapshots = h.store.find_for_day(source_date).await.unwrap();

        let summary = h
            .engine
            .push_to_system(Target::Midrange, &snapshots, source_date)
            .await;

        assert_eq!(summary.inserted(), 2);
        assert!(summary.rejected.is_empty());
        let rows = h.midrange.rows();
        assert_eq!(rows[0].currency_code, "US");
        assert_eq!(rows[0].rate, Decimal::from_str("47.53").unwrap());
        assert_eq!(rows[1].currency_code, "EU");
        assert_eq!(rows[1].rate, Decimal::from_str("51.25").unwrap());
        assert!(!rows.iter().any(|r| r.currency == "CHINESE YUAN"));
    }

    #[tokio::test]
    async fn test_push_records_invalid_quotes_and_row_failures() {
        let h = harness_with(
            FakeDownstream {
                reject_codes: vec!["EUR".to_string()],
                ..FakeDownstream::new(Target::Ledger)
            },
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: vec![
                    raw("US DOLLAR", "47.53", "47.60"),
                    raw("EURO", "51.20", "51.25"),
                    raw("SWISS FRANC", "0", "0"),
                    raw("SAUDI RIALS", "n/a", "12.6"),
                    raw("OMANI RIAL", "123.4", "123.9"),
                ],
                fail: false,
            },
            RecordingNotifier::default(),
        );
        let source_date = date(2024, 3, 1);
        seed(&h, source_date).await;
        let snapshots = h.store.find_for_day(source_date).await.unwrap();

        let summary = h
            .engine
            .push_to_system(Target::Ledger, &snapshots, source_date)
            .await;

        assert_eq!(summary.inserted(), 2);
        let rejected: Vec<_> = summary.rejected.iter().map(|r| r.currency.as_str()).collect();
        assert_eq!(rejected, vec!["SWISS FRANC", "SAUDI RIALS", "EURO"]);
        assert_eq!(
            h.ledger
                .rows()
                .iter()
                .map(|r| r.currency_code.as_str())
                .collect::<Vec<_>>(),
            vec!["USD", "OMR"]
        );
    }

    #[tokio::test]
    async fn test_push_connection_failure_inserts_nothing() {
        let h = harness_with(
            FakeDownstream {
                fail_connect: true,
                ..FakeDownstream::new(Target::Ledger)
            },
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: default_rows(),
                fail: false,
            },
            RecordingNotifier::default(),
        );
        let source_date = date(2024, 3, 1);
        seed(&h, source_date).await;
        let snapshots = h.store.find_for_day(source_date).await.unwrap();

        let summary = h
            .engine
            .push_to_system(Target::Ledger, &snapshots, source_date)
            .await;

        assert_eq!(summary.inserted(), 0);
        assert_eq!(summary.rejected.len(), 2);
        assert!(summary.rejected[0].reason.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_reconcile_scrapes_when_today_is_empty() {
        let h = harness();
        let now = at(date(2024, 3, 1), 16);

        let report = h.engine.reconcile(now).await.unwrap();

        assert_eq!(report, ReconcileReport::Scraped { count: 3 });
        assert_eq!(h.ledger.insert_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.midrange.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reconcile_pushes_each_target_once() {
        let h = harness();
        let now = at(date(2024, 3, 1), 16);
        seed(&h, now.date()).await;

        let first = h.engine.reconcile(now).await.unwrap();
        assert_eq!(
            first,
            ReconcileReport::Synced {
                targets: vec![
                    TargetSync {
                        target: Target::Ledger,
                        outcome: TargetOutcome::Pushed { inserted: 2 },
                    },
                    TargetSync {
                        target: Target::Midrange,
                        outcome: TargetOutcome::Pushed { inserted: 2 },
                    },
                ]
            }
        );

        let sent = h.notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Exchange Rate Push to Ledger Completed");
        assert_eq!(sent[1].subject, "Exchange Rate Push to Midrange Completed");

        let second = h.engine.reconcile(now).await.unwrap();
        assert_eq!(
            second,
            ReconcileReport::Synced {
                targets: vec![
                    TargetSync {
                        target: Target::Ledger,
                        outcome: TargetOutcome::AlreadyPresent,
                    },
                    TargetSync {
                        target: Target::Midrange,
                        outcome: TargetOutcome::AlreadyPresent,
                    },
                ]
            }
        );
        assert_eq!(h.ledger.rows().len(), 2);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_failure_on_one_target_does_not_block_other() {
        let h = harness_with(
            FakeDownstream {
                fail_connect: true,
                fail_exists: true,
                ..FakeDownstream::new(Target::Ledger)
            },
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: default_rows(),
                fail: false,
            },
            RecordingNotifier {
                fail: true,
                ..Default::default()
            },
        );
        let now = at(date(2024, 3, 1), 16);
        seed(&h, now.date()).await;

        let report = h.engine.reconcile(now).await.unwrap();

        let ReconcileReport::Synced { targets } = report else {
            panic!("Expected a synced report");
        };
        assert_eq!(targets[0].outcome, TargetOutcome::NothingPushed);
        assert_eq!(targets[1].outcome, TargetOutcome::Pushed { inserted: 2 });
        // A failing mail gateway is logged, not escalated.
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backfill_rejects_out_of_range_days_before_any_call() {
        let h = harness();
        let today = date(2024, 3, 10);

        for days_back in [-1, 366] {
            let err = h.engine.backfill(Target::Ledger, days_back, today).await.unwrap_err();
            assert!(matches!(err, SyncError::InvalidDaysBack { .. }));

            let err = h.engine.backfill_both(days_back, today).await.unwrap_err();
            assert!(matches!(err, SyncError::InvalidDaysBack { .. }));
        }

        assert_eq!(h.ledger.lock_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.ledger.exists_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.midrange.exists_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backfill_zero_days_processes_only_today() {
        let h = harness();
        let today = date(2024, 3, 10);
        seed(&h, today).await;
        seed(&h, date(2024, 3, 9)).await;

        let report = h.engine.backfill(Target::Ledger, 0, today).await.unwrap();

        assert_eq!(report.total_days_processed, 1);
        assert_eq!(report.successful_pushes, 1);
        assert_eq!(report.processed[0].target_date, date(2024, 3, 11));
        assert_eq!(h.ledger.exists_calls.load(Ordering::SeqCst), 1);
        assert!(h.ledger.rows().iter().all(|r| r.source_date == today));
    }

    #[tokio::test]
    async fn test_backfill_skips_missing_days_and_is_idempotent() {
        let h = harness();
        let today = date(2024, 3, 10);
        seed(&h, today).await;
        seed(&h, date(2024, 3, 8)).await;

        let first = h.engine.backfill(Target::Midrange, 3, today).await.unwrap();

        assert_eq!(first.total_days_processed, 4);
        assert_eq!(first.successful_pushes, 2);
        assert_eq!(first.total_inserted(), 4);
        let no_data: Vec<_> = first
            .skipped_for(SkipReason::NoSourceData)
            .map(|s| s.source_date)
            .collect();
        assert_eq!(no_data, vec![date(2024, 3, 9), date(2024, 3, 7)]);

        let second = h.engine.backfill(Target::Midrange, 3, today).await.unwrap();

        assert_eq!(second.successful_pushes, 0);
        assert_eq!(second.total_inserted(), 0);
        let present: Vec<_> = second
            .skipped_for(SkipReason::AlreadyPresent)
            .map(|s| s.target_date)
            .collect();
        assert_eq!(present, vec![date(2024, 3, 11), date(2024, 3, 9)]);
        assert_eq!(h.midrange.rows().len(), 4);
    }

    #[tokio::test]
    async fn test_backfill_with_no_valid_rows_is_not_a_success() {
        let h = harness_with(
            FakeDownstream::new(Target::Ledger),
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: vec![raw("US DOLLAR", "0", "0"), raw("CHINESE YUAN", "1", "1")],
                fail: false,
            },
            RecordingNotifier::default(),
        );
        let today = date(2024, 3, 10);
        seed(&h, today).await;

        let report = h.engine.backfill(Target::Ledger, 0, today).await.unwrap();

        assert_eq!(report.successful_pushes, 0);
        assert_eq!(report.skipped_count, 0);
        assert!(report.processed.is_empty());
    }

    #[tokio::test]
    async fn test_backfill_both_targets_are_independent() {
        let today = date(2024, 3, 10);

        let baseline = harness();
        seed(&baseline, today).await;
        seed(&baseline, date(2024, 3, 9)).await;
        let expected = baseline.engine.backfill_both(2, today).await.unwrap();

        let h = harness_with(
            FakeDownstream {
                fail_exists: true,
                fail_connect: true,
                ..FakeDownstream::new(Target::Ledger)
            },
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: default_rows(),
                fail: false,
            },
            RecordingNotifier::default(),
        );
        seed(&h, today).await;
        seed(&h, date(2024, 3, 9)).await;

        let combined = h.engine.backfill_both(2, today).await.unwrap();

        assert_eq!(combined.total_days_processed, 3);
        assert_eq!(combined.ledger.successful_pushes, 0);
        assert_eq!(combined.midrange, expected.midrange);
        assert_eq!(combined.midrange.successful_pushes, 2);
    }

    #[tokio::test]
    async fn test_backfill_reports_progress_per_day() {
        let h = harness();
        let today = date(2024, 3, 10);
        let ticks = AtomicUsize::new(0);

        h.engine
            .backfill_with_progress(Target::Ledger, 4, today, &|| {
                ticks.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(ticks.load(Ordering::SeqCst), 5);
    }

    /// A second engine over the same store and downstream systems, as a
    /// separate process would build it.
    fn engine_over(h: &Harness) -> SyncEngine {
        SyncEngine::new(
            h.store.clone(),
            Arc::new(StaticSource {
                rows: default_rows(),
                fail: false,
            }),
            h.ledger.clone(),
            h.midrange.clone(),
            h.notifier.clone(),
            CurrencyTranslator::default(),
        )
    }

    #[tokio::test]
    async fn test_claimed_day_is_skipped_as_in_progress() {
        let h = harness();
        let today = date(2024, 3, 10);
        let target_date = date(2024, 3, 11);
        seed(&h, today).await;

        let held = h.ledger.lock_day(target_date).await.unwrap().unwrap();

        let report = h.engine.backfill(Target::Ledger, 0, today).await.unwrap();
        assert_eq!(report.skipped_for(SkipReason::InProgress).count(), 1);
        let day = h.engine.push_day(Target::Ledger, 0, today, true).await.unwrap();
        assert_eq!(day, DayPush::InProgress { target_date });
        let ReconcileReport::Synced { targets } = h.engine.reconcile(at(today, 17)).await.unwrap()
        else {
            panic!("Expected a synced report");
        };
        assert_eq!(targets[0].outcome, TargetOutcome::InProgress);
        assert_eq!(targets[1].outcome, TargetOutcome::Pushed { inserted: 2 });
        assert!(h.ledger.rows().is_empty());

        held.release().await;
        let day = h.engine.push_day(Target::Ledger, 0, today, false).await.unwrap();
        assert!(matches!(day, DayPush::Pushed(ref summary) if summary.inserted() == 2));
    }

    #[tokio::test]
    async fn test_overlapping_engines_file_the_day_once() {
        let h = harness();
        let today = date(2024, 3, 10);
        let target_date = date(2024, 3, 11);
        seed(&h, today).await;
        let manual = engine_over(&h);

        let (scheduled, on_demand) = tokio::join!(
            h.engine.backfill(Target::Ledger, 0, today),
            manual.push_day(Target::Ledger, 0, today, false),
        );
        let scheduled = scheduled.unwrap();
        let on_demand = on_demand.unwrap();

        // One batch: US DOLLAR and EURO.
        assert_eq!(h.ledger.rows().len(), 2);
        assert_eq!(h.ledger.insert_calls.load(Ordering::SeqCst), 1);
        let waited = scheduled.skipped_for(SkipReason::InProgress).count()
            + usize::from(on_demand == DayPush::InProgress { target_date });
        assert_eq!(waited, 1);
        assert!(h.ledger.locked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_lock_skips_only_that_system() {
        let h = harness_with(
            FakeDownstream {
                fail_lock: true,
                ..FakeDownstream::new(Target::Ledger)
            },
            FakeDownstream::new(Target::Midrange),
            StaticSource {
                rows: default_rows(),
                fail: false,
            },
            RecordingNotifier::default(),
        );
        let today = date(2024, 3, 10);
        seed(&h, today).await;

        let combined = h.engine.backfill_both(0, today).await.unwrap();
        assert_eq!(combined.ledger.skipped_for(SkipReason::Unreachable).count(), 1);
        assert_eq!(combined.midrange.successful_pushes, 1);

        let day = h.engine.push_day(Target::Ledger, 0, today, true).await.unwrap();
        assert_eq!(
            day,
            DayPush::Unreachable {
                target_date: date(2024, 3, 11)
            }
        );
        assert_eq!(h.ledger.exists_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.ledger.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_day() {
        let h = harness();
        let today = date(2024, 3, 10);
        seed(&h, date(2024, 3, 8)).await;

        let empty = h.engine.push_day(Target::Ledger, 0, today, false).await.unwrap();
        assert_eq!(
            empty,
            DayPush::NoData {
                source_date: today
            }
        );

        let pushed = h.engine.push_day(Target::Ledger, 2, today, false).await.unwrap();
        let DayPush::Pushed(summary) = pushed else {
            panic!("Expected a push");
        };
        assert_eq!(summary.target_date, date(2024, 3, 9));
        assert_eq!(summary.inserted(), 2);

        let again = h.engine.push_day(Target::Ledger, 2, today, false).await.unwrap();
        assert_eq!(
            again,
            DayPush::AlreadyPresent {
                target_date: date(2024, 3, 9)
            }
        );

        let forced = h.engine.push_day(Target::Ledger, 2, today, true).await.unwrap();
        assert!(matches!(forced, DayPush::Pushed(_)));
        assert_eq!(h.ledger.rows().len(), 4);

        assert!(h.engine.push_day(Target::Ledger, 400, today, false).await.is_err());
    }

    #[tokio::test]
    async fn test_status_and_alert() {
        let h = harness();
        let today = date(2024, 3, 10);

        let status = h.engine.check_status(Target::Ledger, today).await;
        assert!(!status.has_data);
        assert_eq!(status.target_date, date(2024, 3, 11));
        assert_eq!(status.status, "No data pushed yet");

        assert!(h.engine.alert_if_missing(Target::Ledger, today).await);
        assert_eq!(
            h.notifier.sent.lock().unwrap()[0].subject,
            "Exchange Rate Not Pushed to Ledger Please Contact IT"
        );

        seed(&h, today).await;
        h.engine.backfill(Target::Ledger, 0, today).await.unwrap();

        assert!(h.engine.check_status(Target::Ledger, today).await.has_data);
        assert!(!h.engine.alert_if_missing(Target::Ledger, today).await);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_test_notice() {
        let h = harness();
        h.engine.send_test_notice().await;
        assert_eq!(
            h.notifier.sent.lock().unwrap()[0].subject,
            "Exchange Rate Not Pushed to Test-System Please Contact IT"
        );
    }
}
