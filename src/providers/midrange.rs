use crate::core::config::MidrangeConfig;
use crate::core::downstream::{DayLock, Downstream};
use crate::core::error::{Result, SyncError};
use crate::core::rate::{PushRecord, Target};
use crate::providers::sql::{advisory_key, connect, release, try_advisory_lock};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::{debug, error, instrument};

const EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM account.exrate WHERE exyy = $1 AND exmm = $2 AND exdd = $3";

const LOCK_NAMESPACE: i32 = 0x4D52;

const INSERT_SQL: &str =
    "INSERT INTO account.exrate (exyy, exmm, exdd, excur, examt) VALUES ($1, $2, $3, $4, $5)";

/// The exchange-rate table keys rows on separate year, month and day columns.
pub fn date_parts(date: NaiveDate) -> (i32, i32, i32) {
    (date.year(), date.month() as i32, date.day() as i32)
}

/// Midrange accounting exchange-rate table.
pub struct MidrangeDownstream {
    config: MidrangeConfig,
}

impl MidrangeDownstream {
    pub fn new(config: MidrangeConfig) -> Self {
        MidrangeDownstream { config }
    }

    async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let (year, month, day) = date_parts(date);
        let mut conn = connect(Target::Midrange, &self.config.database_url).await?;
        let count = sqlx::query_scalar::<_, i64>(EXISTS_SQL)
            .bind(year)
            .bind(month)
            .bind(day)
            .fetch_one(&mut conn)
            .await;
        release(Target::Midrange, conn).await;

        count.map_err(|e| SyncError::DownstreamConnection {
            target: Target::Midrange,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Downstream for MidrangeDownstream {
    async fn lock_day(&self, date: NaiveDate) -> Result<Option<Box<dyn DayLock>>> {
        let key = advisory_key(LOCK_NAMESPACE, date);
        let lock = try_advisory_lock(Target::Midrange, &self.config.database_url, key).await?;
        Ok(lock.map(|lock| Box::new(lock) as Box<dyn DayLock>))
    }

    #[instrument(name = "MidrangeExists", skip(self))]
    async fn exists_for_date(&self, date: NaiveDate) -> bool {
        match self.count_for_date(date).await {
            Ok(count) => count > 0,
            Err(e) => {
                error!("Error checking midrange data for date {}: {}", date, e);
                false
            }
        }
    }

    #[instrument(name = "MidrangeInsert", skip_all, fields(rows = records.len()))]
    async fn insert(&self, records: &[PushRecord]) -> Result<Vec<Result<()>>> {
        let mut conn = connect(Target::Midrange, &self.config.database_url).await?;

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let (year, month, day) = date_parts(record.target_date);
            debug!(
                "MIDRANGE INSERT: EXCUR={}, EXAMT={}, Date={:02}-{:02}-{}",
                record.currency_code, record.rate, day, month, year
            );
            let outcome = sqlx::query(INSERT_SQL)
                .bind(year)
                .bind(month)
                .bind(day)
                .bind(&record.currency_code)
                .bind(record.rate)
                .execute(&mut conn)
                .await;

            results.push(outcome.map(|_| ()).map_err(|e| SyncError::RowInsert {
                target: Target::Midrange,
                currency: record.currency.clone(),
                message: e.to_string(),
            }));
        }

        release(Target::Midrange, conn).await;
        Ok(results)
    }
}
