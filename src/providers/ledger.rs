use crate::core::config::LedgerConfig;
use crate::core::downstream::{DayLock, Downstream};
use crate::core::error::{Result, SyncError};
use crate::core::rate::{PushRecord, Target};
use crate::providers::sql::{advisory_key, connect, release, try_advisory_lock};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, error, instrument};

// A date counts as pushed once rows sit either in the interface table or,
// after the ledger import ran, in the posted rates table. Posted rates are
// only ours when quoted against the functional currency.
const EXISTS_SQL: &str = "SELECT \
    (SELECT COUNT(*) FROM apps.gl_daily_rates_interface WHERE from_conversion_date = $1) + \
    (SELECT COUNT(*) FROM apps.gl_daily_rates WHERE conversion_date = $1 AND to_currency = $2)";

const LOCK_NAMESPACE: i32 = 0x4C47;

const INSERT_SQL: &str = "INSERT INTO apps.gl_daily_rates_interface \
    (from_currency, to_currency, from_conversion_date, to_conversion_date, \
     user_conversion_type, conversion_rate, user_id, mode_flag) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

/// Bind values of one interface-table row.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow<'a> {
    pub from_currency: &'a str,
    pub to_currency: &'a str,
    pub from_conversion_date: NaiveDate,
    pub to_conversion_date: NaiveDate,
    pub user_conversion_type: &'a str,
    pub conversion_rate: Decimal,
    pub user_id: i32,
    pub mode_flag: &'a str,
}

/// General-ledger daily rates interface.
pub struct LedgerDownstream {
    config: LedgerConfig,
}

impl LedgerDownstream {
    pub fn new(config: LedgerConfig) -> Self {
        LedgerDownstream { config }
    }

    /// Rates are quoted against the functional currency, one business day
    /// per row.
    pub fn row_for<'a>(&'a self, record: &'a PushRecord) -> LedgerRow<'a> {
        LedgerRow {
            from_currency: &record.currency_code,
            to_currency: &self.config.functional_currency,
            from_conversion_date: record.target_date,
            to_conversion_date: record.target_date,
            user_conversion_type: &self.config.conversion_type,
            conversion_rate: record.rate,
            user_id: self.config.user_id,
            mode_flag: &self.config.mode_flag,
        }
    }

    /// Binds of the existence check: the target date and the currency posted
    /// rates must be quoted against.
    pub fn exists_binds(&self, date: NaiveDate) -> (NaiveDate, &str) {
        (date, &self.config.functional_currency)
    }

    async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let (date, to_currency) = self.exists_binds(date);
        let mut conn = connect(Target::Ledger, &self.config.database_url).await?;
        let count = sqlx::query_scalar::<_, i64>(EXISTS_SQL)
            .bind(date)
            .bind(to_currency)
            .fetch_one(&mut conn)
            .await;
        release(Target::Ledger, conn).await;

        count.map_err(|e| SyncError::DownstreamConnection {
            target: Target::Ledger,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Downstream for LedgerDownstream {
    async fn lock_day(&self, date: NaiveDate) -> Result<Option<Box<dyn DayLock>>> {
        let key = advisory_key(LOCK_NAMESPACE, date);
        let lock = try_advisory_lock(Target::Ledger, &self.config.database_url, key).await?;
        Ok(lock.map(|lock| Box::new(lock) as Box<dyn DayLock>))
    }

    #[instrument(name = "LedgerExists", skip(self))]
    async fn exists_for_date(&self, date: NaiveDate) -> bool {
        match self.count_for_date(date).await {
            Ok(count) => count > 0,
            Err(e) => {
                error!("Error checking ledger data for date {}: {}", date, e);
                false
            }
        }
    }

    #[instrument(name = "LedgerInsert", skip_all, fields(rows = records.len()))]
    async fn insert(&self, records: &[PushRecord]) -> Result<Vec<Result<()>>> {
        let mut conn = connect(Target::Ledger, &self.config.database_url).await?;

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let row = self.row_for(record);
            debug!(
                "INSERTING: FROM_CURRENCY={}, CONVERSION_RATE={}",
                row.from_currency, row.conversion_rate
            );
            let outcome = sqlx::query(INSERT_SQL)
                .bind(row.from_currency)
                .bind(row.to_currency)
                .bind(row.from_conversion_date)
                .bind(row.to_conversion_date)
                .bind(row.user_conversion_type)
                .bind(row.conversion_rate)
                .bind(row.user_id)
                .bind(row.mode_flag)
                .execute(&mut conn)
                .await;

            results.push(outcome.map(|_| ()).map_err(|e| SyncError::RowInsert {
                target: Target::Ledger,
                currency: record.currency.clone(),
                message: e.to_string(),
            }));
        }

        release(Target::Ledger, conn).await;
        Ok(results)
    }
}
