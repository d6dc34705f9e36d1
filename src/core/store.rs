//! Rate store abstractions

use crate::core::error::Result;
use crate::core::rate::{RateSnapshot, day_window};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

/// Append-only history of captured snapshots.
///
/// Windows are half-open: `start <= scraped_at < end`. Results come back in
/// capture order.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn save(&self, snapshots: &[RateSnapshot]) -> Result<()>;
    async fn exists_in_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<bool>;
    async fn find_in_window(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<RateSnapshot>>;
    async fn find_all(&self) -> Result<Vec<RateSnapshot>>;

    async fn exists_for_day(&self, date: NaiveDate) -> Result<bool> {
        let (start, end) = day_window(date);
        self.exists_in_window(start, end).await
    }

    async fn find_for_day(&self, date: NaiveDate) -> Result<Vec<RateSnapshot>> {
        let (start, end) = day_window(date);
        self.find_in_window(start, end).await
    }
}
