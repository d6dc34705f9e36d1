//! Downstream system abstractions

use crate::core::error::Result;
use crate::core::rate::PushRecord;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Claim on one target date, visible to every process writing to the same
/// system. Held from the existence check through the insert.
#[async_trait]
pub trait DayLock: Send {
    async fn release(self: Box<Self>);
}

/// One downstream system receiving pushed rates.
///
/// Implementations open their connection per call and release it before
/// returning, on success and failure alike.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Claims `date` for a check-then-push sequence. `Ok(None)` means another
    /// run holds it; an error means the system could not be reached.
    async fn lock_day(&self, date: NaiveDate) -> Result<Option<Box<dyn DayLock>>>;

    /// Whether any row is already filed under `date`. Fails closed: an
    /// unreachable system reports `false` and logs the cause.
    async fn exists_for_date(&self, date: NaiveDate) -> bool;

    /// Inserts `records` over a single connection.
    ///
    /// The outer error means the connection could not be established and
    /// nothing was written. Otherwise there is one result per record, in
    /// order; a failed row does not stop the rows after it.
    async fn insert(&self, records: &[PushRecord]) -> Result<Vec<Result<()>>>;
}
