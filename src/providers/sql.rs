//! Connection handling shared by the SQL-backed downstream systems.

use crate::core::downstream::DayLock;
use crate::core::error::SyncError;
use crate::core::rate::Target;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use sqlx::{Connection, PgConnection};
use tracing::{debug, warn};

/// Opens a dedicated connection for one logical operation.
pub async fn connect(target: Target, database_url: &str) -> Result<PgConnection, SyncError> {
    PgConnection::connect(database_url)
        .await
        .map_err(|e| SyncError::DownstreamConnection {
            target,
            message: e.to_string(),
        })
}

/// Closes the connection gracefully. Dropping it would also release the
/// socket, but without the terminate handshake.
pub async fn release(target: Target, conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!("Error closing {} connection: {}", target, e);
    }
}

/// Advisory-lock key for one date of one system: the namespace in the high
/// half, the day number in the low half.
pub fn advisory_key(namespace: i32, date: NaiveDate) -> i64 {
    (i64::from(namespace) << 32) | i64::from(date.num_days_from_ce())
}

/// Session-level advisory lock, held on its own connection.
pub struct AdvisoryLock {
    target: Target,
    conn: PgConnection,
    key: i64,
}

/// Takes the advisory lock `key` without waiting. `Ok(None)` when another
/// session holds it.
pub async fn try_advisory_lock(
    target: Target,
    database_url: &str,
    key: i64,
) -> Result<Option<AdvisoryLock>, SyncError> {
    let mut conn = connect(target, database_url).await?;
    let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
        .bind(key)
        .fetch_one(&mut conn)
        .await;

    match acquired {
        Ok(true) => {
            debug!(%target, key, "Advisory lock taken");
            Ok(Some(AdvisoryLock { target, conn, key }))
        }
        Ok(false) => {
            release(target, conn).await;
            Ok(None)
        }
        Err(e) => {
            release(target, conn).await;
            Err(SyncError::DownstreamConnection {
                target,
                message: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl DayLock for AdvisoryLock {
    async fn release(self: Box<Self>) {
        let AdvisoryLock {
            target,
            mut conn,
            key,
        } = *self;
        if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .execute(&mut conn)
            .await
        {
            // Closing the session drops the lock as well.
            warn!("Error unlocking {} key {}: {}", target, key, e);
        }
        release(target, conn).await;
    }
}
