use crate::core::error::Result;
use crate::core::rate::RateSnapshot;
use crate::core::store::RateStore;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory rate store; contents live as long as the process.
#[derive(Clone, Default)]
pub struct MemoryRateStore {
    inner: Arc<Mutex<Vec<RateSnapshot>>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_capture_order(mut snapshots: Vec<RateSnapshot>) -> Vec<RateSnapshot> {
    // Stable, so rows of one batch keep their save order.
    snapshots.sort_by_key(|s| s.scraped_at);
    snapshots
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn save(&self, snapshots: &[RateSnapshot]) -> Result<()> {
        let mut rows = self.inner.lock().await;
        rows.extend_from_slice(snapshots);
        debug!("Stored {} snapshots in memory", snapshots.len());
        Ok(())
    }

    async fn exists_in_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<bool> {
        let rows = self.inner.lock().await;
        Ok(rows
            .iter()
            .any(|s| s.scraped_at >= start && s.scraped_at < end))
    }

    async fn find_in_window(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<RateSnapshot>> {
        let rows = self.inner.lock().await;
        Ok(in_capture_order(
            rows.iter()
                .filter(|s| s.scraped_at >= start && s.scraped_at < end)
                .cloned()
                .collect(),
        ))
    }

    async fn find_all(&self) -> Result<Vec<RateSnapshot>> {
        let rows = self.inner.lock().await;
        Ok(in_capture_order(rows.clone()))
    }
}
