use crate::core::error::Result;
use crate::core::rate::RateSnapshot;
use crate::core::store::RateStore;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "rates";
// Fixed width, so byte order of keys is capture order.
const KEY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

fn time_key(at: NaiveDateTime) -> String {
    at.format(KEY_TIME_FORMAT).to_string()
}

/// Snapshot key: capture time, then the time-ordered snapshot id so rows of
/// one batch keep their order and never collide.
fn snapshot_key(snapshot: &RateSnapshot) -> String {
    format!("{}#{}", time_key(snapshot.scraped_at), snapshot.id)
}

/// Persistent rate store on a fjall keyspace. Rows are only ever inserted.
pub struct DiskRateStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskRateStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            crate::core::error::SyncError::Store(format!(
                "Failed to create {}: {e}",
                path.display()
            ))
        })?;

        let keyspace = Config::new(path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened rate store at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn decode(value: &[u8]) -> Result<RateSnapshot> {
        Ok(serde_json::from_slice(value)?)
    }
}

#[async_trait]
impl RateStore for DiskRateStore {
    async fn save(&self, snapshots: &[RateSnapshot]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for snapshot in snapshots {
            batch.insert(
                &self.partition,
                snapshot_key(snapshot).as_bytes(),
                serde_json::to_vec(snapshot)?,
            );
        }
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Stored {} snapshots", snapshots.len());
        Ok(())
    }

    async fn exists_in_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<bool> {
        let first = self
            .partition
            .range(time_key(start)..time_key(end))
            .next()
            .transpose()?;
        Ok(first.is_some())
    }

    async fn find_in_window(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<RateSnapshot>> {
        self.partition
            .range(time_key(start)..time_key(end))
            .map(|item| {
                let (_, value) = item?;
                Self::decode(&value)
            })
            .collect()
    }

    async fn find_all(&self) -> Result<Vec<RateSnapshot>> {
        self.partition
            .iter()
            .map(|item| {
                let (_, value) = item?;
                Self::decode(&value)
            })
            .collect()
    }
}
