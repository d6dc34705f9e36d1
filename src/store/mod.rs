pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::RateStore;
use anyhow::{Context, Result};
use disk::DiskRateStore;
use memory::MemoryRateStore;
use std::sync::Arc;
use tracing::warn;

/// Opens the store selected by `storage.persist`: the fjall keyspace under
/// the data directory, or an in-memory store for throwaway runs.
pub fn open_rate_store(config: &AppConfig) -> Result<Arc<dyn RateStore>> {
    if !config.storage.persist {
        warn!("Storage is not persistent; scraped rates are lost on exit");
        return Ok(Arc::new(MemoryRateStore::new()));
    }

    let path = config.default_data_path()?.join("rates");
    let store = DiskRateStore::open(&path)
        .with_context(|| format!("Failed to open rate store at {}", path.display()))?;
    Ok(Arc::new(store))
}
