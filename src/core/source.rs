//! Rate source abstractions

use crate::core::error::Result;
use crate::core::rate::RawRate;
use async_trait::async_trait;

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Current rate table, one row per currency, in publication order.
    async fn fetch_rates(&self) -> Result<Vec<RawRate>>;
}
