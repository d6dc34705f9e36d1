//! Domain model and the sync engine, independent of any concrete source,
//! store or downstream system.

pub mod config;
pub mod downstream;
pub mod engine;
pub mod error;
pub mod log;
pub mod notify;
pub mod rate;
pub mod report;
pub mod source;
pub mod store;
pub mod translator;

// Re-export main types for cleaner imports
pub use downstream::{DayLock, Downstream};
pub use engine::SyncEngine;
pub use error::SyncError;
pub use notify::{Notice, Notifier};
pub use rate::{PushRecord, RateSnapshot, RawRate, Target};
pub use source::RateSource;
pub use store::RateStore;
pub use translator::CurrencyTranslator;
