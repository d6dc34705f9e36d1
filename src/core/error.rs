//! Failure taxonomy of the sync engine.
//!
//! Per-row and per-target failures are recovered inside the engine (logged and
//! skipped). Only [`SyncError::SourceUnavailable`], [`SyncError::Store`] and
//! [`SyncError::InvalidDaysBack`] ever reach the trigger surface.

use crate::core::rate::Target;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Rate source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Rate store failure: {0}")]
    Store(String),

    #[error("Invalid quote for {currency}: {reason}")]
    InvalidQuote { currency: String, reason: String },

    #[error("Cannot connect to {target}: {message}")]
    DownstreamConnection { target: Target, message: String },

    #[error("{target} rejected {currency}: {message}")]
    RowInsert {
        target: Target,
        currency: String,
        message: String,
    },

    #[error("daysBack must be between 0 and {max}, got {value}")]
    InvalidDaysBack { value: i64, max: i64 },
}

impl From<fjall::Error> for SyncError {
    fn from(e: fjall::Error) -> Self {
        SyncError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Store(format!("Snapshot encoding failed: {e}"))
    }
}
