//! Structured results handed back to the trigger surface.

use crate::core::rate::{PushRecord, Target};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyPresent,
    NoSourceData,
    InProgress,
    Unreachable,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::AlreadyPresent => "already present",
            SkipReason::NoSourceData => "no data",
            SkipReason::InProgress => "push in progress",
            SkipReason::Unreachable => "system unreachable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDay {
    pub source_date: NaiveDate,
    pub target_date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedDay {
    pub source_date: NaiveDate,
    pub target_date: NaiveDate,
    pub inserted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub target: Target,
    pub total_days_processed: u32,
    pub successful_pushes: usize,
    pub skipped_count: usize,
    pub processed: Vec<ProcessedDay>,
    pub skipped: Vec<SkippedDay>,
}

impl BackfillReport {
    pub fn new(target: Target, total_days_processed: u32) -> Self {
        Self {
            target,
            total_days_processed,
            successful_pushes: 0,
            skipped_count: 0,
            processed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record_processed(
        &mut self,
        source_date: NaiveDate,
        target_date: NaiveDate,
        inserted: usize,
    ) {
        self.successful_pushes += 1;
        self.processed.push(ProcessedDay {
            source_date,
            target_date,
            inserted,
        });
    }

    pub fn record_skipped(
        &mut self,
        source_date: NaiveDate,
        target_date: NaiveDate,
        reason: SkipReason,
    ) {
        self.skipped_count += 1;
        self.skipped.push(SkippedDay {
            source_date,
            target_date,
            reason,
        });
    }

    pub fn skipped_for(&self, reason: SkipReason) -> impl Iterator<Item = &SkippedDay> {
        self.skipped.iter().filter(move |s| s.reason == reason)
    }

    pub fn total_inserted(&self) -> usize {
        self.processed.iter().map(|p| p.inserted).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedBackfillReport {
    pub ledger: BackfillReport,
    pub midrange: BackfillReport,
    pub total_days_processed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub currency: String,
    pub reason: String,
}

/// Outcome of pushing one source day into one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushSummary {
    pub target: Target,
    pub source_date: NaiveDate,
    pub target_date: NaiveDate,
    pub pushed: Vec<PushRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl PushSummary {
    pub fn inserted(&self) -> usize {
        self.pushed.len()
    }
}

/// Result of a manual single-day push.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DayPush {
    NoData { source_date: NaiveDate },
    AlreadyPresent { target_date: NaiveDate },
    InProgress { target_date: NaiveDate },
    Unreachable { target_date: NaiveDate },
    Pushed(PushSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub target: Target,
    pub date: NaiveDate,
    pub target_date: NaiveDate,
    pub has_data: bool,
    pub status: String,
}

impl StatusReport {
    pub fn new(target: Target, date: NaiveDate, target_date: NaiveDate, has_data: bool) -> Self {
        let status = if has_data {
            "Data already pushed"
        } else {
            "No data pushed yet"
        };
        Self {
            target,
            date,
            target_date,
            has_data,
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    AlreadyPresent,
    Pushed { inserted: usize },
    NothingPushed,
    InProgress,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSync {
    pub target: Target,
    pub outcome: TargetOutcome,
}

/// Result of one scheduled reconciliation firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileReport {
    /// Nothing was stored for today yet; a scrape ran instead of a push.
    Scraped { count: usize },
    Synced { targets: Vec<TargetSync> },
}
