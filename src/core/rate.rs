//! Rate rows, push records and the derivation rule that links them.

use crate::core::error::SyncError;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// Downstream system receiving pushed rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// General-ledger daily rates interface.
    Ledger,
    /// Midrange accounting exchange-rate table.
    Midrange,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Ledger, Target::Midrange];
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Target::Ledger => "Ledger",
                Target::Midrange => "Midrange",
            }
        )
    }
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ledger" => Ok(Target::Ledger),
            "midrange" => Ok(Target::Midrange),
            _ => Err(anyhow::anyhow!(
                "Invalid target: {} (expected ledger or midrange)",
                s
            )),
        }
    }
}

/// One row as delivered by the rate source, before it is stamped and stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRate {
    pub currency: String,
    #[serde(default)]
    pub transfer_buy: Option<String>,
    #[serde(default)]
    pub transfer_sell: Option<String>,
    #[serde(default)]
    pub banknote_buy: Option<String>,
    #[serde(default)]
    pub banknote_sell: Option<String>,
}

impl RawRate {
    /// Rescales a quote given per 100 units down to a per-unit quote.
    ///
    /// Quotes that do not parse are left untouched; the derivation step rejects
    /// them later.
    pub fn rescale_per_hundred(mut self) -> Self {
        let currency = self.currency.clone();
        for quote in [
            &mut self.transfer_buy,
            &mut self.transfer_sell,
            &mut self.banknote_buy,
            &mut self.banknote_sell,
        ] {
            if let Some(text) = quote.as_mut() {
                match parse_quote(text) {
                    Ok(value) => {
                        let per_unit = (value / Decimal::ONE_HUNDRED).round_dp(6);
                        *text = format!("{per_unit:.6}");
                    }
                    Err(e) => warn!("Invalid numeric format for {}: {}", currency, e),
                }
            }
        }
        self
    }

    /// Stamps the row with its capture time. Rows with a missing quote are
    /// not storable and yield `None`.
    pub fn into_snapshot(self, scraped_at: NaiveDateTime) -> Option<RateSnapshot> {
        Some(RateSnapshot {
            id: Uuid::now_v7(),
            currency: self.currency,
            transfer_buy: self.transfer_buy?,
            transfer_sell: self.transfer_sell?,
            banknote_buy: self.banknote_buy?,
            banknote_sell: self.banknote_sell?,
            scraped_at,
        })
    }
}

/// Immutable capture of one currency's quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub id: Uuid,
    pub currency: String,
    pub transfer_buy: String,
    pub transfer_sell: String,
    pub banknote_buy: String,
    pub banknote_sell: String,
    pub scraped_at: NaiveDateTime,
}

impl RateSnapshot {
    /// Sell-side conversion rate: the transfer quote, or the banknote quote
    /// when no transfer quote is published.
    pub fn derive_rate(&self) -> Result<Decimal, SyncError> {
        let invalid = |reason: String| SyncError::InvalidQuote {
            currency: self.currency.clone(),
            reason,
        };

        let transfer_sell =
            parse_quote(&self.transfer_sell).map_err(|e| invalid(format!("transfer sell {e}")))?;
        let banknote_sell =
            parse_quote(&self.banknote_sell).map_err(|e| invalid(format!("banknote sell {e}")))?;

        if transfer_sell.is_zero() && banknote_sell.is_zero() {
            return Err(invalid("no market rate".to_string()));
        }

        Ok(if transfer_sell.is_zero() {
            banknote_sell
        } else {
            transfer_sell
        })
    }
}

/// Derived row handed to a downstream adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRecord {
    pub currency: String,
    pub currency_code: String,
    pub rate: Decimal,
    pub source_date: NaiveDate,
    pub target_date: NaiveDate,
}

/// Parses a quote as published by the source, e.g. `" 1,234.50 "`.
pub fn parse_quote(text: &str) -> Result<Decimal, String> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err("is empty".to_string());
    }
    Decimal::from_str(&cleaned).map_err(|e| format!("'{text}' is not a number ({e})"))
}

/// Business date a source day is filed under downstream.
pub fn target_date_for(source_date: NaiveDate) -> NaiveDate {
    source_date + Days::new(1)
}

/// Calendar-day window `[day 00:00, next day 00:00)`.
pub fn day_window(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (
        date.and_time(NaiveTime::MIN),
        target_date_for(date).and_time(NaiveTime::MIN),
    )
}
