use crate::core::SyncEngine;
use crate::core::config::ScheduleConfig;
use crate::local_now;
use anyhow::{Result, ensure};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use tracing::{error, info};

/// Decides, minute by minute, when the reconciliation and the daily alert
/// are due.
pub struct Schedule {
    interval: Duration,
    window_start_hour: u32,
    window_end_hour: u32,
    alert_at: NaiveTime,
    last_reconcile: Option<NaiveDateTime>,
    last_alert: Option<NaiveDate>,
}

impl Schedule {
    pub fn new(config: &ScheduleConfig) -> Result<Self> {
        ensure!(
            config.window_start_hour <= config.window_end_hour && config.window_end_hour <= 23,
            "Invalid schedule window: {}:00 to {}:59 (hours must be 0-23, start before end)",
            config.window_start_hour,
            config.window_end_hour
        );
        Ok(Schedule {
            interval: Duration::minutes(i64::from(config.interval_minutes.max(1))),
            window_start_hour: config.window_start_hour,
            window_end_hour: config.window_end_hour,
            alert_at: config.alert_time()?,
            last_reconcile: None,
            last_alert: None,
        })
    }

    /// Within the hour window and at least one interval after the last run.
    pub fn reconcile_due(&mut self, now: NaiveDateTime) -> bool {
        let hour = now.hour();
        if hour < self.window_start_hour || hour > self.window_end_hour {
            return false;
        }
        if self
            .last_reconcile
            .is_some_and(|last| now - last < self.interval)
        {
            return false;
        }
        self.last_reconcile = Some(now);
        true
    }

    /// Once per day, during the hour that starts at the alert time.
    pub fn alert_due(&mut self, now: NaiveDateTime) -> bool {
        let time = now.time();
        let in_slot = time >= self.alert_at && time - self.alert_at < Duration::hours(1);
        if !in_slot || self.last_alert == Some(now.date()) {
            return false;
        }
        self.last_alert = Some(now.date());
        true
    }
}

/// Runs the reconciliation and the missed-push alert on the configured
/// schedule until interrupted.
pub async fn run(engine: &SyncEngine, config: &ScheduleConfig, tz: Tz) -> Result<()> {
    let mut schedule = Schedule::new(config)?;
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));

    info!(
        "Watching: every {} minutes between {}:00 and {}:59, alert at {}",
        config.interval_minutes, config.window_start_hour, config.window_end_hour, config.alert_at
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping scheduler");
                return Ok(());
            }
        }

        let now = local_now(tz);
        if schedule.reconcile_due(now) {
            match engine.reconcile(now).await {
                Ok(report) => info!(?report, "Reconciliation finished"),
                Err(e) => error!("Reconciliation failed: {}", e),
            }
        }
        if schedule.alert_due(now) {
            for target in &config.alert_targets {
                engine.alert_if_missing(*target, now.date()).await;
            }
        }
    }
}
