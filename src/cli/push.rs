use super::ui;
use crate::core::SyncEngine;
use crate::core::Target;
use crate::core::report::{DayPush, PushSummary, ReconcileReport, TargetOutcome};
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::Cell;

impl PushSummary {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell("Code"),
            ui::header_cell("Rate"),
            ui::header_cell("Result"),
        ]);

        for record in &self.pushed {
            table.add_row(vec![
                Cell::new(&record.currency),
                Cell::new(&record.currency_code),
                ui::number_cell(record.rate),
                ui::outcome_cell("inserted", true),
            ]);
        }
        for rejected in &self.rejected {
            table.add_row(vec![
                Cell::new(&rejected.currency),
                Cell::new(""),
                Cell::new(""),
                ui::error_cell(&rejected.reason),
            ]);
        }

        let mut output = format!(
            "{} rates for {} (source day {})\n\n",
            ui::style_text(&self.target.to_string(), ui::StyleType::Title),
            self.target_date,
            self.source_date
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\n{}: {}",
            ui::style_text("Inserted", ui::StyleType::TotalLabel),
            ui::style_text(&self.inserted().to_string(), ui::StyleType::TotalValue)
        ));
        output
    }
}

impl DayPush {
    pub fn display(&self, target: Target) -> String {
        match self {
            DayPush::NoData { source_date } => ui::style_text(
                &format!("No scraped data found for {source_date}"),
                ui::StyleType::Error,
            ),
            DayPush::AlreadyPresent { target_date } => ui::style_text(
                &format!("{target} already has data for {target_date}"),
                ui::StyleType::Subtle,
            ),
            DayPush::InProgress { target_date } => ui::style_text(
                &format!("A push to {target} for {target_date} is already running"),
                ui::StyleType::Subtle,
            ),
            DayPush::Unreachable { target_date } => ui::style_text(
                &format!("{target} is unreachable; nothing pushed for {target_date}"),
                ui::StyleType::Error,
            ),
            DayPush::Pushed(summary) => summary.display_as_table(),
        }
    }
}

impl TargetOutcome {
    pub fn describe(&self) -> String {
        match self {
            TargetOutcome::AlreadyPresent => "already present".to_string(),
            TargetOutcome::Pushed { inserted } => format!("pushed {inserted} rates"),
            TargetOutcome::NothingPushed => "nothing pushed".to_string(),
            TargetOutcome::InProgress => "push in progress".to_string(),
            TargetOutcome::Unreachable => "system unreachable".to_string(),
        }
    }
}

impl ReconcileReport {
    pub fn display_as_table(&self) -> String {
        match self {
            ReconcileReport::Scraped { count } => format!(
                "No rates stored for today yet; scraped {} currencies",
                ui::style_text(&count.to_string(), ui::StyleType::TotalValue)
            ),
            ReconcileReport::Synced { targets } => {
                let mut table = ui::new_styled_table();
                table.set_header(vec![ui::header_cell("System"), ui::header_cell("Outcome")]);
                for sync in targets {
                    let done = matches!(sync.outcome, TargetOutcome::Pushed { .. });
                    table.add_row(vec![
                        Cell::new(sync.target),
                        ui::outcome_cell(&sync.outcome.describe(), done),
                    ]);
                }
                table.to_string()
            }
        }
    }
}

pub async fn push_day(
    engine: &SyncEngine,
    target: Target,
    days_back: i64,
    today: NaiveDate,
    force: bool,
    json: bool,
) -> Result<()> {
    let result = engine.push_day(target, days_back, today, force).await?;
    if json {
        return ui::print_json(&result);
    }
    println!("{}", result.display(target));
    Ok(())
}

pub async fn reconcile(engine: &SyncEngine, now: NaiveDateTime, json: bool) -> Result<()> {
    let report = engine.reconcile(now).await?;
    if json {
        return ui::print_json(&report);
    }
    println!("{}", report.display_as_table());
    Ok(())
}
