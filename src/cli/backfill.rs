use super::ui;
use crate::core::report::{BackfillReport, CombinedBackfillReport, SkipReason};
use crate::core::{SyncEngine, Target, engine::validate_days_back};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;

impl BackfillReport {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Source Day"),
            ui::header_cell("Target Day"),
            ui::header_cell("Result"),
        ]);

        for day in &self.processed {
            table.add_row(vec![
                Cell::new(day.source_date),
                Cell::new(day.target_date),
                ui::outcome_cell(&format!("pushed {} rates", day.inserted), true),
            ]);
        }
        for day in &self.skipped {
            let cell = match day.reason {
                SkipReason::NoSourceData | SkipReason::Unreachable => {
                    ui::error_cell(day.reason.describe())
                }
                _ => ui::outcome_cell(day.reason.describe(), false),
            };
            table.add_row(vec![
                Cell::new(day.source_date),
                Cell::new(day.target_date),
                cell,
            ]);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text(
                &format!("{} back days push", self.target),
                ui::StyleType::Title
            )
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\n{}: {}  {}: {}  {}: {}",
            ui::style_text("Days", ui::StyleType::TotalLabel),
            self.total_days_processed,
            ui::style_text("Pushed", ui::StyleType::TotalLabel),
            ui::style_text(
                &self.successful_pushes.to_string(),
                ui::StyleType::TotalValue
            ),
            ui::style_text("Skipped", ui::StyleType::TotalLabel),
            self.skipped_count
        ));
        output
    }
}

impl CombinedBackfillReport {
    pub fn display_as_table(&self) -> String {
        let mut output = self.ledger.display_as_table();
        output.push_str("\n\n");
        output.push_str(&self.midrange.display_as_table());
        output
    }
}

pub async fn run(
    engine: &SyncEngine,
    target: Target,
    days_back: i64,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let days = validate_days_back(days_back)? + 1;

    let pb = ui::new_progress_bar(u64::from(days), true);
    pb.set_message(format!("Pushing to {target}..."));
    let tick = pb.clone();
    let report = engine
        .backfill_with_progress(target, days_back, today, &move || tick.inc(1))
        .await;
    pb.finish_and_clear();
    let report = report?;

    if json {
        return ui::print_json(&report);
    }
    println!("{}", report.display_as_table());
    Ok(())
}

pub async fn run_both(engine: &SyncEngine, days_back: i64, today: NaiveDate, json: bool) -> Result<()> {
    let report = engine.backfill_both(days_back, today).await?;
    if json {
        return ui::print_json(&report);
    }
    println!("{}", report.display_as_table());
    ui::print_separator();
    println!(
        "{}: {}",
        ui::style_text("Total days processed", ui::StyleType::TotalLabel),
        report.total_days_processed
    );
    Ok(())
}
