use super::ui;
use crate::core::report::StatusReport;
use crate::core::{SyncEngine, Target};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use serde::Serialize;

impl StatusReport {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("System"),
            ui::header_cell("Date"),
            ui::header_cell("Target Date"),
            ui::header_cell("Status"),
        ]);
        table.add_row(vec![
            Cell::new(self.target),
            Cell::new(self.date),
            Cell::new(self.target_date),
            ui::outcome_cell(&self.status, self.has_data),
        ]);
        table.to_string()
    }
}

#[derive(Serialize)]
struct AlertResult {
    target: Target,
    alert_sent: bool,
}

pub async fn status(engine: &SyncEngine, target: Target, today: NaiveDate, json: bool) -> Result<()> {
    let report = engine.check_status(target, today).await;
    if json {
        return ui::print_json(&report);
    }
    println!("{}", report.display_as_table());
    Ok(())
}

pub async fn alert(engine: &SyncEngine, target: Target, today: NaiveDate, json: bool) -> Result<()> {
    let alert_sent = engine.alert_if_missing(target, today).await;
    if json {
        return ui::print_json(&AlertResult { target, alert_sent });
    }
    if alert_sent {
        println!(
            "{}",
            ui::style_text(
                &format!("{target} has no rates for tomorrow; alert sent"),
                ui::StyleType::Error
            )
        );
    } else {
        println!(
            "{}",
            ui::style_text(
                &format!("{target} already has rates; no alert needed"),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
