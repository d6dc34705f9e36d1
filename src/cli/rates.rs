use super::ui;
use crate::core::{RateSnapshot, SyncEngine};
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::Cell;

pub fn rates_table(snapshots: &[RateSnapshot]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Captured"),
        ui::header_cell("Currency"),
        ui::header_cell("Transfer Buy"),
        ui::header_cell("Transfer Sell"),
        ui::header_cell("Banknote Buy"),
        ui::header_cell("Banknote Sell"),
    ]);

    for snapshot in snapshots {
        table.add_row(vec![
            Cell::new(snapshot.scraped_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&snapshot.currency),
            ui::number_cell(&snapshot.transfer_buy),
            ui::number_cell(&snapshot.transfer_sell),
            ui::number_cell(&snapshot.banknote_buy),
            ui::number_cell(&snapshot.banknote_sell),
        ]);
    }
    table.to_string()
}

/// Captures the current table once and shows what was stored.
pub async fn scrape(engine: &SyncEngine, now: NaiveDateTime, json: bool) -> Result<()> {
    let snapshots = engine.scrape(now).await?;
    if json {
        return ui::print_json(&snapshots);
    }

    if snapshots.is_empty() {
        println!(
            "{}",
            ui::style_text("No rates extracted from the source", ui::StyleType::Error)
        );
        return Ok(());
    }
    println!("{}", rates_table(&snapshots));
    println!(
        "\n{}: {}",
        ui::style_text("Stored", ui::StyleType::TotalLabel),
        ui::style_text(&snapshots.len().to_string(), ui::StyleType::TotalValue)
    );
    Ok(())
}

/// Lists stored snapshots for one source day, or every snapshot.
pub async fn list(engine: &SyncEngine, date: Option<NaiveDate>, json: bool) -> Result<()> {
    let snapshots = match date {
        Some(day) => engine.rates_for_day(day).await?,
        None => engine.all_rates().await?,
    };
    if json {
        return ui::print_json(&snapshots);
    }

    if snapshots.is_empty() {
        println!(
            "{}",
            ui::style_text("No stored rates", ui::StyleType::Subtle)
        );
        return Ok(());
    }
    println!("{}", rates_table(&snapshots));
    Ok(())
}
