//! Terminal surface: one view per command, tables by default, JSON on request.

pub mod backfill;
pub mod push;
pub mod rates;
pub mod setup;
pub mod status;
pub mod ui;
pub mod watch;
