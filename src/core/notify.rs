//! Notification abstractions and the notices the engine sends.

use crate::core::rate::PushRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub subject: String,
    pub html_body: String,
}

/// Fire-and-forget delivery channel. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice) -> Result<()>;
}

/// Success notice listing every pushed currency with its derived rate.
pub fn completion_notice(system: &str, records: &[PushRecord], at: NaiveDateTime) -> Notice {
    let mut body = String::from("<html><body>");
    body.push_str(&format!(
        "<p>Exchange rate push to {system} completed.<br/>Time: {}</p>",
        at.format("%Y-%m-%d %H:%M:%S")
    ));
    body.push_str(
        "<table border='1' cellpadding='5' cellspacing='0' style='border-collapse: collapse;'>",
    );
    body.push_str("<thead><tr style='background-color:#f2f2f2;'>");
    body.push_str("<th>Currency</th><th>Rate</th></tr></thead><tbody>");
    for record in records {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&record.currency),
            record.rate
        ));
    }
    body.push_str("</tbody></table></body></html>");

    Notice {
        subject: format!("Exchange Rate Push to {system} Completed"),
        html_body: body,
    }
}

/// Alert sent when a system still has no rates for the coming business day.
pub fn failure_notice(system: &str) -> Notice {
    Notice {
        subject: format!("Exchange Rate Not Pushed to {system} Please Contact IT"),
        html_body: format!(
            "<html><body><p style='color:red; font-weight:bold;'>Exchange rate Not Pushed to {system} Please Contact IT.</p></body></html>"
        ),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
