use crate::core::config::NotifierConfig;
use crate::core::notify::{Notice, Notifier};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument};

#[derive(Serialize, Debug)]
struct MailRequest<'a> {
    to: &'a [String],
    cc: &'a [String],
    subject: &'a str,
    body: &'a str,
}

/// Sends notices through an HTTP mail gateway.
pub struct HttpMailer {
    url: String,
    to: Vec<String>,
    cc: Vec<String>,
}

impl HttpMailer {
    pub fn new(config: &NotifierConfig) -> Self {
        HttpMailer {
            url: config.url.clone(),
            to: config.to.clone(),
            cc: config.cc.clone(),
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    #[instrument(name = "MailSend", skip_all, fields(subject = %notice.subject))]
    async fn notify(&self, notice: &Notice) -> Result<()> {
        let request = MailRequest {
            to: &self.to,
            cc: &self.cc,
            subject: &notice.subject,
            body: &notice.html_body,
        };
        debug!("Posting notice to {}", self.url);

        let client = reqwest::Client::builder().user_agent("ratesync/1.0").build()?;
        let response = client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} URL: {}", e, self.url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Mail gateway returned {} for '{}'",
                response.status(),
                notice.subject
            ));
        }
        Ok(())
    }
}

/// Stand-in used when no mail gateway is configured; notices only reach the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) -> Result<()> {
        info!(subject = %notice.subject, "No notifier configured; notice not delivered");
        Ok(())
    }
}
