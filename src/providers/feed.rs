use crate::core::error::{Result, SyncError};
use crate::core::rate::RawRate;
use crate::core::source::RateSource;
use crate::providers::util::with_retry;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Published rate table served as a JSON array of rows.
pub struct FeedSource {
    base_url: String,
    path: String,
}

impl FeedSource {
    pub fn new(base_url: &str, path: &str) -> Self {
        FeedSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

#[async_trait]
impl RateSource for FeedSource {
    #[instrument(name = "FeedFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<Vec<RawRate>> {
        let url = self.url();
        debug!("Requesting rate table from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("ratesync/1.0")
            .build()
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;

        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .map_err(|e| SyncError::SourceUnavailable(format!("Request error: {e} URL: {url}")))?;

        if !response.status().is_success() {
            return Err(SyncError::SourceUnavailable(format!(
                "HTTP error: {} URL: {}",
                response.status(),
                url
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(SyncError::SourceUnavailable(format!(
                "Empty response from {url}"
            )));
        }

        let rows: Vec<RawRate> = serde_json::from_str(&text).map_err(|e| {
            SyncError::SourceUnavailable(format!("Failed to parse rate table from {url}: {e}"))
        })?;
        debug!(rows = rows.len(), "Received rate table");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exchange-rates"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_rates_parses_rows() {
        let body = r#"[
            {"currency": "US DOLLAR", "transfer_buy": "47.43", "transfer_sell": "47.53",
             "banknote_buy": "47.43", "banknote_sell": "47.53"},
            {"currency": "YENS(100)", "transfer_buy": "31.50", "transfer_sell": null}
        ]"#;
        let server = serve(200, body).await;
        let source = FeedSource::new(&server.uri(), "/exchange-rates");

        let rows = source.fetch_rates().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].currency, "US DOLLAR");
        assert_eq!(rows[0].transfer_sell.as_deref(), Some("47.53"));
        assert_eq!(rows[1].transfer_sell, None);
        assert_eq!(rows[1].banknote_sell, None);
    }

    #[tokio::test]
    async fn test_http_error_is_source_unavailable() {
        let server = serve(503, "").await;
        let source = FeedSource::new(&format!("{}/", server.uri()), "/exchange-rates");

        let err = source.fetch_rates().await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_empty_or_malformed_body_is_source_unavailable() {
        let server = serve(200, "  ").await;
        let err = FeedSource::new(&server.uri(), "/exchange-rates")
            .fetch_rates()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Empty response"));

        let server = serve(200, "<html>maintenance</html>").await;
        let err = FeedSource::new(&server.uri(), "/exchange-rates")
            .fetch_rates()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse rate table"));
    }
}
