use crate::env::{env_or, LOG_SINK_ENDPOINT_ENV};
use crate::error::{Error as CrateError, Result as CrateResult};
use crate::{record::LogBatch, sink::LogSink};
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;

/// Header carrying the project of a batch.
pub const PROJECT_HEADER: &str = "x-log-project";

/// Log store sink that posts each batch as a JSON document to an HTTP
/// ingestion endpoint.
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
    /// Base URL of the ingestion endpoint, e.g. "http://localhost:8080".
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpSink {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies, TLS roots).
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        HttpSink {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Build from `LOG_SINK_ENDPOINT`.
    pub fn from_env() -> CrateResult<Self> {
        let endpoint = env_or(LOG_SINK_ENDPOINT_ENV, "");
        if endpoint.is_empty() {
            return Err(CrateError::config(LOG_SINK_ENDPOINT_ENV, "endpoint is not set"));
        }
        Ok(Self::new(endpoint))
    }

    /// URL a batch for `logstore` is posted to.
    pub fn url_for(&self, logstore: &str) -> String {
        format!(
            "{}/logstores/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(logstore)
        )
    }
}

#[async_trait]
impl LogSink for HttpSink {
    async fn send(&self, batch: &LogBatch) -> Result<(), Box<dyn Error + Send + Sync>> {
        let url = self.url_for(&batch.destination.logstore);
        let resp = self
            .client
            .post(&url)
            .header(PROJECT_HEADER, batch.destination.project.as_str())
            .json(batch)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("log store ingestion failed with status {}: {}", status, text).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logstore_is_percent_encoded() {
        let sink = HttpSink::new("http://localhost:8080/");
        assert_eq!(
            sink.url_for("app logs/prod"),
            "http://localhost:8080/logstores/app%20logs%2Fprod"
        );
    }
}
