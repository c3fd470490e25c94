//! Delivery seam — where serialized reports go.

use async_trait::async_trait;
use reqwest::Client;
use tabrelay_core::{AgentConfig, Error, Result};
use tracing::debug;

/// Collector response to a delivered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
    /// Status text, e.g. `Not Found`.
    pub reason: String,
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound channel for report payloads.
///
/// `Err` means the payload never reached the collector (transport failure);
/// any HTTP answer, successful or not, is a `Delivery`.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, body: String) -> Result<Delivery>;
}

/// Posts payloads to the collector over HTTP.
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Http(format!("Failed to build client: {}", e)))?;
        Ok(Self::with_client(client, &config.collector_url))
    }

    pub fn with_client(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReportSink for HttpSink {
    async fn deliver(&self, body: String) -> Result<Delivery> {
        debug!("POST {} ({} bytes)", self.url, body.len());

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Request failed: {}", e)))?;

        let status = response.status();
        Ok(Delivery {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_success_range() {
        let ok = Delivery {
            status: 204,
            reason: "No Content".into(),
        };
        assert!(ok.is_success());

        let not_found = Delivery {
            status: 404,
            reason: "Not Found".into(),
        };
        assert!(!not_found.is_success());
    }

    #[test]
    fn test_sink_uses_configured_url() {
        let sink = HttpSink::new(&AgentConfig::default()).unwrap();
        assert_eq!(sink.url(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_sink_rejects_invalid_config() {
        let config = AgentConfig {
            collector_url: "127.0.0.1:8080".into(),
            ..AgentConfig::default()
        };
        assert!(HttpSink::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sink = HttpSink::with_client(Client::new(), &format!("http://127.0.0.1:{}/", port));
        let err = sink.deliver("[]".into()).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
