//! Outbound signaling exchange.

use crate::errors::MonitorError;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, warn};

/// HTTP client for the remote signaling endpoint.
///
/// The request carries no timeout and is never retried: a peer that never
/// answers keeps the process waiting, and any failure is final.
#[derive(Debug, Clone)]
pub struct SignalingClient {
    http_client: reqwest::Client,
    url: String,
}

impl SignalingClient {
    /// Create a client for the signaling endpoint at `url`.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Config` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, MonitorError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    /// The configured signaling URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the encoded offer and return the full response body.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Transport` on connection failure, a non-2xx
    /// status, or a body that cannot be read in full.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn exchange(&self, encoded_offer: &str) -> Result<String, MonitorError> {
        debug!(
            target: "rtc_monitor.signaling",
            body_len = encoded_offer.len(),
            "Posting offer to signaling endpoint"
        );

        let response = self
            .http_client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain")
            .body(encoded_offer.to_owned())
            .send()
            .await
            .map_err(|e| {
                warn!(target: "rtc_monitor.signaling", error = %e, "Signaling request failed");
                MonitorError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "rtc_monitor.signaling",
                status = %status,
                "Signaling endpoint rejected the offer"
            );
            return Err(MonitorError::Transport(format!(
                "Unexpected status: {status}"
            )));
        }

        let body = response.text().await.map_err(|e| {
            warn!(target: "rtc_monitor.signaling", error = %e, "Failed to read signaling response");
            MonitorError::Transport(format!("Failed to read response body: {e}"))
        })?;

        debug!(
            target: "rtc_monitor.signaling",
            body_len = body.len(),
            "Received answer from signaling endpoint"
        );
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_exchange_returns_full_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/offer"))
            .and(header("content-type", "text/plain"))
            .and(body_string("b2ZmZXI="))
            .respond_with(ResponseTemplate::new(200).set_body_string("YW5zd2Vy"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SignalingClient::new(format!("{}/offer", mock_server.uri())).unwrap();
        let body = client.exchange("b2ZmZXI=").await.unwrap();

        assert_eq!(body, "YW5zd2Vy");
    }

    #[tokio::test]
    async fn test_exchange_server_error_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = SignalingClient::new(format!("{}/offer", mock_server.uri())).unwrap();
        let err = client.exchange("b2ZmZXI=").await.unwrap_err();

        assert!(matches!(err, MonitorError::Transport(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_exchange_client_error_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = SignalingClient::new(format!("{}/offer", mock_server.uri())).unwrap();
        assert!(matches!(
            client.exchange("b2ZmZXI=").await,
            Err(MonitorError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = SignalingClient::new(format!("http://{addr}/offer")).unwrap();
        let err = client.exchange("b2ZmZXI=").await.unwrap_err();

        assert!(matches!(err, MonitorError::Transport(_)));
    }
}
