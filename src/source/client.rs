//! Trading engine REST client.
//!
//! Read-only access to the autopilot's open positions endpoint.

use crate::config::ApiConfig;
use crate::error::{WatchError, WatchResult};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use super::traits::PositionSnapshotSource;
use super::types::{PositionSnapshot, PositionsResponse};

/// HTTP client for the engine's position API.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: Client,
    positions_url: String,
}

impl EngineClient {
    /// Create a new client from configuration.
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let positions_url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.positions_path
        );

        Ok(Self {
            http,
            positions_url,
        })
    }

    pub fn positions_url(&self) -> &str {
        &self.positions_url
    }

    /// Get all open positions tracked by the autopilot.
    #[instrument(skip(self), name = "engine_get_positions")]
    pub async fn get_positions(&self) -> WatchResult<PositionSnapshot> {
        let response = self
            .http
            .get(&self.positions_url)
            .send()
            .await
            .map_err(|e| WatchError::TransientFetch(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::TransientFetch(format!(
                "engine API error {}: {}",
                status, body
            )));
        }

        let data: PositionsResponse = response
            .json()
            .await
            .map_err(|e| WatchError::TransientFetch(format!("invalid positions payload: {}", e)))?;

        if let Some(count) = data.count {
            if count != data.positions.len() {
                debug!(
                    reported = count,
                    actual = data.positions.len(),
                    "Position count mismatch in engine response"
                );
            }
        }

        debug!("Fetched {} open positions", data.positions.len());
        Ok(data.into())
    }
}

#[async_trait]
impl PositionSnapshotSource for EngineClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_positions(&self) -> WatchResult<PositionSnapshot> {
        self.get_positions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POSITIONS_PATH: &str = "/api/futures/ginie/autopilot/positions";

    fn client_for(server: &MockServer) -> EngineClient {
        let config = ApiConfig {
            base_url: server.uri(),
            positions_path: POSITIONS_PATH.to_string(),
            request_timeout_secs: 2,
        };
        EngineClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_positions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(POSITIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "positions": [{
                    "symbol": "SQDUSDT",
                    "side": "LONG",
                    "mode": "swing",
                    "entry_price": 0.12,
                    "highest_price": 0.13,
                    "remaining_qty": 1000,
                    "leverage": 10
                }],
                "count": 1
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let snapshot = client.fetch_positions().await.unwrap();

        assert_eq!(snapshot.len(), 1);
        let position = snapshot.find("SQDUSDT").unwrap().unwrap();
        assert_eq!(position.reference_price, dec!(0.13));
        assert_eq!(client.name(), "http");
    }

    #[tokio::test]
    async fn test_empty_positions_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(POSITIONS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "positions": [], "count": 0 })),
            )
            .mount(&server)
            .await;

        let snapshot = client_for(&server).fetch_positions().await.unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.find("SQDUSDT").is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(POSITIONS_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("autopilot not available"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_positions().await.unwrap_err();
        match err {
            WatchError::TransientFetch(msg) => assert!(msg.contains("503")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(POSITIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_positions().await.unwrap_err();
        assert!(matches!(err, WatchError::TransientFetch(_)));
    }

    #[test]
    fn test_positions_url_joins_cleanly() {
        let config = ApiConfig {
            base_url: "http://localhost:8094/".to_string(),
            positions_path: POSITIONS_PATH.to_string(),
            request_timeout_secs: 10,
        };
        let client = EngineClient::new(&config).unwrap();
        assert_eq!(
            client.positions_url(),
            "http://localhost:8094/api/futures/ginie/autopilot/positions"
        );
    }
}
