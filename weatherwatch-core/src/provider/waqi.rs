use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    error::LookupError,
    provider::{http_client, truncate_body},
};

use super::AirQualitySource;

const WAQI_BASE_URL: &str = "https://api.waqi.info";

/// World Air Quality Index feed.
///
/// Without a token the provider is permanently unavailable and never touches
/// the network.
#[derive(Debug, Clone)]
pub struct WaqiProvider {
    token: Option<String>,
    base_url: String,
    http: Client,
}

impl WaqiProvider {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token, WAQI_BASE_URL, timeout)
    }

    pub fn with_base_url(token: Option<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        if token.is_none() {
            warn!("AQI_API_TOKEN is not set; air-quality data will be unavailable");
        }

        Ok(Self {
            token,
            base_url: base_url.to_string(),
            http: http_client(timeout)?,
        })
    }

    fn feed_url(&self, place: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid WAQI base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("WAQI base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["feed", place, ""]);
        Ok(url)
    }

    async fn fetch(&self, place: &str, token: &str) -> Result<u32> {
        let url = self.feed_url(place)?;

        let res = self
            .http
            .get(url)
            .query(&[("token", token)])
            .send()
            .await
            .context("Failed to send request to WAQI")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read WAQI response body")?;

        if status != reqwest::StatusCode::OK {
            return Err(anyhow!(
                "WAQI request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: WaqiResponse =
            serde_json::from_str(&body).context("Failed to parse WAQI JSON")?;

        if parsed.status != "ok" {
            return Err(anyhow!("WAQI status is '{}': {}", parsed.status, parsed.data));
        }

        let aqi = parsed.data.get("aqi");
        aqi.and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| anyhow!("WAQI index is missing or not an integer: {aqi:?}"))
    }
}

#[derive(Debug, Deserialize)]
struct WaqiResponse {
    status: String,
    /// An object on success, an error string otherwise.
    #[serde(default)]
    data: serde_json::Value,
}

#[async_trait]
impl AirQualitySource for WaqiProvider {
    async fn fetch_current_index(&self, place: &str) -> Result<u32, LookupError> {
        let Some(token) = self.token.as_deref() else {
            return Err(LookupError::Unavailable);
        };

        match self.fetch(place, token).await {
            Ok(aqi) => {
                debug!("AQI for {} is {}", place, aqi);
                Ok(aqi)
            }
            Err(e) => {
                warn!("Air quality unavailable for {}: {:#}", place, e);
                Err(LookupError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, token: Option<&str>) -> WaqiProvider {
        WaqiProvider::with_base_url(token.map(str::to_owned), &server.uri(), Duration::from_secs(2))
            .expect("client builds")
    }

    async fn respond(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/feed/prague/"))
            .and(query_param("token", "KEY"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn returns_integer_index() {
        let server = MockServer::start().await;
        respond(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "data": {"aqi": 42, "idx": 1234, "city": {"name": "Prague"}}
            })),
        )
        .await;

        let aqi = provider(&server, Some("KEY")).fetch_current_index("prague").await;
        assert_eq!(aqi, Ok(42));
    }

    #[tokio::test]
    async fn non_ok_status_marker_is_unavailable() {
        let server = MockServer::start().await;
        respond(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "error", "data": "Invalid key"})),
        )
        .await;

        let aqi = provider(&server, Some("KEY")).fetch_current_index("prague").await;
        assert_eq!(aqi, Err(LookupError::Unavailable));
    }

    #[tokio::test]
    async fn non_integer_index_is_unavailable() {
        let server = MockServer::start().await;
        respond(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "ok", "data": {"aqi": "-"}})),
        )
        .await;

        let aqi = provider(&server, Some("KEY")).fetch_current_index("prague").await;
        assert_eq!(aqi, Err(LookupError::Unavailable));
    }

    #[tokio::test]
    async fn http_error_is_unavailable() {
        let server = MockServer::start().await;
        respond(&server, ResponseTemplate::new(503)).await;

        let aqi = provider(&server, Some("KEY")).fetch_current_index("prague").await;
        assert_eq!(aqi, Err(LookupError::Unavailable));
    }

    #[tokio::test]
    async fn malformed_json_is_unavailable() {
        let server = MockServer::start().await;
        respond(&server, ResponseTemplate::new(200).set_body_string("<html>")).await;

        let aqi = provider(&server, Some("KEY")).fetch_current_index("prague").await;
        assert_eq!(aqi, Err(LookupError::Unavailable));
    }

    #[tokio::test]
    async fn missing_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let aqi = provider(&server, None).fetch_current_index("prague").await;
        assert_eq!(aqi, Err(LookupError::Unavailable));
    }

    #[test]
    fn feed_url_encodes_place() {
        let provider =
            WaqiProvider::with_base_url(None, "https://api.waqi.info", Duration::from_secs(1))
                .expect("client builds");

        let url = provider.feed_url("Hradec Králové").expect("url");
        assert_eq!(url.as_str(), "https://api.waqi.info/feed/Hradec%20Kr%C3%A1lov%C3%A9/");
    }
}
