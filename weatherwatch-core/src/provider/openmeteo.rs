use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    error::LookupError,
    model::{CurrentConditions, HistoricalSample, ResolvedLocation, WeatherCode},
    provider::{http_client, truncate_body},
};

use super::{GeoResolver, WeatherSource};

/// Base URLs of the three Open-Meteo services.
#[derive(Debug, Clone)]
pub struct OpenMeteoEndpoints {
    pub geocoding: String,
    pub forecast: String,
    pub archive: String,
}

impl Default for OpenMeteoEndpoints {
    fn default() -> Self {
        Self {
            geocoding: "https://geocoding-api.open-meteo.com".to_string(),
            forecast: "https://api.open-meteo.com".to_string(),
            archive: "https://archive-api.open-meteo.com".to_string(),
        }
    }
}

impl OpenMeteoEndpoints {
    /// All three services behind one host.
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self { geocoding: base.clone(), forecast: base.clone(), archive: base }
    }
}

/// Geocoding, current conditions and ERA5 history from Open-Meteo. No API key.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    endpoints: OpenMeteoEndpoints,
    language: String,
}

impl OpenMeteoProvider {
    pub fn new(language: String, timeout: Duration) -> Result<Self> {
        Self::with_endpoints(OpenMeteoEndpoints::default(), language, timeout)
    }

    pub fn with_endpoints(
        endpoints: OpenMeteoEndpoints,
        language: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self { http: http_client(timeout)?, endpoints, language })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        what: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Open-Meteo ({what})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read Open-Meteo {what} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "Open-Meteo {} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse Open-Meteo {what} JSON"))
    }

    async fn geocode(&self, name: &str) -> Result<ResolvedLocation> {
        let url = format!("{}/v1/search", self.endpoints.geocoding);
        let parsed: GeoResponse = self
            .get_json(
                "geocoding",
                &url,
                &[
                    ("name", name.to_string()),
                    ("count", "1".to_string()),
                    ("language", self.language.clone()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;

        let best = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Geocoding returned no results for '{name}'"))?;

        Ok(ResolvedLocation {
            latitude: best.latitude,
            longitude: best.longitude,
            canonical_name: best.name,
        })
    }

    async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentConditions> {
        let url = format!("{}/v1/forecast", self.endpoints.forecast);
        let parsed: CurrentResponse = self
            .get_json(
                "current weather",
                &url,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("current", "temperature_2m,precipitation,weather_code".to_string()),
                ],
            )
            .await?;

        let cw = parsed.current;
        Ok(CurrentConditions::new(cw.temperature_2m, cw.precipitation, WeatherCode(cw.weather_code)))
    }

    async fn historical(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> Result<HistoricalSample> {
        let url = format!("{}/v1/era5", self.endpoints.archive);
        let day = date.format("%Y-%m-%d").to_string();
        let parsed: ArchiveResponse = self
            .get_json(
                "archive",
                &url,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("start_date", day.clone()),
                    ("end_date", day),
                    ("daily", "temperature_2m_max".to_string()),
                    ("timezone", "auto".to_string()),
                ],
            )
            .await?;

        let date = parsed
            .daily
            .time
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Open-Meteo archive returned an empty series for {date}"))?;
        let max_temperature_c = parsed
            .daily
            .temperature_2m_max
            .first()
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("Open-Meteo archive has no max temperature for {date}"))?;

        Ok(HistoricalSample { date, max_temperature_c })
    }
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: f64,
    precipitation: f64,
    weather_code: u16,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: OmCurrent,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<NaiveDate>,
    temperature_2m_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: OmDaily,
}

#[async_trait]
impl GeoResolver for OpenMeteoProvider {
    async fn resolve(&self, name: &str) -> Result<ResolvedLocation, LookupError> {
        match self.geocode(name).await {
            Ok(location) => {
                debug!(
                    "Resolved '{}' to {} ({}, {})",
                    name, location.canonical_name, location.latitude, location.longitude
                );
                Ok(location)
            }
            Err(e) => {
                debug!("Geocoding '{}' failed: {:#}", name, e);
                Err(LookupError::NotFound)
            }
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoProvider {
    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, LookupError> {
        self.current(latitude, longitude).await.map_err(|e| {
            warn!("Current weather unavailable for ({}, {}): {:#}", latitude, longitude, e);
            LookupError::Unavailable
        })
    }

    async fn fetch_historical(
        &self,
        latitude: f64,
        longitude: f64,
        reference_date: NaiveDate,
    ) -> Result<HistoricalSample, LookupError> {
        self.historical(latitude, longitude, reference_date).await.map_err(|e| {
            warn!("Historical weather unavailable for ({}, {}): {:#}", latitude, longitude, e);
            LookupError::Unavailable
        })
    }
}
