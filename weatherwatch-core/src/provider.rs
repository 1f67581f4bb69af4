use crate::{
    Config,
    error::LookupError,
    model::{CurrentConditions, HistoricalSample, ResolvedLocation},
    provider::{openmeteo::OpenMeteoProvider, waqi::WaqiProvider},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::{fmt::Debug, sync::Arc, time::Duration};

pub mod openmeteo;
pub mod waqi;

const USER_AGENT: &str = concat!("weatherwatch/", env!("CARGO_PKG_VERSION"));

/// Label and color used when the air-quality index could not be fetched.
pub const AQI_FALLBACK_LABEL: &str = "Data not available";
pub const AQI_FALLBACK_COLOR: &str = "#808080";

/// Free-text place name to coordinates.
#[async_trait]
pub trait GeoResolver: Send + Sync + Debug {
    /// Any failure, including transport errors, is reported as `NotFound`.
    async fn resolve(&self, name: &str) -> Result<ResolvedLocation, LookupError>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, LookupError>;

    async fn fetch_historical(
        &self,
        latitude: f64,
        longitude: f64,
        reference_date: NaiveDate,
    ) -> Result<HistoricalSample, LookupError>;
}

#[async_trait]
pub trait AirQualitySource: Send + Sync + Debug {
    async fn fetch_current_index(&self, place: &str) -> Result<u32, LookupError>;
}

/// Map an AQI value to its status label and color. Upper bounds are inclusive.
pub fn classify_aqi(aqi: u32) -> (&'static str, &'static str) {
    const BUCKETS: &[(u32, &str, &str)] = &[
        (50, "Good", "#00ff00"),
        (100, "Satisfactory", "#ffff00"),
        (150, "Unhealthy for sensitive groups", "#ff8000"),
        (200, "Unhealthy", "#ff0000"),
        (300, "Very unhealthy", "#800080"),
    ];

    BUCKETS
        .iter()
        .find(|(upper, _, _)| aqi <= *upper)
        .map(|(_, label, color)| (*label, *color))
        .unwrap_or(("Hazardous", "#800000"))
}

/// The three upstream collaborators, ready to be shared between tasks.
#[derive(Debug, Clone)]
pub struct Sources {
    pub geo: Arc<dyn GeoResolver>,
    pub weather: Arc<dyn WeatherSource>,
    pub air_quality: Arc<dyn AirQualitySource>,
}

/// Construct the production sources from config.
pub fn sources_from_config(config: &Config) -> anyhow::Result<Sources> {
    let timeout = config.http.timeout();
    let open_meteo = Arc::new(OpenMeteoProvider::new(config.language.clone(), timeout)?);
    let waqi = WaqiProvider::new(config.aqi_token().map(str::to_owned), timeout)?;

    Ok(Sources {
        geo: open_meteo.clone(),
        weather: open_meteo,
        air_quality: Arc::new(waqi),
    })
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
