//! On-demand report: geocoding, then current weather, history and air
//! quality fetched concurrently.

use chrono::{Local, NaiveDate};
use tracing::{info, instrument};

use crate::{
    error::{LookupError, ReportError},
    model::{AirQualitySummary, Report, reference_date, title_case},
    provider::{AQI_FALLBACK_COLOR, AQI_FALLBACK_LABEL, Sources, classify_aqi},
};

#[derive(Debug, Clone)]
pub struct Aggregator {
    sources: Sources,
}

impl Aggregator {
    pub fn new(sources: Sources) -> Self {
        Self { sources }
    }

    /// Full report for `place`, comparing against the same day one year
    /// (365 days) ago.
    pub async fn full_report(&self, place: &str) -> Result<Report, ReportError> {
        self.full_report_on(place, Local::now().date_naive()).await
    }

    /// As [`Self::full_report`], with an explicit "today".
    #[instrument(skip(self), level = "info")]
    pub async fn full_report_on(&self, place: &str, today: NaiveDate) -> Result<Report, ReportError> {
        let location = self.sources.geo.resolve(place).await.map_err(|_| {
            ReportError::Resolution { name: title_case(place) }
        })?;

        let (lat, lon) = (location.latitude, location.longitude);
        let weather = &self.sources.weather;
        let (current, historical, air_quality) = tokio::join!(
            weather.fetch_current(lat, lon),
            weather.fetch_historical(lat, lon, reference_date(today)),
            self.air_quality_for(&location.canonical_name),
        );

        let current = current.map_err(|_| ReportError::WeatherUnavailable {
            place: location.canonical_name.clone(),
        })?;

        info!(
            "Report for {}: {:.1} °C, code {}, history {}",
            location.canonical_name,
            current.temperature_c,
            current.weather_code,
            if historical.is_ok() { "available" } else { "missing" },
        );

        Ok(Report {
            canonical_name: location.canonical_name,
            current,
            historical: historical.ok(),
            air_quality,
        })
    }

    /// Air quality only. Never fails; upstream errors degrade to the fallback.
    pub async fn air_quality(&self, place: &str) -> AirQualitySummary {
        self.air_quality_for(place).await
    }

    async fn air_quality_for(&self, place: &str) -> AirQualitySummary {
        summarize_aqi(self.sources.air_quality.fetch_current_index(place).await)
    }
}

fn summarize_aqi(result: Result<u32, LookupError>) -> AirQualitySummary {
    match result {
        Ok(aqi) => {
            let (label, color) = classify_aqi(aqi);
            AirQualitySummary { aqi: Some(aqi), label: label.to_string(), color: color.to_string() }
        }
        Err(_) => AirQualitySummary {
            aqi: None,
            label: AQI_FALLBACK_LABEL.to_string(),
            color: AQI_FALLBACK_COLOR.to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{CurrentConditions, HistoricalSample, ResolvedLocation, WeatherCode};
    use crate::provider::{AirQualitySource, GeoResolver, WeatherSource};
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    /// Geocoder that knows a fixed set of names.
    #[derive(Debug, Default)]
    pub(crate) struct StubGeo {
        pub places: Vec<(String, ResolvedLocation)>,
        pub calls: AtomicUsize,
    }

    impl StubGeo {
        pub(crate) fn with(name: &str, latitude: f64, longitude: f64, canonical: &str) -> Self {
            Self {
                places: vec![(
                    name.to_string(),
                    ResolvedLocation { latitude, longitude, canonical_name: canonical.to_string() },
                )],
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GeoResolver for StubGeo {
        async fn resolve(&self, name: &str) -> Result<ResolvedLocation, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.places
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, loc)| loc.clone())
                .ok_or(LookupError::NotFound)
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct StubWeather {
        pub current: Option<CurrentConditions>,
        pub historical: Option<f64>,
        pub current_calls: AtomicUsize,
        pub historical_calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherSource for StubWeather {
        async fn fetch_current(&self, _: f64, _: f64) -> Result<CurrentConditions, LookupError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            self.current.clone().ok_or(LookupError::Unavailable)
        }

        async fn fetch_historical(
            &self,
            _: f64,
            _: f64,
            reference_date: NaiveDate,
        ) -> Result<HistoricalSample, LookupError> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            self.historical
                .map(|max| HistoricalSample { date: reference_date, max_temperature_c: max })
                .ok_or(LookupError::Unavailable)
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct StubAir {
        pub aqi: Option<u32>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl AirQualitySource for StubAir {
        async fn fetch_current_index(&self, _: &str) -> Result<u32, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.aqi.ok_or(LookupError::Unavailable)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 13).unwrap()
    }

    fn mock_city() -> Arc<StubGeo> {
        Arc::new(StubGeo::with("Praha", 50.08, 14.43, "MockCity"))
    }

    fn weather(current: Option<f64>, historical: Option<f64>) -> Arc<StubWeather> {
        Arc::new(StubWeather {
            current: current.map(|t| CurrentConditions::new(t, 0.0, WeatherCode(2))),
            historical,
            ..Default::default()
        })
    }

    fn air(aqi: Option<u32>) -> Arc<StubAir> {
        Arc::new(StubAir { aqi, ..Default::default() })
    }

    fn aggregator(geo: Arc<StubGeo>, weather: Arc<StubWeather>, air: Arc<StubAir>) -> Aggregator {
        Aggregator::new(Sources { geo, weather, air_quality: air })
    }

    #[tokio::test]
    async fn full_report_merges_all_sources() {
        let geo = mock_city();
        let weather = weather(Some(12.5), Some(15.0));
        let air = air(Some(45));
        let agg = aggregator(geo.clone(), weather.clone(), air.clone());

        let report = agg.full_report_on("Praha", today()).await.expect("report");

        assert_eq!(report.canonical_name, "MockCity");
        assert_eq!(report.current.temperature_c, 12.5);
        let historical = report.historical.expect("historical sample");
        assert_eq!(historical.max_temperature_c, 15.0);
        assert_eq!(historical.date, NaiveDate::from_ymd_opt(2023, 12, 14).unwrap());
        assert_eq!(report.air_quality.aqi, Some(45));
        assert_eq!(report.air_quality.label, "Good");
        assert_eq!(report.air_quality.color, "#00ff00");

        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(weather.current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(weather.historical_calls.load(Ordering::SeqCst), 1);
        assert_eq!(air.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unresolved_place_short_circuits() {
        let weather = weather(Some(12.5), Some(15.0));
        let air = air(Some(45));
        let agg = aggregator(mock_city(), weather.clone(), air.clone());

        let err = agg.full_report_on("UnknownCity", today()).await.unwrap_err();

        assert_eq!(err, ReportError::Resolution { name: "Unknowncity".into() });
        assert_eq!(err.to_string().matches("Unknowncity").count(), 1);
        assert_eq!(weather.current_calls.load(Ordering::SeqCst), 0);
        assert_eq!(weather.historical_calls.load(Ordering::SeqCst), 0);
        assert_eq!(air.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_current_fails_even_with_history() {
        let weather = weather(None, Some(15.0));
        let agg = aggregator(mock_city(), weather.clone(), air(Some(45)));

        let err = agg.full_report_on("Praha", today()).await.unwrap_err();

        assert_eq!(err, ReportError::WeatherUnavailable { place: "MockCity".into() });
        // Both legs ran to completion.
        assert_eq!(weather.historical_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn optional_legs_degrade() {
        let agg = aggregator(mock_city(), weather(Some(3.0), None), air(None));

        let report = agg.full_report_on("Praha", today()).await.expect("report");

        assert!(report.historical.is_none());
        assert_eq!(report.air_quality.aqi, None);
        assert_eq!(report.air_quality.label, AQI_FALLBACK_LABEL);
        assert_eq!(report.air_quality.color, AQI_FALLBACK_COLOR);
    }

    #[tokio::test]
    async fn air_quality_alone_classifies() {
        let agg = aggregator(mock_city(), weather(None, None), air(Some(180)));

        let summary = agg.air_quality("Prague").await;

        assert_eq!(summary.aqi, Some(180));
        assert_eq!(summary.label, "Unhealthy");
        assert_eq!(summary.color, "#ff0000");
    }

    /// Every leg waits until all three have started, so the report only
    /// completes if they run concurrently.
    #[derive(Debug)]
    struct Rendezvous {
        barrier: Arc<tokio::sync::Barrier>,
    }

    #[async_trait]
    impl WeatherSource for Rendezvous {
        async fn fetch_current(&self, _: f64, _: f64) -> Result<CurrentConditions, LookupError> {
            self.barrier.wait().await;
            Ok(CurrentConditions::new(7.0, 0.2, WeatherCode(61)))
        }

        async fn fetch_historical(
            &self,
            _: f64,
            _: f64,
            reference_date: NaiveDate,
        ) -> Result<HistoricalSample, LookupError> {
            self.barrier.wait().await;
            Ok(HistoricalSample { date: reference_date, max_temperature_c: 9.0 })
        }
    }

    #[async_trait]
    impl AirQualitySource for Rendezvous {
        async fn fetch_current_index(&self, _: &str) -> Result<u32, LookupError> {
            self.barrier.wait().await;
            Ok(60)
        }
    }

    #[tokio::test]
    async fn upstream_legs_run_concurrently() {
        let legs = Arc::new(Rendezvous { barrier: Arc::new(tokio::sync::Barrier::new(3)) });
        let agg = Aggregator::new(Sources {
            geo: mock_city(),
            weather: legs.clone(),
            air_quality: legs,
        });

        let report = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            agg.full_report_on("Praha", today()),
        )
        .await
        .expect("legs were awaited one after another")
        .expect("report");

        assert_eq!(report.current.temperature_c, 7.0);
        assert_eq!(report.historical.map(|h| h.max_temperature_c), Some(9.0));
        assert_eq!(report.air_quality.aqi, Some(60));
    }
}
